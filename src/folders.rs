//! Parent/child index over the flat folder list.
//!
//! Folders only carry a `parent_id` back-reference. The index keeps the
//! forward direction (parent id to ordered child ids) so tree rendering does
//! not rescan the whole folder list per level.
use std::collections::{HashMap, HashSet};

use crate::Folder;

/// Adjacency index keyed by folder id, children in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderIndex {
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

/// One row of a depth-first walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderNode<'a> {
    pub id: &'a str,
    pub depth: usize,
}

impl FolderIndex {
    /// Builds the index from a folder list. A folder whose parent is not in
    /// the list is indexed as a root.
    pub fn build(folders: &[Folder]) -> Self {
        let known: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();
        let mut index = FolderIndex::default();

        for folder in folders {
            match folder.parent_id.as_deref() {
                Some(parent) if known.contains(parent) => index
                    .children
                    .entry(parent.to_string())
                    .or_default()
                    .push(folder.id.clone()),
                _ => index.roots.push(folder.id.clone()),
            }
        }

        index
    }

    pub fn insert(&mut self, folder: &Folder) {
        match &folder.parent_id {
            Some(parent) => self
                .children
                .entry(parent.clone())
                .or_default()
                .push(folder.id.clone()),
            None => self.roots.push(folder.id.clone()),
        }
    }

    /// Drops `id` from the index and moves its direct children to the root
    /// level. Returns the promoted child ids.
    pub fn remove(&mut self, id: &str) -> Vec<String> {
        self.roots.retain(|r| r != id);
        for siblings in self.children.values_mut() {
            siblings.retain(|c| c != id);
        }
        self.children.retain(|_, siblings| !siblings.is_empty());

        let orphans = self.children.remove(id).unwrap_or_default();
        self.roots.extend(orphans.iter().cloned());
        orphans
    }

    /// Direct children of `parent`; `None` lists the roots
    pub fn children(&self, parent: Option<&str>) -> &[String] {
        match parent {
            None => &self.roots,
            Some(id) => self.children.get(id).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    /// Depth-first, pre-order walk starting at the roots
    pub fn walk(&self) -> Vec<FolderNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<(&str, usize)> =
            self.roots.iter().rev().map(|id| (id.as_str(), 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            out.push(FolderNode { id, depth });
            if let Some(kids) = self.children.get(id) {
                stack.extend(kids.iter().rev().map(|k| (k.as_str(), depth + 1)));
            }
        }

        out
    }

    pub fn len(&self) -> usize {
        self.roots.len() + self.children.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.children.is_empty()
    }
}
