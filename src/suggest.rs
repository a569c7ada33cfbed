//! AI-assisted organization suggestions.
//!
//! The text-analysis service is reached through [`SuggestionService`]; the
//! shipped implementation is [`GeminiClient`]. This module owns the request
//! contract (validation, truncation, prompt), the recovery rules for
//! malformed replies, and applying accepted suggestions to a workspace.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{AiConfig, Folder, Note, NotesError, Result, StateStorage, Workspace};

/// Only this many leading characters of a note are sent for analysis
pub const MAX_CONTENT_CHARS: usize = 1000;
const MAX_TAGS: usize = 3;
const MAX_FOLDERS: usize = 1;
const MAX_TIPS: usize = 2;

/// Validated reply of the suggestion service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub tags: Vec<String>,
    pub folders: Vec<String>,
    pub organization: Vec<String>,
}

/// A single suggestion offered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    Tag(String),
    Folder(String),
    /// Display-only advice
    Organization(String),
}

impl Suggestions {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.folders.is_empty() && self.organization.is_empty()
    }

    /// Suggestions worth showing for `note`: tags it does not carry yet,
    /// every folder and every organization tip
    pub fn pending_for(&self, note: &Note) -> Vec<Suggestion> {
        let tags = self
            .tags
            .iter()
            .filter(|tag| !tag.trim().is_empty() && !note.has_tag(tag))
            .cloned()
            .map(Suggestion::Tag);
        let folders = self.folders.iter().cloned().map(Suggestion::Folder);
        let tips = self
            .organization
            .iter()
            .cloned()
            .map(Suggestion::Organization);

        tags.chain(folders).chain(tips).collect()
    }
}

/// A text-analysis backend
#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Whether a credential for the service is configured
    fn has_credential(&self) -> bool;

    /// Sends `prompt` and returns the raw reply text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Asks `service` for suggestions about `content`.
///
/// Fails with [`NotesError::MissingCredential`] before anything else when no
/// key is configured, and with [`NotesError::EmptyContent`] for blank notes.
/// Service failures become [`NotesError::SuggestionFailed`]. A reply that
/// cannot be understood yields empty suggestions instead of an error.
pub async fn generate_suggestions<S>(service: &S, content: &str) -> Result<Suggestions>
where
    S: SuggestionService + ?Sized,
{
    if !service.has_credential() {
        return Err(NotesError::MissingCredential);
    }
    if content.trim().is_empty() {
        return Err(NotesError::EmptyContent);
    }

    let prompt = build_prompt(content);
    let reply = service.complete(&prompt).await.map_err(|e| {
        error!("AI generation error: {}", e);
        match e {
            NotesError::SuggestionFailed { .. } => e,
            other => NotesError::SuggestionFailed {
                message: other.to_string(),
            },
        }
    })?;

    Ok(parse_suggestions(&reply))
}

/// First `max_chars` characters of `content`
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn build_prompt(content: &str) -> String {
    format!(
        r#"As an AI assistant, analyze this note content and suggest organization improvements.

Note content: "{}"

Provide suggestions in this exact JSON format:
{{
  "tags": ["tag1", "tag2", "tag3"],
  "folders": ["folder"],
  "organization": ["tip1", "tip2"]
}}

Requirements:
1. Tags: Provide 3 relevant, concise tags
2. Folders: Suggest 1 descriptive folder name
3. Organization: Give 2 actionable tips for better organization
4. Keep all suggestions brief and specific
5. Ensure the response is valid JSON
"#,
        truncate_chars(content, MAX_CONTENT_CHARS)
    )
}

/// Extracts suggestions from a model reply.
///
/// The JSON object is taken from the first `{` to the last `}`. Lists are
/// capped (3 tags, 1 folder, 2 tips), entries are stringified and trimmed,
/// blank entries are dropped, and fields that are not arrays count as empty.
/// Anything unusable gives the empty result.
pub fn parse_suggestions(reply: &str) -> Suggestions {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        warn!("No JSON found in suggestion reply");
        return Suggestions::default();
    };
    if end < start {
        warn!("No JSON found in suggestion reply");
        return Suggestions::default();
    }

    let parsed: Value = match serde_json::from_str(reply[start..=end].trim()) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse suggestion reply: {}", e);
            return Suggestions::default();
        }
    };

    let Value::Object(map) = parsed else {
        warn!("Suggestion reply is not a JSON object");
        return Suggestions::default();
    };

    let list = |field: &str, cap: usize| -> Vec<String> {
        match map.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .take(cap)
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string().trim().to_string(),
                })
                .filter(|entry| !entry.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    };

    let suggestions = Suggestions {
        tags: list("tags", MAX_TAGS),
        folders: list("folders", MAX_FOLDERS),
        organization: list("organization", MAX_TIPS),
    };

    if suggestions.is_empty() {
        warn!("No valid suggestions found in reply");
    }
    suggestions
}

/// Outcome of applying one suggestion
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Tag appended to the target note
    Tag,
    /// The tag was already on the note; nothing changed
    AlreadyPresent,
    /// The tag was blank; nothing changed
    Unchanged,
    /// A new folder was created
    Folder(Folder),
    /// Organization tips are advice only
    NotApplicable,
    /// The target note is gone or no longer active; nothing changed
    Discarded,
}

/// Applies `suggestion`, computed for `note_id`, to the workspace.
///
/// The target must still exist and still be the active note, otherwise the
/// suggestion is discarded. Folder suggestions create a top-level folder.
pub fn apply_suggestion<S: StateStorage>(
    workspace: &mut Workspace<S>,
    note_id: &str,
    suggestion: &Suggestion,
) -> Applied {
    let store = workspace.store();
    let Some(note) = store.note(note_id) else {
        debug!("Suggestion target {} no longer exists", note_id);
        return Applied::Discarded;
    };
    if store.active_note_id() != Some(note_id) {
        debug!("Suggestion target {} is no longer active", note_id);
        return Applied::Discarded;
    }

    match suggestion {
        Suggestion::Tag(tag) => {
            if note.has_tag(tag) {
                return Applied::AlreadyPresent;
            }
            if workspace.add_tag(note_id, tag).is_durable() {
                Applied::Tag
            } else {
                Applied::Unchanged
            }
        }
        Suggestion::Folder(name) => Applied::Folder(workspace.add_folder(name.clone(), None)),
        Suggestion::Organization(_) => Applied::NotApplicable,
    }
}

/// A suggestion request running in the background for one note.
///
/// The task works on a copy of the note content taken at spawn time.
pub struct SuggestionTask {
    note_id: String,
    handle: JoinHandle<Result<Suggestions>>,
}

impl SuggestionTask {
    /// Spawns the request on the current tokio runtime
    pub fn spawn<S>(service: Arc<S>, note: &Note) -> Self
    where
        S: SuggestionService + ?Sized + 'static,
    {
        let content = note.content.clone();
        let note_id = note.id.clone();
        debug!("Spawning suggestion request for note {}", note_id);

        let handle =
            tokio::spawn(async move { generate_suggestions(service.as_ref(), &content).await });

        Self { note_id, handle }
    }

    /// Id of the note the suggestions are for
    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn cancel(&self) {
        debug!("Cancelling suggestion request for note {}", self.note_id);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the result
    pub async fn finish(self) -> Result<Suggestions> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NotesError::SuggestionFailed {
                message: "request cancelled".to_string(),
            }),
            Err(e) => Err(NotesError::SuggestionFailed {
                message: e.to_string(),
            }),
        }
    }
}

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotesError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let api_key = config
            .api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            info!("No AI API key configured; suggestions are disabled");
        }

        Ok(Self {
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl SuggestionService for GeminiClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or(NotesError::MissingCredential)?;
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!("Requesting suggestions from model {}", self.model);
        let resp = self
            .client
            .post(self.url())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| NotesError::SuggestionFailed {
                message: format!("request failed: {}", e),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotesError::SuggestionFailed {
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: GenerateResponse =
            resp.json().await.map_err(|e| NotesError::SuggestionFailed {
                message: format!("unreadable response: {}", e),
            })?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStorage, NoteDraft, NoteType};
    use std::sync::Mutex;

    /// Service returning a canned reply and recording prompts
    struct StubService {
        credential: bool,
        reply: Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubService {
        fn replying(reply: &str) -> Self {
            Self {
                credential: true,
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                credential: true,
                reply: Err(NotesError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                ))),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SuggestionService for StubService {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(NotesError::SuggestionFailed {
                    message: e.to_string(),
                }),
            }
        }
    }

    const GOOD_REPLY: &str = r#"Sure! Here you go:
```json
{"tags": ["finance", " work ", "q3", "extra"], "folders": ["Invoices", "More"], "organization": ["Add due dates", "Group by client", "third"]}
```"#;

    #[test]
    fn test_parse_caps_and_trims() {
        let s = parse_suggestions(GOOD_REPLY);
        assert_eq!(s.tags, vec!["finance", "work", "q3"]);
        assert_eq!(s.folders, vec!["Invoices"]);
        assert_eq!(s.organization, vec!["Add due dates", "Group by client"]);
    }

    #[test]
    fn test_parse_recovers_from_garbage() {
        assert!(parse_suggestions("no json at all").is_empty());
        assert!(parse_suggestions("} backwards {").is_empty());
        assert!(parse_suggestions("{not: valid}").is_empty());
        assert!(parse_suggestions(r#"{"tags": "single", "folders": null}"#).is_empty());
    }

    #[test]
    fn test_parse_stringifies_non_strings() {
        let s = parse_suggestions(r#"{"tags": [2024, true], "folders": [], "organization": []}"#);
        assert_eq!(s.tags, vec!["2024", "true"]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(1500);
        let cut = truncate_chars(&text, MAX_CONTENT_CHARS);
        assert_eq!(cut.chars().count(), MAX_CONTENT_CHARS);
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn test_missing_credential_is_checked_first() {
        let mut service = StubService::replying(GOOD_REPLY);
        service.credential = false;
        let err = generate_suggestions(&service, "").await.unwrap_err();
        assert!(matches!(err, NotesError::MissingCredential));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_content_rejected_before_call() {
        let service = StubService::replying(GOOD_REPLY);
        let err = generate_suggestions(&service, "   \n").await.unwrap_err();
        assert!(matches!(err, NotesError::EmptyContent));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_truncated_content() {
        let service = StubService::replying(GOOD_REPLY);
        let content = format!("{}{}", "a".repeat(MAX_CONTENT_CHARS), "TAIL");
        let result = generate_suggestions(&service, &content).await.unwrap();

        assert_eq!(result.folders, vec!["Invoices"]);
        let prompt = service.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains(&"a".repeat(MAX_CONTENT_CHARS)));
        assert!(!prompt.contains("TAIL"));
    }

    #[tokio::test]
    async fn test_service_failure_is_retryable() {
        let service = StubService::failing();
        let err = generate_suggestions(&service, "content").await.unwrap_err();
        assert!(matches!(err, NotesError::SuggestionFailed { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_reply_gives_empty_result() {
        let service = StubService::replying("I cannot help with that.");
        let result = generate_suggestions(&service, "content").await.unwrap();
        assert!(result.is_empty());
    }

    fn workspace_with_note(tags: &[&str]) -> (Workspace<MemoryStorage>, String) {
        let mut ws = Workspace::open(MemoryStorage::new()).unwrap();
        let note = ws.add_note(
            NoteDraft::new("Invoice", NoteType::Text)
                .with_content("Pay the plumber")
                .with_tags(tags.iter().map(|t| t.to_string()).collect()),
        );
        ws.set_active_note(Some(note.id.clone()));
        (ws, note.id)
    }

    #[test]
    fn test_existing_tag_not_duplicated() {
        let (mut ws, id) = workspace_with_note(&["x"]);
        let before = ws.store().note(&id).unwrap().clone();

        let suggestions = Suggestions {
            tags: vec!["x".into()],
            ..Default::default()
        };
        assert!(suggestions.pending_for(&before).is_empty());

        let applied = apply_suggestion(&mut ws, &id, &Suggestion::Tag("x".into()));
        assert_eq!(applied, Applied::AlreadyPresent);
        assert_eq!(ws.store().note(&id).unwrap(), &before);
    }

    #[test]
    fn test_blank_tags_are_never_offered_or_counted() {
        let (mut ws, id) = workspace_with_note(&[]);
        let s = parse_suggestions(
            r#"{"tags": ["  ", "ok", ""], "folders": [" "], "organization": []}"#,
        );
        assert_eq!(s.tags, vec!["ok"]);
        assert!(s.folders.is_empty());

        let note = ws.store().note(&id).unwrap().clone();
        let hand_built = Suggestions {
            tags: vec![" ".into(), "ok".into()],
            ..Default::default()
        };
        assert_eq!(hand_built.pending_for(&note), vec![Suggestion::Tag("ok".into())]);

        assert_eq!(
            apply_suggestion(&mut ws, &id, &Suggestion::Tag("   ".into())),
            Applied::Unchanged
        );
        assert!(ws.store().note(&id).unwrap().tags.is_empty());
    }

    #[test]
    fn test_apply_tag_and_folder() {
        let (mut ws, id) = workspace_with_note(&[]);

        assert_eq!(
            apply_suggestion(&mut ws, &id, &Suggestion::Tag("finance".into())),
            Applied::Tag
        );
        assert_eq!(ws.store().note(&id).unwrap().tags, vec!["finance".to_string()]);

        let Applied::Folder(folder) =
            apply_suggestion(&mut ws, &id, &Suggestion::Folder("Invoices".into()))
        else {
            panic!("expected a folder");
        };
        assert_eq!(folder.name, "Invoices");
        assert_eq!(folder.parent_id, None);
        assert_eq!(ws.store().note(&id).unwrap().folder_id, None);

        assert_eq!(
            apply_suggestion(&mut ws, &id, &Suggestion::Organization("tip".into())),
            Applied::NotApplicable
        );
    }

    #[test]
    fn test_stale_target_is_discarded() {
        let (mut ws, id) = workspace_with_note(&[]);
        let other = ws.add_note(NoteDraft::new("Other", NoteType::Text));
        ws.set_active_note(Some(other.id.clone()));

        assert_eq!(
            apply_suggestion(&mut ws, &id, &Suggestion::Tag("late".into())),
            Applied::Discarded
        );
        assert!(ws.store().note(&id).unwrap().tags.is_empty());

        ws.delete_note(&id);
        assert_eq!(
            apply_suggestion(&mut ws, &id, &Suggestion::Folder("F".into())),
            Applied::Discarded
        );
        assert!(ws.store().folders().is_empty());
    }

    #[tokio::test]
    async fn test_task_uses_snapshot_and_reports_target() {
        let (mut ws, id) = workspace_with_note(&[]);
        let service = Arc::new(StubService::replying(GOOD_REPLY));

        let task = SuggestionTask::spawn(Arc::clone(&service), ws.store().note(&id).unwrap());
        ws.update_note(&id, crate::NoteUpdate::content("changed after spawn"));
        assert_eq!(task.note_id(), id);

        let result = task.finish().await.unwrap();
        assert_eq!(result.tags.len(), 3);
        let prompt = service.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Pay the plumber"));
    }

    #[tokio::test]
    async fn test_cancelled_task_reports_failure() {
        struct Hanging;

        #[async_trait]
        impl SuggestionService for Hanging {
            fn has_credential(&self) -> bool {
                true
            }

            async fn complete(&self, _prompt: &str) -> Result<String> {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }

        let (ws, id) = workspace_with_note(&[]);
        let task = SuggestionTask::spawn(Arc::new(Hanging), ws.store().note(&id).unwrap());
        task.cancel();
        let err = task.finish().await.unwrap_err();
        assert!(matches!(err, NotesError::SuggestionFailed { .. }));
    }

    #[test]
    fn test_gemini_client_without_key() {
        let config = AiConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert!(!client.has_credential());
        assert!(client.url().ends_with("/v1beta/models/gemini-pro:generateContent"));
    }
}
