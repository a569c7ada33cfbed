use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use notely::{App, Cli, Config};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        config,
        data_dir,
        verbose,
        command,
    } = Cli::parse();
    initialize_logger(verbose);

    let result = async move {
        let mut config = Config::load(config.as_deref())?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }

        let mut app = App::new(config, verbose)?;
        app.run(command).await
    }
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                eprintln!("This may be temporary; try again.");
            }
            ExitCode::FAILURE
        }
    }
}
