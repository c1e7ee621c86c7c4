//! mzcloud-provider - Entry Point
//!
//! Creates, reads, updates and deletes a Materialize Cloud deployment and
//! waits for it to settle. The deployment record is kept in a JSON state file
//! between invocations.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use colored::Colorize;
use mzcloud_provider::app::options::ProviderOptions;
use mzcloud_provider::app::run::{run, Command, StateOptions};
use mzcloud_provider::authn::access_token::AccessToken;
use mzcloud_provider::filesys::file::File;
use mzcloud_provider::logs::{init_logging, LogOptions};
use mzcloud_provider::models::deployment::DesiredConfig;
use mzcloud_provider::storage::settings::Settings;
use mzcloud_provider::utils::version_info;
use tracing::{error, info};

const DEFAULT_STATE_FILE: &str = "mzcloud-deployment.json";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let mut cli_args: HashMap<String, String> = HashMap::new();
    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    match run_cli(&cli_args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli_args: &HashMap<String, String>) -> anyhow::Result<()> {
    let command = parse_command(cli_args)?;

    let settings_file = File::new(
        cli_args
            .get("settings")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("mzcloud-provider.json")),
    );
    let settings = Settings::load(&settings_file)
        .await
        .with_context(|| format!("unable to read {}", settings_file.path().display()))?;

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.as_ref().map(PathBuf::from),
        json_format: settings.json_logs,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let token = AccessToken::resolve(settings.access_token.as_deref())?;
    let options = ProviderOptions::from(&settings);
    let state = StateOptions {
        state_file: File::new(
            cli_args
                .get("state")
                .map(String::as_str)
                .unwrap_or(DEFAULT_STATE_FILE),
        ),
        adopt_id: cli_args.get("id").cloned(),
    };

    info!("Running {:?} with options: {:?}", command, options);
    let view = run(command, &options, token, &state, await_shutdown_signal()).await?;

    match view {
        Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
        None => eprintln!("{}", "deployment deleted".green()),
    }
    Ok(())
}

fn parse_command(cli_args: &HashMap<String, String>) -> anyhow::Result<Command> {
    let desired = || -> anyhow::Result<DesiredConfig> {
        let mz_version = cli_args
            .get("mz-version")
            .context("--mz-version=<version> is required")?;
        let size = cli_args.get("size").cloned().unwrap_or_default();
        Ok(DesiredConfig::new(size, mz_version.clone()))
    };

    let requested: Vec<&str> = ["create", "read", "update", "delete"]
        .into_iter()
        .filter(|op| cli_args.contains_key(*op))
        .collect();

    match requested.as_slice() {
        ["create"] => Ok(Command::Create(desired()?)),
        ["read"] => Ok(Command::Read),
        ["update"] => Ok(Command::Update(desired()?)),
        ["delete"] => Ok(Command::Delete),
        [] => bail!("one of --create, --read, --update or --delete is required"),
        _ => bail!("only one operation may be given, got {}", requested.join(", ")),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to listen for Ctrl+C");
            return std::future::pending().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
