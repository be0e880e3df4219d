//! famcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use famcal::cli::{Cli, Command, ConfigAction};
use famcal::commands;
use famcal::config::AppConfig;
use famcal::error::ClientResult;
use famcal::service::CalendarService;
use famcal_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command; `Ok(false)` means it ran but reported failure.
async fn run(cli: Cli) -> ClientResult<bool> {
    let path = cli.config_path();

    match cli.command {
        Some(Command::Config { action }) => {
            match action {
                ConfigAction::Dump => commands::config::dump(&path)?,
                ConfigAction::Validate => commands::config::validate(&path)?,
                ConfigAction::Path => commands::config::path(&path)?,
            }
            Ok(true)
        }
        Some(Command::Status) => {
            let settings = AppConfig::load(&path)?.validate()?;
            let service = CalendarService::new(settings);
            commands::status::run(&service, cli.json).await
        }
        None => {
            let settings = AppConfig::load(&path)?.validate()?;
            let days = cli.days.unwrap_or(settings.days_to_display);
            let service = CalendarService::new(settings);
            commands::events::run(&service, days, cli.json).await?;
            Ok(true)
        }
    }
}
