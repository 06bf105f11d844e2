//! lazydynamo CLI library.
//!
//! Types, command handlers and output formatting behind the `lazydynamo`
//! binary. Every data command goes through the same
//! [`FetchOrchestrator`](lazydynamo_core::FetchOrchestrator) and
//! [`Browser`](lazydynamo_core::Browser) model an interactive front end
//! would use; the CLI simply drives it to completion and prints the result.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

use cli::{Cli, Commands};
use config::Settings;

/// Dispatch a parsed [`Cli`] to the appropriate command handler.
pub async fn run(cli: Cli) -> error::CliResult<()> {
    let mut settings = Settings::load(&cli)?;

    match cli.command {
        Commands::Tables { filter, refresh } => {
            commands::tables::run(&settings, filter.as_deref(), refresh).await
        }

        Commands::Scan {
            table,
            format,
            inspect,
            refresh,
            segments,
        } => {
            if let Some(segments) = segments {
                settings.scan = settings.scan.with_segments(segments);
            }
            let opts = commands::scan::ScanOpts {
                format,
                inspect,
                refresh,
            };
            commands::scan::run(&settings, &table, &opts).await
        }

        Commands::Cache { action } => commands::cache::run(action, &settings).await,

        Commands::Config { action } => {
            commands::config_cmd::run(action, &settings);
            Ok(())
        }
    }
}
