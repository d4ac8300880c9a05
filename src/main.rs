mod commands;
mod logging;
mod reporter;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use check_it_all::config::{load_configuration, AppConfig};
use check_it_all::scanner::FileDescriptor;
use check_it_all::{AdmissionEngine, Filter};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use reporter::CliReporter;
use tracing::{error, info};

const EXIT_INADMISSIBLE: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let result = match args.command {
        Some(Commands::Check { folder }) => run_check(&config, folder),
        Some(Commands::PrintConfig) => print_config(&config).map(|()| ExitCode::SUCCESS),
        Some(Commands::TestFilter { paths }) => {
            run_test_filter(&config, &paths).map(|()| ExitCode::SUCCESS)
        }
        None => print_help().map(|()| ExitCode::SUCCESS),
    };

    result.unwrap_or_else(|err| {
        error!("Error: {:#}", err);
        ExitCode::from(EXIT_FATAL)
    })
}

fn print_help() -> anyhow::Result<()> {
    Cli::command()
        .print_long_help()
        .context("Cannot print help")?;
    Ok(())
}

fn run_check(config: &AppConfig, folder: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let folder = folder
        .or_else(|| config.folder.clone())
        .ok_or_else(|| anyhow!("No folder given: pass FOLDER or set `folder` in the configuration"))?;

    let engine = AdmissionEngine::from_config(config).context("Error building admission engine")?;
    let reporter = CliReporter::new();
    let result = engine.run(&folder, &reporter);
    reporter.finish_bar();
    let outcome = result.with_context(|| format!("Check of {} aborted", folder.display()))?;

    let stats = &outcome.stats;
    println!();
    info!(
        "{} files found, {} ignored, {} oversize, {} submitted, {} uploaded in {}",
        format!("{}", outcome.files_found).cyan(),
        format!("{}", stats.ignored).cyan(),
        format!("{}", stats.oversize).cyan(),
        format!("{}", stats.submitted).cyan(),
        format!("{}", stats.uploaded).cyan(),
        format!("{:.2}s", outcome.duration.as_secs_f64()).green(),
    );
    if stats.file_errors > 0 {
        info!(
            "{} files rejected on read errors",
            format!("{}", stats.file_errors).red()
        );
    }

    if outcome.is_success() {
        info!("{}", outcome.to_string().green());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{}", outcome.to_string().red());
        Ok(ExitCode::from(EXIT_INADMISSIBLE))
    }
}

fn print_config(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(config)?;
    println!("Configuration: {}", rendered);
    let api_key = if config.analyzer.api_key.is_empty() {
        "<unset>"
    } else {
        "********"
    };
    println!("analyzer.api_key: {}", api_key);
    Ok(())
}

fn run_test_filter(config: &AppConfig, paths: &[PathBuf]) -> anyhow::Result<()> {
    let filter = Filter::from_config(config)?;
    for path in paths {
        let file = FileDescriptor::from_path(path)
            .with_context(|| format!("Cannot stat {}", path.display()))?;
        if !file.is_regular() {
            println!("{} {} ({})", "skip  ".yellow(), path.display(), file.kind());
            continue;
        }
        if filter.evaluate(&file)? {
            println!("{} {}", "submit".green(), path.display());
        } else {
            println!("{} {}", "ignore".dimmed(), path.display());
        }
    }
    Ok(())
}
