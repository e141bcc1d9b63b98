use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tl_cli::commands::convert::ConvertOptions;
use tl_cli::commands::{convert, rules, validate};
use tl_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Diagnostics are logged to stderr so stdout stays parseable with --json
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();
    match &cli.command {
        Some(Commands::Convert {
            files,
            json,
            report,
            mode,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let options = ConvertOptions {
                json: *json,
                report: report.clone(),
                mode: *mode,
            };
            convert::run(&mut stdout, &config, files, &options)?;
        }
        Some(Commands::Validate { file, mode }) => {
            let config = load_config(cli.config.as_deref())?;
            validate::run(&mut stdout, &config, file, *mode)?;
        }
        Some(Commands::Rules) => {
            let config = load_config(cli.config.as_deref())?;
            rules::run(&mut stdout, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }
    stdout.flush()?;

    Ok(())
}
