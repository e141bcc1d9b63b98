//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tl_core::ValidationMode;

/// Daily activity log converter.
///
/// Turns hand-written daily logs into validated, categorized records and
/// reports every problem found along the way.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert log files into daily records.
    Convert {
        /// Log files to convert.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the records as JSON grouped by month.
        #[arg(long)]
        json: bool,

        /// Append the diagnostics report to this file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Logical validation mode (none, continuity, full).
        #[arg(long)]
        mode: Option<ValidationMode>,
    },

    /// Validate daily records from a JSON file.
    Validate {
        /// JSON array of daily records.
        file: PathBuf,

        /// Logical validation mode (none, continuity, full).
        #[arg(long)]
        mode: Option<ValidationMode>,
    },

    /// Print the effective category rules as JSON.
    Rules,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_parses_files_and_flags() {
        let cli = Cli::parse_from([
            "tl", "convert", "a.txt", "b.txt", "--json", "--mode", "continuity",
        ]);
        let Some(Commands::Convert {
            files, json, mode, ..
        }) = cli.command
        else {
            panic!("expected convert");
        };
        assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert!(json);
        assert_eq!(mode, Some(ValidationMode::Continuity));
    }

    #[test]
    fn test_convert_requires_a_file() {
        assert!(Cli::try_parse_from(["tl", "convert"]).is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["tl", "validate", "x.json", "--mode", "strict"]).is_err());
    }
}
