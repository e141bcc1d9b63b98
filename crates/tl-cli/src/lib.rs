//! Daily activity log converter CLI library.
//!
//! This crate provides the CLI interface around `tl-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
