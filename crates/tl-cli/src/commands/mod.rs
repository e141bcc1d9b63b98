//! CLI subcommand implementations.

pub mod convert;
pub mod rules;
pub mod validate;
