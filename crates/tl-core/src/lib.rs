//! Core ingestion logic for daily activity logs.
//!
//! This crate contains the fundamental types and logic for:
//! - Scanning: turning line-oriented log text into per-day blocks
//! - Category resolution: mapping activity text to hierarchical project paths
//! - Validation: structural checks while scanning, logical checks per batch
//! - Diagnostics: collecting, ordering and reporting findings

pub mod context;
pub mod diagnostic;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod validate;

pub use context::{DiagnosticsContext, SharedDiagnostics};
pub use diagnostic::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, Severity, SourceSpan, UnknownDiagnosticCode,
};
pub use model::{Activity, DailyLog, DayFlags, group_by_month};
pub use pipeline::{ConversionOutcome, ConvertConfig, ConvertError, ConverterPipeline, ValidationScope};
pub use report::{persist_report, persist_report_to_path, render_report};
pub use rules::{CategoryRuleTable, DurationRule, HeaderField, RuleTableConfig, RuleTableError};
pub use validate::{LogicalValidator, ValidationMode, ValidatorConfig};
