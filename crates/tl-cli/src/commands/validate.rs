//! Validate command: logical checks over previously converted records.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tl_core::{ConverterPipeline, DailyLog, DiagnosticsContext, ValidationMode, render_report};

use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    file: &Path,
    mode: Option<ValidationMode>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let logs: Vec<DailyLog> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of daily logs", file.display()))?;

    let mut convert_config = config.convert.clone();
    if let Some(mode) = mode {
        convert_config.validation.mode = mode;
    }
    let pipeline =
        ConverterPipeline::new(&convert_config).context("invalid rule configuration")?;

    let mut ctx = DiagnosticsContext::new();
    let raised = pipeline.validate_batch(&logs, &file.display().to_string(), &mut ctx);
    tracing::debug!(days = logs.len(), raised, "validated records");

    write!(writer, "{}", render_report(&ctx))?;

    if ctx.has_errors() {
        bail!("validation failed for {}", file.display());
    }
    Ok(())
}
