//! Convert command: log files to validated daily records.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tl_core::{
    ConversionOutcome, ConverterPipeline, DailyLog, SharedDiagnostics, ValidationMode,
    persist_report_to_path,
};

use crate::Config;

/// Flags of `tl convert`.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub json: bool,
    pub report: Option<PathBuf>,
    pub mode: Option<ValidationMode>,
}

#[derive(Serialize)]
struct FileSummary<'a> {
    source: &'a str,
    validation_failed: bool,
    diagnostics: usize,
    months: BTreeMap<String, Vec<DailyLog>>,
}

impl<'a> FileSummary<'a> {
    fn new(outcome: &'a ConversionOutcome) -> Self {
        Self {
            source: &outcome.source_name,
            validation_failed: outcome.validation_failed(),
            diagnostics: outcome.diagnostics.len(),
            months: outcome.months(),
        }
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    files: &[PathBuf],
    options: &ConvertOptions,
) -> Result<()> {
    let mut convert_config = config.convert.clone();
    if let Some(mode) = options.mode {
        convert_config.validation.mode = mode;
    }
    let pipeline =
        ConverterPipeline::new(&convert_config).context("invalid rule configuration")?;

    let report_path = options.report.as_ref().unwrap_or(&config.report_path);
    let shared = SharedDiagnostics::new();
    let mut outcomes = Vec::with_capacity(files.len());
    let mut failure = None;
    for (path, result) in pipeline.convert_many(files, &shared) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) if failure.is_none() => failure = Some((path, err)),
            Err(err) => {
                tracing::debug!(error = %err, path = %path.display(), "further conversion failure");
            }
        }
    }
    if let Some((path, err)) = failure {
        // Diagnostics of the files that did convert still reach the report.
        write_report(&shared, report_path);
        return Err(err).with_context(|| format!("failed to convert {}", path.display()));
    }

    if options.json {
        let summaries: Vec<_> = outcomes.iter().map(FileSummary::new).collect();
        serde_json::to_writer_pretty(&mut *writer, &summaries)?;
        writeln!(writer)?;
    } else {
        for outcome in &outcomes {
            write_summary(writer, outcome)?;
        }
    }

    write_report(&shared, report_path);

    let failed = outcomes.iter().filter(|o| o.validation_failed()).count();
    if failed > 0 {
        bail!("{failed} of {} files failed validation", outcomes.len());
    }
    Ok(())
}

fn write_summary<W: Write>(writer: &mut W, outcome: &ConversionOutcome) -> Result<()> {
    let status = if outcome.validation_failed() {
        "FAILED"
    } else {
        "ok"
    };
    writeln!(
        writer,
        "{}: {} days, {} diagnostics [{status}]",
        outcome.source_name,
        outcome.daily_logs.len(),
        outcome.diagnostics.len()
    )?;
    for (month, days) in outcome.months() {
        writeln!(writer, "  {month}: {} days", days.len())?;
    }
    Ok(())
}

/// Appends the batch report; failures are logged and otherwise ignored.
fn write_report(shared: &SharedDiagnostics, path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            tracing::debug!(error = %err, dir = %parent.display(), "could not create report directory");
        }
    }
    let mut report = shared.snapshot();
    if persist_report_to_path(&mut report, path) {
        tracing::debug!(path = %path.display(), "wrote diagnostics report");
    }
}
