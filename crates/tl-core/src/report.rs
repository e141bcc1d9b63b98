//! Plain-text diagnostics report.
//!
//! Diagnostics are grouped under one header per code, in sorted order:
//!
//! ```text
//! [source_invalid_line_format] Invalid line format (1)
//! log.txt:4: Line 4: invalid line format: unrecognized line
//!     "hello there"
//! ```
//!
//! Writing the report is best effort: a failing sink becomes a
//! `report_write_failed` warning, never an error.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use crate::context::DiagnosticsContext;
use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// Renders one diagnostic as a report entry (without trailing newline).
pub fn render_entry(diagnostic: &Diagnostic) -> String {
    let Some(span) = &diagnostic.span else {
        return format!("Line {}: {}", diagnostic.line_number, diagnostic.message);
    };

    let label = span.line_label();
    let mut out = format!(
        "{}:{label}: Line {label}: {}",
        span.file_path, diagnostic.message
    );
    if let Some(raw) = &span.raw_text {
        let _ = write!(out, "\n    \"{raw}\"");
    }
    out
}

/// Renders every diagnostic in the context, grouped by code.
pub fn render_report(ctx: &DiagnosticsContext) -> String {
    let groups = ctx.grouped();
    if groups.is_empty() {
        return "No diagnostics.\n".to_string();
    }

    let mut out = String::new();
    for (idx, (code, entries)) in groups.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "[{code}] {} ({})", code.title(), entries.len());
        for entry in entries {
            out.push_str(&render_entry(entry));
            out.push('\n');
        }
    }
    out
}

/// Writes the rendered report to `sink`.
///
/// On failure the error is recorded in `ctx` as a warning and `false` is
/// returned; the caller's run continues either way.
pub fn persist_report<W: Write>(ctx: &mut DiagnosticsContext, sink: &mut W) -> bool {
    let text = render_report(ctx);
    match sink.write_all(text.as_bytes()).and_then(|()| sink.flush()) {
        Ok(()) => true,
        Err(err) => {
            record_failure(ctx, "report sink", &err);
            false
        }
    }
}

/// Appends the report to a file, creating it if needed.
pub fn persist_report_to_path(ctx: &mut DiagnosticsContext, path: &Path) -> bool {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => persist_report(ctx, &mut file),
        Err(err) => {
            record_failure(ctx, &path.display().to_string(), &err);
            false
        }
    }
}

fn record_failure(ctx: &mut DiagnosticsContext, destination: &str, err: &io::Error) {
    tracing::warn!(destination, error = %err, "failed to write diagnostics report");
    ctx.emit(Diagnostic::new(
        DiagnosticCode::ReportWriteFailed,
        0,
        format!("could not write diagnostics report to {destination}: {err}"),
    ));
}
