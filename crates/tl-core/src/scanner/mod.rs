//! Line-by-line scanner and structural validation.
//!
//! The scanner is a small state machine:
//!
//! - `NoBlock`: before the first date line; any content is reported and dropped.
//! - `InBlock`: header and activity lines update the current [`DateBlock`].
//! - `Skipping`: the last date line could not open a block (invalid or
//!   duplicate date); lines are dropped silently until the next date line.
//!
//! Structural problems become diagnostics on the spot and never stop the scan.

mod block;
pub mod line;

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};

pub use block::{DateBlock, HeaderWrite, ScannedDay};
use line::{LineKind, classify, parse_flag, parse_hhmm};

use crate::context::DiagnosticsContext;
use crate::diagnostic::{Diagnostic, DiagnosticCode, SourceSpan};
use crate::model::{Activity, interval_seconds};
use crate::resolver;
use crate::rules::{CategoryRuleTable, HeaderField};

/// Scanner settings that are not part of the rule tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Start of the first activity when the day has no getup time.
    pub day_start: NaiveTime,
    /// Year used for `MM_DD` dates seen before any full date.
    pub fallback_year: i32,
}

#[derive(Debug)]
enum ScanState {
    NoBlock,
    InBlock(DateBlock),
    Skipping,
}

/// Turns lines into finished days, one call per line.
#[derive(Debug)]
pub struct LineScanner<'r> {
    rules: &'r CategoryRuleTable,
    options: ScanOptions,
    file_path: String,
    state: ScanState,
    year: Option<i32>,
    seen_dates: HashSet<NaiveDate>,
}

impl<'r> LineScanner<'r> {
    pub fn new(
        rules: &'r CategoryRuleTable,
        options: ScanOptions,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            options,
            file_path: file_path.into(),
            state: ScanState::NoBlock,
            year: None,
            seen_dates: HashSet::new(),
        }
    }

    fn report(
        &self,
        ctx: &mut DiagnosticsContext,
        code: DiagnosticCode,
        line_number: usize,
        raw: &str,
        columns: Option<(usize, usize)>,
        message: String,
    ) {
        let mut span = SourceSpan::line(&self.file_path, line_number, raw);
        if let Some((start, end)) = columns {
            span = span.with_columns(start, end);
        }
        ctx.emit(Diagnostic::new(code, line_number, message).with_span(span));
    }

    /// Feeds one raw line. Returns the previous day when a date line closes it.
    pub fn scan_line(
        &mut self,
        line_number: usize,
        raw: &str,
        ctx: &mut DiagnosticsContext,
    ) -> Option<ScannedDay> {
        let text = raw.trim();
        match classify(text, self.rules) {
            LineKind::Blank => None,
            LineKind::Date { year, month, day } => {
                self.start_block(line_number, text, year, month, day, ctx)
            }
            kind => {
                if matches!(self.state, ScanState::NoBlock) {
                    self.report(
                        ctx,
                        DiagnosticCode::SourceNoDateAtStart,
                        line_number,
                        text,
                        None,
                        "content before the first date line".to_string(),
                    );
                } else if matches!(self.state, ScanState::InBlock(_)) {
                    self.scan_in_block(line_number, text, kind, ctx);
                }
                None
            }
        }
    }

    /// Closes the scan, returning the last open day.
    pub fn finish(self, ctx: &mut DiagnosticsContext) -> Option<ScannedDay> {
        match self.state {
            ScanState::InBlock(block) => Some(block.finalize(self.rules, &self.file_path, ctx)),
            ScanState::NoBlock | ScanState::Skipping => None,
        }
    }

    fn close_current(&mut self, ctx: &mut DiagnosticsContext) -> Option<ScannedDay> {
        match std::mem::replace(&mut self.state, ScanState::NoBlock) {
            ScanState::InBlock(block) => Some(block.finalize(self.rules, &self.file_path, ctx)),
            ScanState::NoBlock | ScanState::Skipping => None,
        }
    }

    fn start_block(
        &mut self,
        line_number: usize,
        text: &str,
        year: Option<i32>,
        month: u32,
        day: u32,
        ctx: &mut DiagnosticsContext,
    ) -> Option<ScannedDay> {
        let finished = self.close_current(ctx);

        if let Some(year) = year {
            self.year = Some(year);
        }
        let assumed_year = self.year.is_none();
        let year = self.year.unwrap_or(self.options.fallback_year);

        // One diagnostic per line: a rejected date wins over the missing year.
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            self.report(
                ctx,
                DiagnosticCode::SourceInvalidDate,
                line_number,
                text,
                None,
                format!("'{text}' is not a calendar date in {year}; skipping the day"),
            );
            self.state = ScanState::Skipping;
            return finished;
        };

        if !self.seen_dates.insert(date) {
            self.report(
                ctx,
                DiagnosticCode::SourceDuplicateDate,
                line_number,
                text,
                None,
                format!("{date} appears more than once; skipping the repeated day"),
            );
            self.state = ScanState::Skipping;
            return finished;
        }

        if assumed_year {
            self.report(
                ctx,
                DiagnosticCode::SourceMissingYearHeader,
                line_number,
                text,
                None,
                format!("date '{text}' has no year and no earlier full date; assuming {year}"),
            );
        }

        tracing::debug!(%date, line = line_number, "started day block");
        self.state = ScanState::InBlock(DateBlock::new(date, line_number, text));
        finished
    }

    fn scan_in_block(
        &mut self,
        line_number: usize,
        text: &str,
        kind: LineKind<'_>,
        ctx: &mut DiagnosticsContext,
    ) {
        match kind {
            LineKind::Header {
                field,
                value,
                value_column,
            } => self.scan_header(line_number, text, field, value, value_column, ctx),
            LineKind::Activity {
                end_time,
                description,
                remark,
                description_column,
            } => self.scan_activity(
                line_number,
                text,
                end_time,
                description,
                remark,
                description_column,
                ctx,
            ),
            LineKind::Invalid {
                reason,
                column_start,
                column_end,
            } => self.report(
                ctx,
                DiagnosticCode::SourceInvalidLineFormat,
                line_number,
                text,
                Some((column_start, column_end)),
                format!("invalid line format: {reason}"),
            ),
            LineKind::Blank | LineKind::Date { .. } => {}
        }
    }

    fn scan_header(
        &mut self,
        line_number: usize,
        text: &str,
        field: HeaderField,
        value: &str,
        value_column: usize,
        ctx: &mut DiagnosticsContext,
    ) {
        let value_columns = Some((value_column, text.chars().count().max(value_column)));

        // Validate the value before touching the block so malformed lines are skipped whole.
        let parsed = match field {
            HeaderField::Status | HeaderField::Sleep | HeaderField::Exercise => {
                parse_flag(value).map(HeaderValue::Flag)
            }
            HeaderField::Getup => parse_hhmm(value).map(HeaderValue::Time),
            HeaderField::Remark => Some(HeaderValue::Text),
        };
        let Some(parsed) = parsed else {
            self.report(
                ctx,
                DiagnosticCode::SourceInvalidLineFormat,
                line_number,
                text,
                value_columns,
                format!("invalid line format: bad '{field}' value '{value}'"),
            );
            return;
        };

        let ScanState::InBlock(block) = &mut self.state else {
            return;
        };
        let write = block.note_header(field, line_number, self.rules);
        let date = block.date;
        match parsed {
            HeaderValue::Flag(flag) => match field {
                HeaderField::Status => block.set_status(flag),
                HeaderField::Sleep => block.set_sleep(flag),
                _ => block.set_exercise(flag),
            },
            HeaderValue::Time(time) => block.set_getup(time),
            HeaderValue::Text => block.push_remark(value),
        }

        let finding = match write {
            HeaderWrite::Fresh => None,
            HeaderWrite::AfterEvents if field == HeaderField::Remark => None,
            HeaderWrite::AfterEvents => Some((
                DiagnosticCode::SourceHeaderOutOfOrder,
                format!("'{field}' header after the first activity of {date}"),
            )),
            HeaderWrite::Duplicate { previous_line } => Some((
                DiagnosticCode::SourceDuplicateHeader,
                format!("'{field}' already set on line {previous_line} for {date}; using the later value"),
            )),
            HeaderWrite::OutOfOrder { after } => Some((
                DiagnosticCode::SourceHeaderOutOfOrder,
                format!("'{field}' header should come before '{after}' for {date}"),
            )),
        };
        let remark_late = field == HeaderField::Remark && self.block_events_started();
        if remark_late {
            self.report(
                ctx,
                DiagnosticCode::SourceRemarkAfterEvent,
                line_number,
                text,
                None,
                format!("remark after the first activity of {date}"),
            );
        } else if let Some((code, message)) = finding {
            self.report(ctx, code, line_number, text, None, message);
        }
    }

    fn block_events_started(&self) -> bool {
        matches!(&self.state, ScanState::InBlock(block) if block.events_started())
    }

    #[expect(
        clippy::too_many_arguments,
        reason = "mirrors the fields of LineKind::Activity"
    )]
    fn scan_activity(
        &mut self,
        line_number: usize,
        text: &str,
        end_time: NaiveTime,
        description: &str,
        remark: Option<&str>,
        description_column: usize,
        ctx: &mut DiagnosticsContext,
    ) {
        let day_start = self.options.day_start;
        let rules = self.rules;
        let ScanState::InBlock(block) = &mut self.state else {
            return;
        };

        let start_time = block.next_start(day_start);
        let duration_seconds = interval_seconds(start_time, end_time);
        let resolution = resolver::resolve(description, duration_seconds, rules);

        if resolution.is_wake() && block.awaiting_wake() {
            block.mark_wake(end_time, line_number);
            return;
        }

        let date = block.date;
        let recognized = resolution.recognized();
        block.push_activity(Activity {
            start_time,
            end_time,
            raw_text: description.to_string(),
            project_path: resolution.path,
            duration_seconds,
            remark: remark.map(str::to_string),
            line: line_number,
        });

        if !recognized {
            let column_end = description_column + description.chars().count().saturating_sub(1);
            self.report(
                ctx,
                DiagnosticCode::UnrecognizedActivity,
                line_number,
                text,
                Some((description_column, column_end)),
                format!("unrecognized activity '{description}' on {date}; using it as its own category"),
            );
        }
    }
}

/// A header value that passed validation.
enum HeaderValue {
    Flag(bool),
    Time(NaiveTime),
    Text,
}
