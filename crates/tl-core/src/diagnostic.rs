//! Diagnostic records produced while converting and validating daily logs.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad family a diagnostic code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// Raised by the line scanner while reading the input.
    SourceFormat,
    /// An activity could not be mapped to a configured category.
    CategoryResolution,
    /// Raised after a batch of days has been assembled.
    LogicalConsistency,
    /// Side-channel I/O that never aborts a run.
    Reporting,
}

/// Closed taxonomy of diagnostic codes.
///
/// Declaration order is the tie-breaker when sorting diagnostics that share a
/// line number, so new variants should be appended within their family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticCode {
    SourceInvalidLineFormat,
    SourceNoDateAtStart,
    SourceRemarkAfterEvent,
    SourceMissingYearHeader,
    SourceDuplicateHeader,
    SourceHeaderOutOfOrder,
    SourceMissingHeader,
    SourceInvalidDate,
    SourceDuplicateDate,
    UnrecognizedActivity,
    DateContinuity,
    IncorrectDayCountForMonth,
    TimeDiscontinuity,
    MissingSleepNight,
    TooFewActivities,
    ZeroDurationActivity,
    ActivityDurationTooLong,
    ReportWriteFailed,
}

impl DiagnosticCode {
    /// Every code, in sort order.
    pub const ALL: [Self; 18] = [
        Self::SourceInvalidLineFormat,
        Self::SourceNoDateAtStart,
        Self::SourceRemarkAfterEvent,
        Self::SourceMissingYearHeader,
        Self::SourceDuplicateHeader,
        Self::SourceHeaderOutOfOrder,
        Self::SourceMissingHeader,
        Self::SourceInvalidDate,
        Self::SourceDuplicateDate,
        Self::UnrecognizedActivity,
        Self::DateContinuity,
        Self::IncorrectDayCountForMonth,
        Self::TimeDiscontinuity,
        Self::MissingSleepNight,
        Self::TooFewActivities,
        Self::ZeroDurationActivity,
        Self::ActivityDurationTooLong,
        Self::ReportWriteFailed,
    ];

    /// Stable identifier used in reports and JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SourceInvalidLineFormat => "source_invalid_line_format",
            Self::SourceNoDateAtStart => "source_no_date_at_start",
            Self::SourceRemarkAfterEvent => "source_remark_after_event",
            Self::SourceMissingYearHeader => "source_missing_year_header",
            Self::SourceDuplicateHeader => "source_duplicate_header",
            Self::SourceHeaderOutOfOrder => "source_header_out_of_order",
            Self::SourceMissingHeader => "source_missing_header",
            Self::SourceInvalidDate => "source_invalid_date",
            Self::SourceDuplicateDate => "source_duplicate_date",
            Self::UnrecognizedActivity => "unrecognized_activity",
            Self::DateContinuity => "date_continuity",
            Self::IncorrectDayCountForMonth => "incorrect_day_count_for_month",
            Self::TimeDiscontinuity => "time_discontinuity",
            Self::MissingSleepNight => "missing_sleep_night",
            Self::TooFewActivities => "too_few_activities",
            Self::ZeroDurationActivity => "zero_duration_activity",
            Self::ActivityDurationTooLong => "activity_duration_too_long",
            Self::ReportWriteFailed => "report_write_failed",
        }
    }

    /// Human-readable heading for report sections.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::SourceInvalidLineFormat => "Invalid line format",
            Self::SourceNoDateAtStart => "Content before the first date",
            Self::SourceRemarkAfterEvent => "Remark after the first activity",
            Self::SourceMissingYearHeader => "Short date without a year",
            Self::SourceDuplicateHeader => "Duplicate header field",
            Self::SourceHeaderOutOfOrder => "Header field out of order",
            Self::SourceMissingHeader => "Missing header field",
            Self::SourceInvalidDate => "Invalid date",
            Self::SourceDuplicateDate => "Duplicate date",
            Self::UnrecognizedActivity => "Unrecognized activity",
            Self::DateContinuity => "Missing dates",
            Self::IncorrectDayCountForMonth => "Incorrect day count for month",
            Self::TimeDiscontinuity => "Time discontinuity",
            Self::MissingSleepNight => "Missing night sleep",
            Self::TooFewActivities => "Too few activities",
            Self::ZeroDurationActivity => "Zero-duration activity",
            Self::ActivityDurationTooLong => "Activity too long",
            Self::ReportWriteFailed => "Report write failure",
        }
    }

    #[must_use]
    pub const fn category(&self) -> DiagnosticCategory {
        match self {
            Self::SourceInvalidLineFormat
            | Self::SourceNoDateAtStart
            | Self::SourceRemarkAfterEvent
            | Self::SourceMissingYearHeader
            | Self::SourceDuplicateHeader
            | Self::SourceHeaderOutOfOrder
            | Self::SourceMissingHeader
            | Self::SourceInvalidDate
            | Self::SourceDuplicateDate => DiagnosticCategory::SourceFormat,
            Self::UnrecognizedActivity => DiagnosticCategory::CategoryResolution,
            Self::DateContinuity
            | Self::IncorrectDayCountForMonth
            | Self::TimeDiscontinuity
            | Self::MissingSleepNight
            | Self::TooFewActivities
            | Self::ZeroDurationActivity
            | Self::ActivityDurationTooLong => DiagnosticCategory::LogicalConsistency,
            Self::ReportWriteFailed => DiagnosticCategory::Reporting,
        }
    }

    /// Severity a diagnostic with this code is raised at.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::SourceInvalidLineFormat
            | Self::SourceNoDateAtStart
            | Self::SourceInvalidDate
            | Self::SourceDuplicateDate => Severity::Error,
            Self::SourceRemarkAfterEvent
            | Self::SourceMissingYearHeader
            | Self::SourceDuplicateHeader
            | Self::SourceHeaderOutOfOrder
            | Self::SourceMissingHeader
            | Self::UnrecognizedActivity
            | Self::ReportWriteFailed => Severity::Warn,
            Self::DateContinuity
            | Self::IncorrectDayCountForMonth
            | Self::TimeDiscontinuity
            | Self::MissingSleepNight
            | Self::TooFewActivities
            | Self::ZeroDurationActivity
            | Self::ActivityDurationTooLong => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticCode {
    type Err = UnknownDiagnosticCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownDiagnosticCode(s.to_string()))
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DiagnosticCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown diagnostic code strings.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown diagnostic code: {0}")]
pub struct UnknownDiagnosticCode(String);

/// Where in the input a diagnostic points.
///
/// Lines and columns are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl SourceSpan {
    /// Span covering one whole line.
    pub fn line(file_path: impl Into<String>, line: usize, raw_text: &str) -> Self {
        Self {
            file_path: file_path.into(),
            line_start: line,
            line_end: line,
            column_start: 1,
            column_end: raw_text.chars().count().max(1),
            raw_text: Some(raw_text.to_string()),
        }
    }

    /// Span covering several lines without quoting any text.
    pub fn lines(file_path: impl Into<String>, line_start: usize, line_end: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line_start,
            line_end: line_end.max(line_start),
            column_start: 1,
            column_end: 1,
            raw_text: None,
        }
    }

    /// Narrows the span to a column range on its first line.
    #[must_use]
    pub const fn with_columns(mut self, column_start: usize, column_end: usize) -> Self {
        self.column_start = column_start;
        self.column_end = column_end;
        self
    }

    /// `12` or `12-14`.
    pub fn line_label(&self) -> String {
        if self.line_end > self.line_start {
            format!("{}-{}", self.line_start, self.line_end)
        } else {
            self.line_start.to_string()
        }
    }
}

/// A single finding about the input or the converted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// 1-based line; 0 when the finding is not tied to a line.
    pub line_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    /// Creates a diagnostic at the code's default severity.
    pub fn new(code: DiagnosticCode, line_number: usize, message: impl Into<String>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
            line_number,
            span: None,
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line_number
            .cmp(&other.line_number)
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.severity.cmp(&other.severity))
            .then_with(|| self.span.cmp(&other.span))
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
