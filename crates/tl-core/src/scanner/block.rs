//! Per-day accumulator used while scanning.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::context::DiagnosticsContext;
use crate::diagnostic::{Diagnostic, DiagnosticCode, SourceSpan};
use crate::model::{Activity, DailyLog, DayFlags};
use crate::rules::{CategoryRuleTable, HeaderField};

/// How a header write relates to what the block already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWrite {
    /// First time the field is set, in the expected position.
    Fresh,
    /// The field was already set on `previous_line`; the new value wins.
    Duplicate { previous_line: usize },
    /// A field that should come later in the header was already set.
    OutOfOrder { after: HeaderField },
    /// A non-remark header after the day's first activity line.
    AfterEvents,
}

/// A finished day plus what overnight linking needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDay {
    pub log: DailyLog,
    /// Time of a wake line that opened the day, if any.
    pub wake_time: Option<NaiveTime>,
}

/// The in-progress record for one date.
#[derive(Debug, Clone)]
pub struct DateBlock {
    pub date: NaiveDate,
    /// Line of the date header.
    pub line: usize,
    date_text: String,
    flags: DayFlags,
    getup_time: Option<NaiveTime>,
    wake_time: Option<NaiveTime>,
    remark_lines: Vec<String>,
    activities: Vec<Activity>,
    /// Where each header field was last set.
    field_lines: BTreeMap<HeaderField, usize>,
    /// Line of the first activity or wake line.
    first_event_line: Option<usize>,
}

impl DateBlock {
    pub fn new(date: NaiveDate, line: usize, date_text: impl Into<String>) -> Self {
        Self {
            date,
            line,
            date_text: date_text.into(),
            flags: DayFlags::default(),
            getup_time: None,
            wake_time: None,
            remark_lines: Vec::new(),
            activities: Vec::new(),
            field_lines: BTreeMap::new(),
            first_event_line: None,
        }
    }

    pub const fn events_started(&self) -> bool {
        self.first_event_line.is_some()
    }

    /// Records that `field` was written on `line` and classifies the write.
    ///
    /// Remark lines accumulate, so repeated remarks are never duplicates.
    pub fn note_header(
        &mut self,
        field: HeaderField,
        line: usize,
        rules: &CategoryRuleTable,
    ) -> HeaderWrite {
        let previous = self.field_lines.insert(field, line);

        if field != HeaderField::Remark && self.events_started() {
            return HeaderWrite::AfterEvents;
        }
        if let Some(previous_line) = previous.filter(|_| field != HeaderField::Remark) {
            return HeaderWrite::Duplicate { previous_line };
        }
        if let Some(position) = rules.header_position(field) {
            let later = self
                .field_lines
                .keys()
                .filter(|other| **other != field)
                .filter_map(|other| rules.header_position(*other).map(|p| (p, *other)))
                .filter(|(p, _)| *p > position)
                .max();
            if let Some((_, after)) = later {
                return HeaderWrite::OutOfOrder { after };
            }
        }
        HeaderWrite::Fresh
    }

    pub const fn set_status(&mut self, value: bool) {
        self.flags.status = Some(value);
    }

    pub const fn set_sleep(&mut self, value: bool) {
        self.flags.sleep = Some(value);
    }

    pub const fn set_exercise(&mut self, value: bool) {
        self.flags.exercise = Some(value);
    }

    pub const fn set_getup(&mut self, time: NaiveTime) {
        self.getup_time = Some(time);
    }

    pub fn push_remark(&mut self, text: &str) {
        if !text.is_empty() {
            self.remark_lines.push(text.to_string());
        }
    }

    /// Whether the next wake line opens the day rather than logging a nap.
    pub const fn awaiting_wake(&self) -> bool {
        self.activities.is_empty() && self.wake_time.is_none()
    }

    /// A wake line at the start of the day: sets getup time and the sleep flag.
    pub fn mark_wake(&mut self, time: NaiveTime, line: usize) {
        self.wake_time = Some(time);
        self.getup_time.get_or_insert(time);
        self.flags.sleep = Some(true);
        self.first_event_line.get_or_insert(line);
    }

    /// Where the next activity starts.
    pub fn next_start(&self, day_start: NaiveTime) -> NaiveTime {
        self.activities
            .last()
            .map(|a| a.end_time)
            .or(self.wake_time)
            .or(self.getup_time)
            .unwrap_or(day_start)
    }

    pub fn push_activity(&mut self, activity: Activity) {
        self.first_event_line.get_or_insert(activity.line);
        self.activities.push(activity);
    }

    fn header_present(&self, field: HeaderField) -> bool {
        match field {
            HeaderField::Status => self.flags.status.is_some(),
            HeaderField::Sleep => self.flags.sleep.is_some(),
            HeaderField::Exercise => self.flags.exercise.is_some(),
            HeaderField::Getup => self.getup_time.is_some(),
            HeaderField::Remark => true,
        }
    }

    /// Runs the deferred block checks and produces the day's record.
    pub fn finalize(
        self,
        rules: &CategoryRuleTable,
        file_path: &str,
        ctx: &mut DiagnosticsContext,
    ) -> ScannedDay {
        for field in rules.header_order() {
            if !self.header_present(*field) {
                ctx.emit(
                    Diagnostic::new(
                        DiagnosticCode::SourceMissingHeader,
                        self.line,
                        format!("{} has no '{field}' header", self.date),
                    )
                    .with_span(SourceSpan::line(file_path, self.line, &self.date_text)),
                );
            }
        }

        tracing::debug!(
            date = %self.date,
            activities = self.activities.len(),
            "finalized day block"
        );

        let remark = (!self.remark_lines.is_empty()).then(|| self.remark_lines.join("\n"));
        ScannedDay {
            log: DailyLog {
                date: self.date,
                flags: self.flags,
                getup_time: self.getup_time,
                remark,
                activities: self.activities,
                line: self.line,
            },
            wake_time: self.wake_time,
        }
    }
}
