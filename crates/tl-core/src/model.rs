//! Structured daily records produced by the converter.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Seconds in a day; activity intervals wrap at midnight.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Tri-state flags recorded in a day's header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFlags {
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub sleep: Option<bool>,
    #[serde(default)]
    pub exercise: Option<bool>,
}

/// One interval of a day, ending at the time written on its line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Description as written, without the timestamp.
    pub raw_text: String,
    pub project_path: String,
    pub duration_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// Source line, 0 when not read from a file.
    #[serde(default)]
    pub line: usize,
}

impl Activity {
    /// Builds an activity, deriving the duration from its endpoints.
    pub fn new(
        start_time: NaiveTime,
        end_time: NaiveTime,
        raw_text: impl Into<String>,
        project_path: impl Into<String>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            raw_text: raw_text.into(),
            project_path: project_path.into(),
            duration_seconds: interval_seconds(start_time, end_time),
            remark: None,
            line: 0,
        }
    }

    #[must_use]
    pub const fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// The structured record of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    #[serde(default)]
    pub flags: DayFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getup_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    /// Line of the date header, 0 when not read from a file.
    #[serde(default)]
    pub line: usize,
}

impl DailyLog {
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            flags: DayFlags {
                status: None,
                sleep: None,
                exercise: None,
            },
            getup_time: None,
            remark: None,
            activities: Vec::new(),
            line: 0,
        }
    }

    /// `YYYY-MM` grouping key.
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }

    pub fn total_seconds(&self) -> i64 {
        self.activities.iter().map(|a| a.duration_seconds).sum()
    }
}

/// Seconds from `start` to `end`, wrapping past midnight.
///
/// Equal times are a zero-length interval, never a full day.
pub fn interval_seconds(start: NaiveTime, end: NaiveTime) -> i64 {
    let start = i64::from(start.num_seconds_from_midnight());
    let end = i64::from(end.num_seconds_from_midnight());
    (end - start).rem_euclid(SECONDS_PER_DAY)
}

/// Groups logs by `YYYY-MM`, each group sorted by date.
pub fn group_by_month(logs: &[DailyLog]) -> BTreeMap<String, Vec<DailyLog>> {
    let mut months: BTreeMap<String, Vec<DailyLog>> = BTreeMap::new();
    for log in logs {
        months.entry(log.month_key()).or_default().push(log.clone());
    }
    for days in months.values_mut() {
        days.sort_by_key(|log| log.date);
    }
    months
}
