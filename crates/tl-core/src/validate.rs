//! Cross-day validation of an assembled batch of daily logs.
//!
//! The validator never rejects a batch: every finding goes into the
//! [`DiagnosticsContext`] and the caller decides what a failure means.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::context::DiagnosticsContext;
use crate::diagnostic::{Diagnostic, DiagnosticCode, SourceSpan};
use crate::model::{Activity, DailyLog};

/// Which logical checks run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Skip logical validation.
    None,
    /// Date continuity only.
    Continuity,
    /// Every check.
    #[default]
    Full,
}

impl ValidationMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Continuity => "continuity",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "continuity" => Ok(Self::Continuity),
            "full" => Ok(Self::Full),
            _ => Err(format!("invalid validation mode: {s}")),
        }
    }
}

/// Configuration for logical validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub mode: ValidationMode,

    /// Require every calendar day of each month in the batch.
    /// Default: false (a month in progress would always fail).
    pub check_day_count: bool,

    /// Days with fewer activities are reported.
    /// Default: 2.
    pub min_activities: usize,

    /// Longest plausible single activity.
    /// Default: 16 hours.
    pub max_activity_hours: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Full,
            check_day_count: false,
            min_activities: 2,
            max_activity_hours: 16,
        }
    }
}

/// Runs logical checks over one batch of days.
#[derive(Debug, Clone)]
pub struct LogicalValidator {
    config: ValidatorConfig,
    sleep_path: String,
}

/// Number of days in a calendar month, accounting for leap years.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

fn hhmm(activity_time: chrono::NaiveTime) -> String {
    activity_time.format("%H:%M").to_string()
}

impl LogicalValidator {
    /// `sleep_path` is the fully expanded path a day must end with.
    pub fn new(config: ValidatorConfig, sleep_path: impl Into<String>) -> Self {
        Self {
            config,
            sleep_path: sleep_path.into(),
        }
    }

    /// Validates a batch, returning how many diagnostics were raised.
    ///
    /// `file_path` labels spans; logs built outside the scanner have line 0.
    pub fn validate(
        &self,
        logs: &[DailyLog],
        file_path: &str,
        ctx: &mut DiagnosticsContext,
    ) -> usize {
        if self.config.mode == ValidationMode::None || logs.is_empty() {
            return 0;
        }

        let mut sorted: Vec<&DailyLog> = logs.iter().collect();
        sorted.sort_by_key(|log| log.date);

        let before = ctx.len();
        Self::check_date_continuity(&sorted, file_path, ctx);

        if self.config.mode == ValidationMode::Full {
            if self.config.check_day_count {
                Self::check_day_count(&sorted, file_path, ctx);
            }
            for log in &sorted {
                self.check_day(log, file_path, ctx);
            }
        }

        let raised = ctx.len() - before;
        tracing::debug!(
            days = sorted.len(),
            raised,
            mode = %self.config.mode,
            "validated batch"
        );
        raised
    }

    fn check_date_continuity(
        sorted: &[&DailyLog],
        file_path: &str,
        ctx: &mut DiagnosticsContext,
    ) {
        for pair in sorted.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let mut missing = prev.date.succ_opt();
            while let Some(date) = missing.filter(|d| *d < next.date) {
                ctx.emit(
                    Diagnostic::new(
                        DiagnosticCode::DateContinuity,
                        next.line,
                        format!(
                            "no daily log for {date} (between {} and {})",
                            prev.date, next.date
                        ),
                    )
                    .with_span(SourceSpan::lines(file_path, prev.line, next.line)),
                );
                missing = date.succ_opt();
            }
        }
    }

    fn check_day_count(sorted: &[&DailyLog], file_path: &str, ctx: &mut DiagnosticsContext) {
        let mut months: BTreeMap<(i32, u32), (BTreeSet<NaiveDate>, usize)> = BTreeMap::new();
        for log in sorted {
            let entry = months
                .entry((log.date.year(), log.date.month()))
                .or_insert_with(|| (BTreeSet::new(), log.line));
            entry.0.insert(log.date);
        }

        for ((year, month), (dates, line)) in months {
            let Some(expected) = days_in_month(year, month) else {
                continue;
            };
            let present = dates.len();
            if present != expected as usize {
                ctx.emit(
                    Diagnostic::new(
                        DiagnosticCode::IncorrectDayCountForMonth,
                        line,
                        format!("{year:04}-{month:02} has {present} days, expected {expected}"),
                    )
                    .with_span(SourceSpan::lines(file_path, line, line)),
                );
            }
        }
    }

    fn check_day(&self, log: &DailyLog, file_path: &str, ctx: &mut DiagnosticsContext) {
        let date = log.date;
        let day_span = || SourceSpan::lines(file_path, log.line, log.line);

        if log.activities.len() < self.config.min_activities {
            ctx.emit(
                Diagnostic::new(
                    DiagnosticCode::TooFewActivities,
                    log.line,
                    format!(
                        "{date} has {} activities, expected at least {}",
                        log.activities.len(),
                        self.config.min_activities
                    ),
                )
                .with_span(day_span()),
            );
        }

        for pair in log.activities.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.end_time != next.start_time {
                ctx.emit(
                    Diagnostic::new(
                        DiagnosticCode::TimeDiscontinuity,
                        next.line,
                        format!(
                            "'{}' ends at {} but '{}' starts at {} on {date}",
                            prev.raw_text,
                            hhmm(prev.end_time),
                            next.raw_text,
                            hhmm(next.start_time)
                        ),
                    )
                    .with_span(SourceSpan::lines(file_path, prev.line, next.line)),
                );
            }
        }

        let max_seconds = i64::from(self.config.max_activity_hours) * 3600;
        for activity in &log.activities {
            self.check_duration(activity, date, max_seconds, file_path, ctx);
        }

        let ends_with_sleep = log
            .activities
            .last()
            .is_some_and(|last| last.project_path == self.sleep_path);
        if !ends_with_sleep {
            let line = log.activities.last().map_or(log.line, |a| a.line);
            ctx.emit(
                Diagnostic::new(
                    DiagnosticCode::MissingSleepNight,
                    line,
                    format!("{date} does not end with '{}'", self.sleep_path),
                )
                .with_span(SourceSpan::lines(file_path, line, line)),
            );
        }
    }

    fn check_duration(
        &self,
        activity: &Activity,
        date: NaiveDate,
        max_seconds: i64,
        file_path: &str,
        ctx: &mut DiagnosticsContext,
    ) {
        let span = SourceSpan::lines(file_path, activity.line, activity.line);
        if activity.duration_seconds == 0 {
            ctx.emit(
                Diagnostic::new(
                    DiagnosticCode::ZeroDurationActivity,
                    activity.line,
                    format!(
                        "'{}' at {} on {date} has zero duration",
                        activity.raw_text,
                        hhmm(activity.end_time)
                    ),
                )
                .with_span(span),
            );
        } else if activity.duration_seconds > max_seconds {
            ctx.emit(
                Diagnostic::new(
                    DiagnosticCode::ActivityDurationTooLong,
                    activity.line,
                    format!(
                        "'{}' ending {} on {date} lasts {}m, more than {}h",
                        activity.raw_text,
                        hhmm(activity.end_time),
                        activity.duration_seconds / 60,
                        self.config.max_activity_hours
                    ),
                )
                .with_span(span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const SLEEP: &str = "sleep_night";

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn act(start: (u32, u32), end: (u32, u32), path: &str) -> Activity {
        Activity::new(t(start.0, start.1), t(end.0, end.1), path, path)
    }

    /// A day that passes every check.
    fn good_day(date: NaiveDate) -> DailyLog {
        let mut log = DailyLog::new(date);
        log.activities = vec![act((7, 0), (12, 0), "work"), act((12, 0), (23, 0), SLEEP)];
        log
    }

    fn validator() -> LogicalValidator {
        LogicalValidator::new(ValidatorConfig::default(), SLEEP)
    }

    fn run(validator: &LogicalValidator, logs: &[DailyLog]) -> DiagnosticsContext {
        let mut ctx = DiagnosticsContext::quiet();
        validator.validate(logs, "log.txt", &mut ctx);
        ctx
    }

    #[test]
    fn test_continuous_day_has_no_discontinuity() {
        let mut log = good_day(d(2025, 1, 1));
        log.activities = vec![
            act((8, 0), (9, 0), "a"),
            act((9, 0), (10, 30), "b"),
            act((10, 30), (11, 0), SLEEP),
        ];
        let ctx = run(&validator(), &[log]);
        assert_eq!(ctx.count(DiagnosticCode::TimeDiscontinuity), 0);
        assert!(ctx.is_empty(), "{:?}", ctx.sorted());
    }

    #[test]
    fn test_gap_raises_one_discontinuity() {
        let mut log = good_day(d(2025, 1, 1));
        log.activities = vec![act((8, 0), (9, 0), "a"), act((9, 30), (10, 0), SLEEP)];
        let ctx = run(&validator(), &[log]);

        assert_eq!(ctx.count(DiagnosticCode::TimeDiscontinuity), 1);
        let diag = ctx.sorted()[0];
        assert_eq!(
            diag.message,
            "'a' ends at 09:00 but 'sleep_night' starts at 09:30 on 2025-01-01"
        );
    }

    #[test]
    fn test_missing_sleep_is_reported_once_and_cleared_by_sleep() {
        let mut log = good_day(d(2025, 1, 1));
        log.activities = vec![act((7, 0), (12, 0), "work"), act((12, 0), (18, 0), "gym")];
        let ctx = run(&validator(), std::slice::from_ref(&log));
        assert_eq!(ctx.count(DiagnosticCode::MissingSleepNight), 1);

        log.activities.push(act((18, 0), (23, 0), SLEEP));
        let ctx = run(&validator(), &[log]);
        assert_eq!(ctx.count(DiagnosticCode::MissingSleepNight), 0);
    }

    #[test]
    fn test_missing_dates_are_reported_individually() {
        let logs = vec![good_day(d(2025, 1, 1)), good_day(d(2025, 1, 4))];
        let ctx = run(&validator(), &logs);

        let missing: Vec<_> = ctx
            .sorted()
            .iter()
            .filter(|d| d.code == DiagnosticCode::DateContinuity)
            .map(|d| d.message.clone())
            .collect();
        assert_eq!(
            missing,
            vec![
                "no daily log for 2025-01-02 (between 2025-01-01 and 2025-01-04)",
                "no daily log for 2025-01-03 (between 2025-01-01 and 2025-01-04)",
            ]
        );
    }

    #[test]
    fn test_continuity_mode_skips_day_checks() {
        let mut bad = DailyLog::new(d(2025, 1, 3));
        bad.activities = vec![act((8, 0), (8, 0), "x")];
        let logs = vec![good_day(d(2025, 1, 1)), bad];

        let validator = LogicalValidator::new(
            ValidatorConfig {
                mode: ValidationMode::Continuity,
                ..ValidatorConfig::default()
            },
            SLEEP,
        );
        let ctx = run(&validator, &logs);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.count(DiagnosticCode::DateContinuity), 1);
    }

    #[test]
    fn test_none_mode_skips_everything() {
        let validator = LogicalValidator::new(
            ValidatorConfig {
                mode: ValidationMode::None,
                ..ValidatorConfig::default()
            },
            SLEEP,
        );
        let ctx = run(&validator, &[DailyLog::new(d(2025, 1, 1))]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_duration_bounds() {
        let mut log = good_day(d(2025, 1, 1));
        log.activities = vec![
            act((0, 0), (17, 0), "marathon"),
            act((17, 0), (17, 0), "blink"),
            act((17, 0), (23, 0), SLEEP),
        ];
        let ctx = run(&validator(), &[log]);
        assert_eq!(ctx.count(DiagnosticCode::ActivityDurationTooLong), 1);
        assert_eq!(ctx.count(DiagnosticCode::ZeroDurationActivity), 1);
    }

    #[test]
    fn test_too_few_activities() {
        let mut log = DailyLog::new(d(2025, 1, 1));
        log.activities = vec![act((7, 0), (23, 0), SLEEP)];
        let ctx = run(&validator(), &[log]);
        assert_eq!(ctx.count(DiagnosticCode::TooFewActivities), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_day_count_for_month() {
        let validator = LogicalValidator::new(
            ValidatorConfig {
                check_day_count: true,
                ..ValidatorConfig::default()
            },
            SLEEP,
        );

        let february: Vec<_> = (1..=29).map(|day| good_day(d(2024, 2, day))).collect();
        let ctx = run(&validator, &february);
        assert!(ctx.is_empty(), "{:?}", ctx.sorted());

        let ctx = run(&validator, &february[..28]);
        assert_eq!(ctx.count(DiagnosticCode::IncorrectDayCountForMonth), 1);
        assert_eq!(ctx.sorted()[0].message, "2024-02 has 28 days, expected 29");
    }

    #[test]
    fn test_days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2025, 2), Some(28));
        assert_eq!(days_in_month(2025, 12), Some(31));
        assert_eq!(days_in_month(2025, 13), None);
    }

    #[test]
    fn test_validation_mode_parses() {
        assert_eq!("full".parse::<ValidationMode>(), Ok(ValidationMode::Full));
        assert!("strict".parse::<ValidationMode>().is_err());
    }
}
