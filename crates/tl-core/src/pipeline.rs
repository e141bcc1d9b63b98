//! End-to-end conversion of a log stream into validated daily records.
//!
//! A [`ConverterPipeline`] owns the rule tables and the validator. Each call to
//! [`ConverterPipeline::convert`] scans one input, links overnight sleep across
//! consecutive days, then validates the batch. Only I/O failures are errors;
//! every other finding is a diagnostic in the caller's context.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{DiagnosticsContext, SharedDiagnostics};
use crate::diagnostic::{Diagnostic, DiagnosticCategory};
use crate::model::{Activity, DailyLog, group_by_month};
use crate::report::render_report;
use crate::resolver;
use crate::rules::{CategoryRuleTable, RuleTableConfig, RuleTableError};
use crate::scanner::{LineScanner, ScanOptions, ScannedDay};
use crate::validate::{LogicalValidator, ValidatorConfig};

/// Fatal conversion failures.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read {name}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid rule table: {0}")]
    RuleTable(#[from] RuleTableError),
}

/// How days are grouped for logical validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationScope {
    /// One batch per calendar month.
    #[default]
    Month,
    /// The whole input as a single batch.
    Range,
}

/// Configuration for a conversion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub rules: RuleTableConfig,

    pub validation: ValidatorConfig,

    pub scope: ValidationScope,

    /// Start of the first activity on days with no getup time.
    /// Default: midnight.
    pub day_start: NaiveTime,

    /// Year for `MM_DD` dates seen before any full date.
    /// Default: the current local year.
    pub fallback_year: Option<i32>,

    /// Close the previous day with sleep up to the next day's wake line.
    /// Default: true.
    pub link_overnight_sleep: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            rules: RuleTableConfig::default(),
            validation: ValidatorConfig::default(),
            scope: ValidationScope::Month,
            day_start: NaiveTime::MIN,
            fallback_year: None,
            link_overnight_sleep: true,
        }
    }
}

/// Result of converting one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub source_name: String,
    /// Days in input order.
    pub daily_logs: Vec<DailyLog>,
    /// Diagnostics raised by this conversion, sorted.
    pub diagnostics: Vec<Diagnostic>,
}

impl ConversionOutcome {
    /// Whether any logical check failed.
    pub fn validation_failed(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.is_error() && d.code.category() == DiagnosticCategory::LogicalConsistency)
    }

    pub fn months(&self) -> BTreeMap<String, Vec<DailyLog>> {
        group_by_month(&self.daily_logs)
    }

    /// This conversion's diagnostics as a plain-text report.
    pub fn report(&self) -> String {
        let mut ctx = DiagnosticsContext::quiet();
        for diagnostic in &self.diagnostics {
            ctx.emit(diagnostic.clone());
        }
        render_report(&ctx)
    }
}

/// Scans, links and validates daily logs with one set of rules.
#[derive(Debug, Clone)]
pub struct ConverterPipeline {
    rules: CategoryRuleTable,
    validator: LogicalValidator,
    sleep_path: String,
    scope: ValidationScope,
    options: ScanOptions,
    link_overnight_sleep: bool,
}

impl ConverterPipeline {
    /// Builds the rule tables, rejecting invalid configuration before any input is read.
    pub fn new(config: &ConvertConfig) -> Result<Self, ConvertError> {
        let rules = CategoryRuleTable::from_config(&config.rules)?;
        let sleep_path = resolver::sleep_path(&rules);
        let validator = LogicalValidator::new(config.validation.clone(), sleep_path.clone());
        let fallback_year = config
            .fallback_year
            .unwrap_or_else(|| Local::now().date_naive().year());

        Ok(Self {
            rules,
            validator,
            sleep_path,
            scope: config.scope,
            options: ScanOptions {
                day_start: config.day_start,
                fallback_year,
            },
            link_overnight_sleep: config.link_overnight_sleep,
        })
    }

    /// Converts one input stream.
    ///
    /// Structural and logical findings go into `ctx`; the returned outcome
    /// carries only the ones raised by this call.
    pub fn convert<R: BufRead>(
        &self,
        reader: R,
        source_name: &str,
        ctx: &mut DiagnosticsContext,
    ) -> Result<ConversionOutcome, ConvertError> {
        let mark = ctx.len();
        let mut scanner = LineScanner::new(&self.rules, self.options, source_name);
        let mut days = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ConvertError::Read {
                name: source_name.to_string(),
                source,
            })?;
            days.extend(scanner.scan_line(idx + 1, &line, ctx));
        }
        days.extend(scanner.finish(ctx));

        if self.link_overnight_sleep {
            let linked = self.link_sleep(&mut days);
            tracing::debug!(linked, "linked overnight sleep");
        }

        let daily_logs: Vec<DailyLog> = days.into_iter().map(|day| day.log).collect();
        self.validate_batch(&daily_logs, source_name, ctx);

        let diagnostics = ctx.since(mark);
        tracing::info!(
            source = source_name,
            days = daily_logs.len(),
            diagnostics = diagnostics.len(),
            "converted daily logs"
        );

        Ok(ConversionOutcome {
            source_name: source_name.to_string(),
            daily_logs,
            diagnostics,
        })
    }

    pub fn convert_str(
        &self,
        text: &str,
        source_name: &str,
        ctx: &mut DiagnosticsContext,
    ) -> Result<ConversionOutcome, ConvertError> {
        self.convert(text.as_bytes(), source_name, ctx)
    }

    pub fn convert_path(
        &self,
        path: &Path,
        ctx: &mut DiagnosticsContext,
    ) -> Result<ConversionOutcome, ConvertError> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| ConvertError::Read {
            name: name.clone(),
            source,
        })?;
        self.convert(BufReader::new(file), &name, ctx)
    }

    /// Converts several files in parallel.
    ///
    /// Each file gets its own context; finished runs are merged into `shared`
    /// so identical messages are displayed once across the batch. Results keep
    /// the order of `paths`.
    pub fn convert_many(
        &self,
        paths: &[PathBuf],
        shared: &SharedDiagnostics,
    ) -> Vec<(PathBuf, Result<ConversionOutcome, ConvertError>)> {
        paths
            .par_iter()
            .map(|path| {
                let mut ctx = DiagnosticsContext::quiet();
                let result = self.convert_path(path, &mut ctx);
                shared.absorb(&ctx);
                (path.clone(), result)
            })
            .collect()
    }

    /// Runs logical validation over `logs`, batched by the configured scope.
    pub fn validate_batch(
        &self,
        logs: &[DailyLog],
        file_path: &str,
        ctx: &mut DiagnosticsContext,
    ) -> usize {
        match self.scope {
            ValidationScope::Range => self.validator.validate(logs, file_path, ctx),
            ValidationScope::Month => group_by_month(logs)
                .values()
                .map(|month| self.validator.validate(month, file_path, ctx))
                .sum(),
        }
    }

    /// Appends sleep to each day that is followed by a day opening with a wake line.
    fn link_sleep(&self, days: &mut [ScannedDay]) -> usize {
        let positions: HashMap<NaiveDate, usize> = days
            .iter()
            .enumerate()
            .map(|(idx, day)| (day.log.date, idx))
            .collect();

        let mut linked = 0;
        for idx in 0..days.len() {
            let Some(wake) = days[idx].wake_time else {
                continue;
            };
            let Some(prev_idx) = days[idx]
                .log
                .date
                .pred_opt()
                .and_then(|date| positions.get(&date).copied())
            else {
                continue;
            };
            let line = days[idx].log.line;

            let prev = &mut days[prev_idx].log;
            let Some(last) = prev.activities.last() else {
                continue;
            };
            if last.project_path == self.sleep_path {
                continue;
            }
            let sleep = Activity::new(last.end_time, wake, self.rules.sleep_leaf(), &self.sleep_path)
                .at_line(line);
            prev.activities.push(sleep);
            linked += 1;
        }
        linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;
    use crate::validate::ValidationMode;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn config() -> ConvertConfig {
        let mut config = ConvertConfig {
            fallback_year: Some(2025),
            ..ConvertConfig::default()
        };
        config
            .rules
            .exact_mapping
            .insert("coding".to_string(), "work_coding".to_string());
        config
    }

    fn convert(config: &ConvertConfig, input: &str) -> ConversionOutcome {
        let pipeline = ConverterPipeline::new(config).unwrap();
        let mut ctx = DiagnosticsContext::quiet();
        pipeline.convert_str(input, "log.txt", &mut ctx).unwrap()
    }

    #[test]
    fn test_links_sleep_into_previous_day() {
        let input = "2025_01_15\nStatus:1\n0700wake\n2300coding\n\
                     2025_01_16\nStatus:1\n0630wake\n1200coding\n";
        let outcome = convert(&config(), input);

        let first = &outcome.daily_logs[0];
        let sleep = first.activities.last().unwrap();
        assert_eq!(sleep.project_path, "sleep_night");
        assert_eq!((sleep.start_time, sleep.end_time), (t(23, 0), t(6, 30)));
        assert_eq!(sleep.duration_seconds, 7 * 3600 + 30 * 60);
        assert_eq!(sleep.line, 5);

        // Only the last day lacks its closing sleep.
        let missing: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::MissingSleepNight)
            .map(|d| d.line_number)
            .collect();
        assert_eq!(missing, vec![8]);
    }

    #[test]
    fn test_linking_can_be_disabled() {
        let config = ConvertConfig {
            link_overnight_sleep: false,
            ..config()
        };
        let input = "2025_01_15\nStatus:1\n0700wake\n2300coding\n\
                     2025_01_16\nStatus:1\n0630wake\n1200coding\n";
        let outcome = convert(&config, input);
        assert_eq!(outcome.daily_logs[0].activities.len(), 1);
    }

    #[test]
    fn test_no_link_across_a_gap() {
        let input = "2025_01_15\nStatus:1\n0700wake\n2300coding\n\
                     2025_01_17\nStatus:1\n0630wake\n1200coding\n";
        let outcome = convert(&config(), input);
        assert_eq!(outcome.daily_logs[0].activities.len(), 1);
        assert_eq!(
            outcome
                .diagnostics
                .iter()
                .filter(|d| d.code == DiagnosticCode::DateContinuity)
                .count(),
            1
        );
    }

    #[test]
    fn test_month_scope_does_not_bridge_months() {
        let input = "2025_01_31\nStatus:1\n0700wake\n2300coding\n\
                     2025_02_02\nStatus:1\n0630wake\n1200coding\n";

        let outcome = convert(&config(), input);
        assert!(
            outcome
                .diagnostics
                .iter()
                .all(|d| d.code != DiagnosticCode::DateContinuity)
        );

        let range = ConvertConfig {
            scope: ValidationScope::Range,
            ..config()
        };
        let outcome = convert(&range, input);
        assert!(
            outcome
                .diagnostics
                .iter()
                .any(|d| d.code == DiagnosticCode::DateContinuity)
        );
    }

    #[test]
    fn test_structural_issues_alone_do_not_fail_validation() {
        let config = ConvertConfig {
            validation: ValidatorConfig {
                mode: ValidationMode::None,
                ..ValidatorConfig::default()
            },
            ..config()
        };
        let outcome = convert(&config, "2025_01_15\n0800chess\n");
        assert!(!outcome.diagnostics.is_empty());
        assert!(!outcome.validation_failed());
    }

    #[test]
    fn test_outcome_holds_only_its_own_diagnostics() {
        let pipeline = ConverterPipeline::new(&config()).unwrap();
        let mut ctx = DiagnosticsContext::quiet();
        let first = pipeline
            .convert_str("stray line\n", "a.txt", &mut ctx)
            .unwrap();
        let second = pipeline
            .convert_str("2025_01_15\nStatus:1\n0700wake\n", "b.txt", &mut ctx)
            .unwrap();

        assert_eq!(first.diagnostics.len(), 1);
        assert!(
            second
                .diagnostics
                .iter()
                .all(|d| d.code != DiagnosticCode::SourceNoDateAtStart)
        );
        assert_eq!(ctx.len(), first.diagnostics.len() + second.diagnostics.len());
    }

    #[test]
    fn test_bad_rule_table_is_rejected_up_front() {
        let mut config = config();
        config.rules.sleep_path = "  ".to_string();
        assert!(matches!(
            ConverterPipeline::new(&config),
            Err(ConvertError::RuleTable(_))
        ));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let pipeline = ConverterPipeline::new(&config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = DiagnosticsContext::quiet();
        let err = pipeline
            .convert_path(&dir.path().join("nope.txt"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Read { .. }));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_a_read_error() {
        let pipeline = ConverterPipeline::new(&config()).unwrap();
        let mut ctx = DiagnosticsContext::quiet();
        let bytes: &[u8] = b"2025_01_15\n\xff\xfe\n";
        assert!(matches!(
            pipeline.convert(bytes, "bin.txt", &mut ctx),
            Err(ConvertError::Read { .. })
        ));
    }
}
