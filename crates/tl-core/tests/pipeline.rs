//! Integration tests for the conversion pipeline through the public API.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;
use tl_core::{
    Activity, ConvertConfig, ConverterPipeline, DailyLog, DiagnosticCode, DiagnosticsContext,
    DurationRule, LogicalValidator, Severity, SharedDiagnostics, ValidatorConfig,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn config() -> ConvertConfig {
    let mut config = ConvertConfig {
        fallback_year: Some(2025),
        ..ConvertConfig::default()
    };
    let rules = &mut config.rules;
    rules
        .exact_mapping
        .insert("coding".to_string(), "work_coding".to_string());
    rules.duration_buckets.insert(
        "walk".to_string(),
        vec![
            DurationRule::new(30, "walk_short"),
            DurationRule::new(90, "walk_long"),
        ],
    );
    rules
        .top_parents
        .insert("walk".to_string(), "health".to_string());
    config
}

fn pipeline() -> ConverterPipeline {
    ConverterPipeline::new(&config()).unwrap()
}

const CLEAN_DAYS: &str = "\
2025_03_01
Status:1
0700wake
1200coding
1800coding
2300wake

2025_03_02
Status:1
0700wake
1200coding
1800coding
2300wake
";

#[test]
fn test_clean_input_has_no_diagnostics() {
    let mut ctx = DiagnosticsContext::quiet();
    let outcome = pipeline().convert_str(CLEAN_DAYS, "log.txt", &mut ctx).unwrap();

    assert_eq!(outcome.daily_logs.len(), 2);
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    assert!(!outcome.validation_failed());
    assert_eq!(outcome.report(), "No diagnostics.\n");
}

#[test]
fn test_each_valid_block_yields_one_log() {
    let input = "\
2025_03_01
Status:1
0700wake
0900coding
garbage line
2025_03_02
0800coding
2025_03_03
";
    let mut ctx = DiagnosticsContext::quiet();
    let outcome = pipeline().convert_str(input, "log.txt", &mut ctx).unwrap();

    let dates: BTreeSet<_> = outcome.daily_logs.iter().map(|log| log.date).collect();
    assert_eq!(outcome.daily_logs.len(), 3);
    assert_eq!(dates.len(), 3);
    assert!(dates.contains(&d(2025, 3, 3)));
}

#[test]
fn test_duration_buckets_pick_by_length() {
    let input = "\
2025_03_01
Status:1
0700wake
0710walk
0755walk
1115walk
2300wake
";
    let mut ctx = DiagnosticsContext::quiet();
    let outcome = pipeline().convert_str(input, "log.txt", &mut ctx).unwrap();

    let paths: Vec<_> = outcome.daily_logs[0]
        .activities
        .iter()
        .map(|a| a.project_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            "health_walk_short",
            "health_walk_long",
            "health_walk_long",
            "sleep_night"
        ]
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
}

#[test]
fn test_time_continuity_within_a_day() {
    let validator = LogicalValidator::new(ValidatorConfig::default(), "sleep_night");

    let mut log = DailyLog::new(d(2025, 3, 1));
    log.activities = vec![
        Activity::new(t(8, 0), t(9, 0), "a", "a"),
        Activity::new(t(9, 0), t(10, 30), "b", "b"),
        Activity::new(t(10, 30), t(23, 0), "sleep", "sleep_night"),
    ];
    let mut ctx = DiagnosticsContext::quiet();
    validator.validate(std::slice::from_ref(&log), "log.txt", &mut ctx);
    assert_eq!(ctx.count(DiagnosticCode::TimeDiscontinuity), 0);

    log.activities[1].start_time = t(9, 30);
    let mut ctx = DiagnosticsContext::quiet();
    validator.validate(&[log], "log.txt", &mut ctx);
    assert_eq!(ctx.count(DiagnosticCode::TimeDiscontinuity), 1);
}

#[test]
fn test_trailing_wake_clears_missing_sleep() {
    let day = "2025_03_01\nStatus:1\n0700wake\n1200coding\n1800coding\n";
    let pipeline = pipeline();

    let mut ctx = DiagnosticsContext::quiet();
    let before = pipeline.convert_str(day, "log.txt", &mut ctx).unwrap();
    assert_eq!(ctx.count(DiagnosticCode::MissingSleepNight), 1);
    assert!(before.validation_failed());

    let mut ctx = DiagnosticsContext::quiet();
    let after = pipeline
        .convert_str(&format!("{day}2300wake\n"), "log.txt", &mut ctx)
        .unwrap();
    assert_eq!(ctx.count(DiagnosticCode::MissingSleepNight), 0);
    assert!(!after.validation_failed());
}

#[test]
fn test_unrecognized_activity_keeps_the_day() {
    let input = "2025_03_01\nStatus:1\n0700wake\n0800chess\n2300wake\n";
    let mut ctx = DiagnosticsContext::quiet();
    let outcome = pipeline().convert_str(input, "log.txt", &mut ctx).unwrap();

    assert_eq!(outcome.daily_logs.len(), 1);
    assert_eq!(outcome.daily_logs[0].activities[0].project_path, "chess");

    let unrecognized: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::UnrecognizedActivity)
        .collect();
    assert_eq!(unrecognized.len(), 1);
    assert_eq!(unrecognized[0].severity, Severity::Warn);
    assert!(!outcome.validation_failed());
}

#[test]
fn test_independent_runs_are_identical() {
    let input = "\
stray
2025_03_01
Status:1
Getup:0700
Sleep:1
0800chess
0900coding
2025_03_03
Status:x
0700wake
1000coding
";
    let mut live = DiagnosticsContext::new();
    let mut quiet = DiagnosticsContext::quiet();
    let first = pipeline().convert_str(input, "log.txt", &mut live).unwrap();
    let second = pipeline().convert_str(input, "log.txt", &mut quiet).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.report(), second.report());
    assert_eq!(
        tl_core::render_report(&live),
        tl_core::render_report(&quiet)
    );
    assert!(!first.diagnostics.is_empty());
}

#[test]
fn test_convert_many_keeps_input_order() {
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("march.txt");
    std::fs::write(&good, CLEAN_DAYS).unwrap();
    let stray = temp.path().join("stray.txt");
    std::fs::write(&stray, "no date here\n").unwrap();
    let missing = temp.path().join("missing.txt");

    let shared = SharedDiagnostics::new();
    let paths = vec![stray.clone(), good.clone(), missing.clone()];
    let results = pipeline().convert_many(&paths, &shared);

    let order: Vec<_> = results.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(order, paths);

    let stray_outcome = results[0].1.as_ref().unwrap();
    assert_eq!(stray_outcome.diagnostics.len(), 1);
    assert!(results[1].1.as_ref().unwrap().diagnostics.is_empty());
    assert!(results[2].1.is_err());

    let snapshot = shared.snapshot();
    assert_eq!(snapshot.count(DiagnosticCode::SourceNoDateAtStart), 1);
    assert_eq!(snapshot.len(), 1);
}
