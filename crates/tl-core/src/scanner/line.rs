//! Classification of single input lines.

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::rules::{CategoryRuleTable, HeaderField};

/// `YYYY_MM_DD` or `MM_DD`, ASCII digits only.
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:([0-9]{4})_)?([0-9]{2})_([0-9]{2})$").unwrap());

/// `HHMM<description>`; the description may not start with `_` so malformed
/// dates are not mistaken for activities.
static ACTIVITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})\s*([^_\s].*)$").unwrap());

/// Separates an activity description from its remark.
pub const ACTIVITY_REMARK_SEPARATOR: &str = " // ";

/// What a trimmed line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Date {
        year: Option<i32>,
        month: u32,
        day: u32,
    },
    Header {
        field: HeaderField,
        value: &'a str,
        /// 1-based column where the value starts.
        value_column: usize,
    },
    Activity {
        end_time: NaiveTime,
        description: &'a str,
        remark: Option<&'a str>,
        /// 1-based column where the description starts.
        description_column: usize,
    },
    Invalid {
        reason: String,
        column_start: usize,
        column_end: usize,
    },
}

/// Parses `HHMM` into a time of day.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = s[..2].parse().ok()?;
    let minute: u32 = s[2..].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0).filter(|_| hour < 24)
}

/// Parses a `0`/`1` header flag.
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim() {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn column_of(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset].chars().count() + 1
}

fn width(line: &str) -> usize {
    line.chars().count().max(1)
}

/// Classifies a line that has already been trimmed.
pub fn classify<'a>(line: &'a str, rules: &CategoryRuleTable) -> LineKind<'a> {
    if line.is_empty() {
        return LineKind::Blank;
    }

    if let Some(caps) = DATE_RE.captures(line) {
        let year = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let month = caps[2].parse().unwrap_or(0);
        let day = caps[3].parse().unwrap_or(0);
        return LineKind::Date { year, month, day };
    }

    if let Some(value) = line.strip_prefix(rules.remark_prefix()) {
        return LineKind::Header {
            field: HeaderField::Remark,
            value: value.trim(),
            value_column: column_of(line, line.len() - value.len()),
        };
    }

    for field in [
        HeaderField::Status,
        HeaderField::Sleep,
        HeaderField::Exercise,
        HeaderField::Getup,
    ] {
        let Some(prefix) = field.prefix() else {
            continue;
        };
        if let Some(value) = line.strip_prefix(prefix) {
            return LineKind::Header {
                field,
                value: value.trim(),
                value_column: column_of(line, prefix.len()),
            };
        }
    }

    if let Some(caps) = ACTIVITY_RE.captures(line) {
        let Some(end_time) = parse_hhmm(&caps[1]) else {
            return LineKind::Invalid {
                reason: format!("invalid time '{}'", &caps[1]),
                column_start: 1,
                column_end: 4,
            };
        };
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let description_column = column_of(line, line.len() - rest.len());
        let (description, remark) = match rest.split_once(ACTIVITY_REMARK_SEPARATOR) {
            Some((description, remark)) => {
                let remark = remark.trim();
                (description.trim(), (!remark.is_empty()).then_some(remark))
            }
            None => (rest.trim(), None),
        };
        if description.is_empty() {
            return LineKind::Invalid {
                reason: "activity has no description".to_string(),
                column_start: description_column,
                column_end: width(line),
            };
        }
        return LineKind::Activity {
            end_time,
            description,
            remark,
            description_column,
        };
    }

    LineKind::Invalid {
        reason: "unrecognized line".to_string(),
        column_start: 1,
        column_end: width(line),
    }
}
