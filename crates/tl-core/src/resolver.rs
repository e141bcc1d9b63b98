//! Activity text to project path resolution.
//!
//! Resolution order: wake keyword, exact mapping, duration buckets, and
//! finally the raw text itself as an unrecognized one-segment path. Recognized
//! paths are then expanded with their configured top-level parent.

use crate::rules::{CategoryRuleTable, DurationRule, PATH_SEPARATOR};

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    WakeKeyword,
    Exact,
    DurationBucket,
    /// No rule matched; the raw text was used as the path.
    Unrecognized,
}

/// The outcome of resolving one activity description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: String,
    pub source: MatchSource,
}

impl Resolution {
    pub const fn recognized(&self) -> bool {
        !matches!(self.source, MatchSource::Unrecognized)
    }

    pub const fn is_wake(&self) -> bool {
        matches!(self.source, MatchSource::WakeKeyword)
    }
}

/// Resolves activity text and its duration to a project path.
pub fn resolve(text: &str, duration_seconds: i64, rules: &CategoryRuleTable) -> Resolution {
    let text = text.trim();

    if rules.is_wake_keyword(text) {
        return Resolution {
            path: sleep_path(rules),
            source: MatchSource::WakeKeyword,
        };
    }

    if let Some(path) = rules.exact(text) {
        return Resolution {
            path: expand_top_parent(path, rules),
            source: MatchSource::Exact,
        };
    }

    if let Some(buckets) = rules.buckets(text) {
        if let Some(category) = bucket_category(buckets, duration_seconds) {
            return Resolution {
                path: expand_top_parent(category, rules),
                source: MatchSource::DurationBucket,
            };
        }
    }

    Resolution {
        path: text.to_string(),
        source: MatchSource::Unrecognized,
    }
}

/// Picks the first bucket whose threshold exceeds the duration.
///
/// Durations at or beyond every threshold fall back to the last bucket, which
/// has the largest threshold since thresholds are strictly increasing.
pub fn bucket_category(buckets: &[DurationRule], duration_seconds: i64) -> Option<&str> {
    buckets
        .iter()
        .find(|rule| i64::from(rule.threshold_minutes) * 60 > duration_seconds)
        .or_else(|| buckets.last())
        .map(|rule| rule.category.as_str())
}

/// Prepends the configured root of the longest matching prefix.
pub fn expand_top_parent(path: &str, rules: &CategoryRuleTable) -> String {
    let Some((_, root)) = rules.top_parent(path) else {
        return path.to_string();
    };

    let already_rooted = path
        .strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR));
    if already_rooted {
        path.to_string()
    } else {
        format!("{root}{PATH_SEPARATOR}{path}")
    }
}

/// The fully expanded path assigned to sleep intervals.
pub fn sleep_path(rules: &CategoryRuleTable) -> String {
    expand_top_parent(rules.sleep_leaf(), rules)
}
