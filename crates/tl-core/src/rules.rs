//! Category rule tables.
//!
//! [`RuleTableConfig`] is the deserializable shape a configuration loader
//! produces. [`CategoryRuleTable`] is the validated, immutable form the
//! pipeline owns; building it is the only place schema violations are caught.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between project path segments.
pub const PATH_SEPARATOR: char = '_';

/// Rule table schema violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleTableError {
    /// A required string was empty.
    #[error("{field} cannot be empty")]
    Empty { field: String },

    /// A duration-bucket key has no rules.
    #[error("duration buckets for '{key}' are empty")]
    EmptyBuckets { key: String },

    /// A threshold was zero.
    #[error("duration bucket '{key}' has a non-positive threshold")]
    NonPositiveThreshold { key: String },

    /// Thresholds were not strictly increasing.
    #[error("duration bucket '{key}' thresholds must be strictly increasing ({previous} then {next})")]
    NonIncreasingThreshold { key: String, previous: u32, next: u32 },

    /// A header field was listed twice in the header order.
    #[error("header field '{0}' listed more than once")]
    DuplicateHeader(HeaderField),
}

/// Fields that may appear between a date line and its first activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderField {
    Status,
    Sleep,
    Exercise,
    Getup,
    Remark,
}

impl HeaderField {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Sleep => "sleep",
            Self::Exercise => "exercise",
            Self::Getup => "getup",
            Self::Remark => "remark",
        }
    }

    /// Line prefix for fixed-prefix fields. The remark prefix is configurable.
    #[must_use]
    pub const fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Status => Some("Status:"),
            Self::Sleep => Some("Sleep:"),
            Self::Exercise => Some("Exercise:"),
            Self::Getup => Some("Getup:"),
            Self::Remark => None,
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Self::Status),
            "sleep" => Ok(Self::Sleep),
            "exercise" => Ok(Self::Exercise),
            "getup" => Ok(Self::Getup),
            "remark" => Ok(Self::Remark),
            _ => Err(format!("invalid header field: {s}")),
        }
    }
}

impl Serialize for HeaderField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HeaderField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One duration bucket: activities shorter than `threshold_minutes` get `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRule {
    pub threshold_minutes: u32,
    pub category: String,
}

impl DurationRule {
    pub fn new(threshold_minutes: u32, category: impl Into<String>) -> Self {
        Self {
            threshold_minutes,
            category: category.into(),
        }
    }
}

/// Rule tables as read from configuration, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTableConfig {
    /// Activity text to project path.
    pub exact_mapping: BTreeMap<String, String>,
    /// Activity text to duration buckets, thresholds ascending.
    pub duration_buckets: BTreeMap<String, Vec<DurationRule>>,
    /// Path prefix to root segment.
    pub top_parents: BTreeMap<String, String>,
    pub wake_keywords: Vec<String>,
    /// Expected order of header lines; listed fields (except remark) are required.
    pub header_order: Vec<HeaderField>,
    pub remark_prefix: String,
    /// Path assigned to sleep intervals.
    pub sleep_path: String,
}

impl Default for RuleTableConfig {
    fn default() -> Self {
        Self {
            exact_mapping: BTreeMap::new(),
            duration_buckets: BTreeMap::new(),
            top_parents: BTreeMap::new(),
            wake_keywords: vec!["wake".to_string()],
            header_order: vec![
                HeaderField::Status,
                HeaderField::Sleep,
                HeaderField::Getup,
                HeaderField::Remark,
            ],
            remark_prefix: "Remark:".to_string(),
            sleep_path: "sleep_night".to_string(),
        }
    }
}

/// Validated, immutable rule data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRuleTable {
    exact_mapping: BTreeMap<String, String>,
    duration_buckets: BTreeMap<String, Vec<DurationRule>>,
    /// Sorted longest key first so the first match is the longest prefix.
    top_parents: Vec<(String, String)>,
    wake_keywords: BTreeSet<String>,
    header_order: Vec<HeaderField>,
    remark_prefix: String,
    sleep_path: String,
}

fn require(value: &str, field: impl FnOnce() -> String) -> Result<String, RuleTableError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RuleTableError::Empty { field: field() });
    }
    Ok(trimmed.to_string())
}

impl CategoryRuleTable {
    /// Validates a configuration and freezes it.
    pub fn from_config(config: &RuleTableConfig) -> Result<Self, RuleTableError> {
        let mut exact_mapping = BTreeMap::new();
        for (text, path) in &config.exact_mapping {
            let key = require(text, || "exact mapping key".to_string())?;
            let path = require(path, || format!("exact mapping for '{key}'"))?;
            exact_mapping.insert(key, path);
        }

        let mut duration_buckets = BTreeMap::new();
        for (text, rules) in &config.duration_buckets {
            let key = require(text, || "duration bucket key".to_string())?;
            if rules.is_empty() {
                return Err(RuleTableError::EmptyBuckets { key });
            }
            let mut previous: Option<u32> = None;
            let mut validated = Vec::with_capacity(rules.len());
            for rule in rules {
                if rule.threshold_minutes == 0 {
                    return Err(RuleTableError::NonPositiveThreshold { key });
                }
                if let Some(prev) = previous.filter(|prev| rule.threshold_minutes <= *prev) {
                    return Err(RuleTableError::NonIncreasingThreshold {
                        key,
                        previous: prev,
                        next: rule.threshold_minutes,
                    });
                }
                previous = Some(rule.threshold_minutes);
                let category = require(&rule.category, || {
                    format!("duration bucket category for '{key}'")
                })?;
                validated.push(DurationRule::new(rule.threshold_minutes, category));
            }
            duration_buckets.insert(key, validated);
        }

        let mut top_parents = Vec::with_capacity(config.top_parents.len());
        for (prefix, root) in &config.top_parents {
            let prefix = require(prefix, || "top parent key".to_string())?;
            let root = require(root, || format!("top parent for '{prefix}'"))?;
            top_parents.push((prefix, root));
        }
        top_parents.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let wake_keywords = config
            .wake_keywords
            .iter()
            .map(|keyword| require(keyword, || "wake keyword".to_string()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut seen = BTreeSet::new();
        for field in &config.header_order {
            if !seen.insert(*field) {
                return Err(RuleTableError::DuplicateHeader(*field));
            }
        }

        Ok(Self {
            exact_mapping,
            duration_buckets,
            top_parents,
            wake_keywords,
            header_order: config.header_order.clone(),
            remark_prefix: require(&config.remark_prefix, || "remark prefix".to_string())?,
            sleep_path: require(&config.sleep_path, || "sleep path".to_string())?,
        })
    }

    pub fn exact(&self, text: &str) -> Option<&str> {
        self.exact_mapping.get(text).map(String::as_str)
    }

    pub fn buckets(&self, text: &str) -> Option<&[DurationRule]> {
        self.duration_buckets.get(text).map(Vec::as_slice)
    }

    /// Longest configured prefix of `path` on a segment boundary, with its root.
    pub fn top_parent(&self, path: &str) -> Option<(&str, &str)> {
        self.top_parents
            .iter()
            .find(|(prefix, _)| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
            })
            .map(|(prefix, root)| (prefix.as_str(), root.as_str()))
    }

    pub fn is_wake_keyword(&self, text: &str) -> bool {
        self.wake_keywords.contains(text)
    }

    pub fn header_order(&self) -> &[HeaderField] {
        &self.header_order
    }

    /// Position of a field in the configured order, if listed.
    pub fn header_position(&self, field: HeaderField) -> Option<usize> {
        self.header_order.iter().position(|f| *f == field)
    }

    pub fn remark_prefix(&self) -> &str {
        &self.remark_prefix
    }

    /// Sleep path before top-parent expansion.
    pub fn sleep_leaf(&self) -> &str {
        &self.sleep_path
    }
}

impl Default for CategoryRuleTable {
    fn default() -> Self {
        Self {
            exact_mapping: BTreeMap::new(),
            duration_buckets: BTreeMap::new(),
            top_parents: Vec::new(),
            wake_keywords: BTreeSet::from(["wake".to_string()]),
            header_order: RuleTableConfig::default().header_order,
            remark_prefix: "Remark:".to_string(),
            sleep_path: "sleep_night".to_string(),
        }
    }
}
