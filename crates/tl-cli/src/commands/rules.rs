//! Rules command: print the effective category rules.

use std::io::Write;

use anyhow::{Context, Result};
use tl_core::{CategoryRuleTable, resolver};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let rules = &config.convert.rules;
    let table = CategoryRuleTable::from_config(rules).context("invalid rule configuration")?;
    tracing::debug!(sleep_path = %resolver::sleep_path(&table), "rule table is valid");

    serde_json::to_writer_pretty(&mut *writer, rules)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use tl_core::DurationRule;

    #[test]
    fn test_prints_rules_as_json() {
        let mut config = Config::default();
        let rules = &mut config.convert.rules;
        rules
            .exact_mapping
            .insert("coding".to_string(), "work_coding".to_string());
        rules.duration_buckets.insert(
            "walk".to_string(),
            vec![DurationRule::new(30, "walk_short")],
        );

        let mut output = Vec::new();
        run(&mut output, &config).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r#"
        {
          "exact_mapping": {
            "coding": "work_coding"
          },
          "duration_buckets": {
            "walk": [
              {
                "threshold_minutes": 30,
                "category": "walk_short"
              }
            ]
          },
          "top_parents": {},
          "wake_keywords": [
            "wake"
          ],
          "header_order": [
            "status",
            "sleep",
            "getup",
            "remark"
          ],
          "remark_prefix": "Remark:",
          "sleep_path": "sleep_night"
        }
        "#);
    }

    #[test]
    fn test_invalid_rules_are_rejected() {
        let mut config = Config::default();
        config.convert.rules.duration_buckets.insert(
            "walk".to_string(),
            vec![DurationRule::new(60, "a"), DurationRule::new(30, "b")],
        );
        let mut output = Vec::new();
        assert!(run(&mut output, &config).is_err());
        assert!(output.is_empty());
    }
}
