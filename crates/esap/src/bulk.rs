// ai
//! 📡 Bulk Request Builder: formatting log records for the bulk API's peculiar tastes 🚀
//!
//! The bulk API has rules:
//! Rule 1: Two lines per document. Action metadata, then document source. Always.
//! Rule 2: Newline-delimited. Not comma-separated. Not a JSON array. NEWLINES.
//! Rule 3: The trailing newline on the whole body matters. It MATTERS.
//!
//! ## Knowledge Graph 🧠
//! - Index name: `log4j-<suffix>`, suffix picked by [`RolloverPolicy`], recomputed every flush
//! - Action line: `{"index":{"_index":"..."}}`, plus `"_type":"_doc"` for 6.x clusters
//! - Source line: the buffered `{"message":"..."}` record, passed through untouched
//! - Order: drain order. The builder never reorders. It has no opinions. 🦆

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

/// 📦 Base name of every index this crate writes to.
pub const INDEX_BASE: &str = "log4j";

/// 📅 How often the target index rolls over.
///
/// Parsed case-insensitively. Anything that isn't `day`, `month` or `year`
/// means "never roll", which is a valid lifestyle choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum RolloverPolicy {
    Year,
    Month,
    #[default]
    Day,
    None,
}

impl From<&str> for RolloverPolicy {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "year" => RolloverPolicy::Year,
            "month" => RolloverPolicy::Month,
            "day" => RolloverPolicy::Day,
            _ => RolloverPolicy::None,
        }
    }
}

impl From<String> for RolloverPolicy {
    fn from(raw: String) -> Self {
        RolloverPolicy::from(raw.as_str())
    }
}

impl RolloverPolicy {
    /// 📅 The calendar token for `date`, or None when we don't roll.
    pub fn suffix(&self, date: NaiveDate) -> Option<String> {
        match self {
            RolloverPolicy::Year => Some(date.format("%Y").to_string()),
            RolloverPolicy::Month => Some(date.format("%Y.%m").to_string()),
            RolloverPolicy::Day => Some(date.format("%Y.%m.%d").to_string()),
            RolloverPolicy::None => None,
        }
    }

    /// 🎯 `<base>-<suffix>`, or just `<base>` when there is no suffix.
    pub fn index_name(&self, base: &str, date: NaiveDate) -> String {
        match self.suffix(date) {
            Some(suffix) => format!("{base}-{suffix}"),
            None => base.to_string(),
        }
    }
}

/// 📡 Builds `_bulk` payloads for one cluster major version.
///
/// The version is fixed for the life of the builder because it's fixed for the
/// life of the engine. 6.x still wants mapping types, 7.x threw them out.
#[derive(Debug, Clone, Copy)]
pub struct BulkRequestBuilder {
    major_version: i32,
}

impl BulkRequestBuilder {
    pub fn new(major_version: i32) -> Self {
        Self { major_version }
    }

    /// 🏷️ The action metadata line for `index`, no trailing newline.
    pub fn action_line(&self, index: &str) -> String {
        let the_action = if self.major_version == 6 {
            json!({ "index": { "_index": index, "_type": "_doc" } })
        } else {
            json!({ "index": { "_index": index } })
        };
        the_action.to_string()
    }

    /// 📦 One complete NDJSON body: action + source per record, trailing `\n` included.
    ///
    /// Empty input gives an empty string. Callers are expected not to POST that.
    pub fn build<S: AsRef<str>>(&self, index: &str, records: &[S]) -> String {
        let action = self.action_line(index);
        // -- 🧮 Pre-allocate: a vibes-based estimate that's usually close
        let estimated_size: usize = records
            .iter()
            .map(|r| r.as_ref().len() + action.len() + 2)
            .sum();
        let mut payload = String::with_capacity(estimated_size);
        for record in records {
            payload.push_str(&action);
            payload.push('\n');
            payload.push_str(record.as_ref());
            payload.push('\n');
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_seventh_of_march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).expect("💀 2024-03-07 is a real date, last we checked")
    }

    #[test]
    fn the_one_where_every_rollover_policy_names_its_index() {
        let date = the_seventh_of_march();
        assert_eq!(RolloverPolicy::Day.index_name(INDEX_BASE, date), "log4j-2024.03.07");
        assert_eq!(RolloverPolicy::Month.index_name(INDEX_BASE, date), "log4j-2024.03");
        assert_eq!(RolloverPolicy::Year.index_name(INDEX_BASE, date), "log4j-2024");
        assert_eq!(RolloverPolicy::None.index_name(INDEX_BASE, date), "log4j");
    }

    #[test]
    fn the_one_where_policies_parse_without_caring_about_case() {
        assert_eq!(RolloverPolicy::from("DAY"), RolloverPolicy::Day);
        assert_eq!(RolloverPolicy::from("Month"), RolloverPolicy::Month);
        assert_eq!(RolloverPolicy::from("year"), RolloverPolicy::Year);
        assert_eq!(RolloverPolicy::from("hourly"), RolloverPolicy::None);
        assert_eq!(RolloverPolicy::from(""), RolloverPolicy::None);
    }

    #[test]
    fn the_one_where_seven_forgot_about_types() {
        let builder = BulkRequestBuilder::new(7);
        assert_eq!(
            builder.action_line("log4j-2024"),
            r#"{"index":{"_index":"log4j-2024"}}"#
        );
    }

    #[test]
    fn the_one_where_six_still_remembers_doc_types() {
        let builder = BulkRequestBuilder::new(6);
        assert_eq!(
            builder.action_line("log4j-2024"),
            r#"{"index":{"_index":"log4j-2024","_type":"_doc"}}"#
        );
    }

    #[test]
    fn the_one_where_records_come_out_in_pairs_and_in_order() {
        let builder = BulkRequestBuilder::new(7);
        let records = vec![
            r#"{"message":"one"}"#.to_string(),
            r#"{"message":"two"}"#.to_string(),
            r#"{"message":"three"}"#.to_string(),
        ];

        let payload = builder.build("log4j", &records);
        let lines: Vec<&str> = payload.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(payload.ends_with('\n'), "trailing newline is mandatory");
        for (pair, record) in lines.chunks(2).zip(&records) {
            assert_eq!(pair[0], r#"{"index":{"_index":"log4j"}}"#);
            assert_eq!(pair[1], record);
        }
    }

    #[test]
    fn the_one_where_nothing_in_means_nothing_out() {
        let builder = BulkRequestBuilder::new(7);
        let empty: Vec<String> = Vec::new();
        assert!(builder.build("log4j", &empty).is_empty());
    }
}
