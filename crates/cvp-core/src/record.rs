// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// Returns true when a raw field value carries no data.
///
/// Whitespace-only values count as empty.
pub fn is_empty_value(value: &str) -> bool {
    value.trim().is_empty()
}

/// One raw input row.
///
/// The field set is whatever the source header declared; nothing about the
/// schema is fixed at compile time. `ordinal` is the zero-based position of
/// the row in the source and only serves as a deterministic tie-break.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub ordinal: u64,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(ordinal: u64) -> Self {
        Self {
            ordinal,
            fields: BTreeMap::new(),
        }
    }

    /// Builds a record from `(name, value)` pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(ordinal: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            ordinal,
            fields: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the value of `name` only when it is present and non-empty.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !is_empty_value(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, is_empty_value};

    #[test]
    fn empty_value_detection_treats_whitespace_as_empty() {
        assert!(is_empty_value(""));
        assert!(is_empty_value("   "));
        assert!(is_empty_value("\t"));
        assert!(!is_empty_value("0"));
        assert!(!is_empty_value(" 12 "));
    }

    #[test]
    fn from_pairs_keeps_last_duplicate() {
        let record = Record::from_pairs(3, [("state", "NY"), ("state", "CA")]);
        assert_eq!(record.ordinal, 3);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("state"), Some("CA"));
    }

    #[test]
    fn non_empty_hides_blank_values() {
        let mut record = Record::new(0);
        record.insert("positive", "");
        record.insert("negative", "12");

        assert_eq!(record.get("positive"), Some(""));
        assert_eq!(record.non_empty("positive"), None);
        assert_eq!(record.non_empty("negative"), Some("12"));
        assert_eq!(record.non_empty("missing"), None);
    }

    #[test]
    fn iter_is_ordered_by_field_name() {
        let record = Record::from_pairs(0, [("state", "NY"), ("date", "20200401")]);
        let names: Vec<&str> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["date", "state"]);
        assert!(!record.is_empty());
    }
}
