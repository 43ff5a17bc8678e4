// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::record::{Record, is_empty_value};
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Partial column statistics for one shard of the input.
///
/// Maps every field name seen so far to whether it was ever observed with a
/// non-empty value. Merging is a per-field logical OR, so any sharding of
/// the input folds to the same result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnStats {
    seen_non_empty: BTreeMap<String, bool>,
}

impl ColumnStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into the partial state.
    pub fn observe(&mut self, record: &Record) {
        for (name, value) in record.iter() {
            let non_empty = !is_empty_value(value);
            match self.seen_non_empty.get_mut(name) {
                Some(flag) => *flag |= non_empty,
                None => {
                    self.seen_non_empty.insert(name.to_string(), non_empty);
                }
            }
        }
    }

    /// Merges two partial states.
    pub fn merge(mut self, other: Self) -> Self {
        if self.seen_non_empty.len() < other.seen_non_empty.len() {
            return other.merge(self);
        }
        for (name, non_empty) in other.seen_non_empty {
            *self.seen_non_empty.entry(name).or_insert(false) |= non_empty;
        }
        self
    }

    pub fn fields_seen(&self) -> usize {
        self.seen_non_empty.len()
    }

    /// Seals the fold into an immutable classification.
    pub fn finish(self) -> ColumnClassification {
        let mut always_empty = BTreeSet::new();
        let mut ever_non_empty = BTreeSet::new();
        for (name, non_empty) in self.seen_non_empty {
            if non_empty {
                ever_non_empty.insert(name);
            } else {
                always_empty.insert(name);
            }
        }
        ColumnClassification {
            always_empty,
            ever_non_empty,
        }
    }
}

/// Dataset-wide split of field names into vestigial and populated columns.
///
/// Every field name seen anywhere in the input is in exactly one of the two
/// sets. The value is only produced by [`ColumnStats::finish`] and exposes
/// no mutators.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnClassification {
    always_empty: BTreeSet<String>,
    ever_non_empty: BTreeSet<String>,
}

impl ColumnClassification {
    pub fn always_empty(&self) -> &BTreeSet<String> {
        &self.always_empty
    }

    pub fn ever_non_empty(&self) -> &BTreeSet<String> {
        &self.ever_non_empty
    }

    pub fn is_always_empty(&self, name: &str) -> bool {
        self.always_empty.contains(name)
    }

    pub fn is_ever_non_empty(&self, name: &str) -> bool {
        self.ever_non_empty.contains(name)
    }

    /// Returns true when `name` was seen anywhere in the input.
    pub fn contains(&self, name: &str) -> bool {
        self.is_always_empty(name) || self.is_ever_non_empty(name)
    }

    pub fn field_count(&self) -> usize {
        self.always_empty.len() + self.ever_non_empty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

/// Full-barrier reduction over the input collection.
pub struct ColumnClassifier;

impl ColumnClassifier {
    /// Sequential fold over every record.
    pub fn classify<'a, I>(records: I) -> ColumnClassification
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .fold(ColumnStats::new(), |mut stats, record| {
                stats.observe(record);
                stats
            })
            .finish()
    }

    /// Folds rayon-chosen shards in parallel and unions the partial states.
    #[cfg(feature = "rayon")]
    pub fn classify_par(records: &[Record]) -> ColumnClassification {
        records
            .par_iter()
            .fold(ColumnStats::new, |mut stats, record| {
                stats.observe(record);
                stats
            })
            .reduce(ColumnStats::new, ColumnStats::merge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnClassifier, ColumnStats};
    use crate::record::Record;

    fn rows() -> Vec<Record> {
        vec![
            Record::from_pairs(0, [("state", "NY"), ("positive", ""), ("extra", "")]),
            Record::from_pairs(1, [("state", "CA"), ("positive", "12"), ("extra", " ")]),
            Record::from_pairs(2, [("state", ""), ("grade", "")]),
        ]
    }

    #[test]
    fn empty_input_yields_empty_classification() {
        let records: Vec<Record> = Vec::new();
        let classification = ColumnClassifier::classify(&records);
        assert!(classification.is_empty());
        assert!(classification.always_empty().is_empty());
        assert!(classification.ever_non_empty().is_empty());
    }

    #[test]
    fn fields_are_split_by_whether_any_row_populates_them() {
        let records = rows();
        let classification = ColumnClassifier::classify(&records);

        assert!(classification.is_ever_non_empty("state"));
        assert!(classification.is_ever_non_empty("positive"));
        assert!(classification.is_always_empty("extra"));
        assert!(classification.is_always_empty("grade"));
        assert!(!classification.contains("negative"));
        assert_eq!(classification.field_count(), 4);
    }

    #[test]
    fn merge_is_order_independent() {
        let records = rows();
        let mut left = ColumnStats::new();
        left.observe(&records[0]);
        let mut right = ColumnStats::new();
        right.observe(&records[1]);
        right.observe(&records[2]);

        let ab = left.clone().merge(right.clone()).finish();
        let ba = right.merge(left).finish();
        assert_eq!(ab, ba);
        assert_eq!(ab, ColumnClassifier::classify(&records));
    }

    #[test]
    fn observing_the_same_record_twice_is_idempotent() {
        let records = rows();
        let mut once = ColumnStats::new();
        once.observe(&records[1]);
        let mut twice = once.clone();
        twice.observe(&records[1]);
        assert_eq!(once, twice);
        assert_eq!(once.fields_seen(), 3);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_fold_matches_sequential_fold() {
        let records: Vec<Record> = (0..512)
            .map(|idx| {
                let value = if idx == 311 { "x" } else { "" };
                Record::from_pairs(idx, [("state", "NY"), ("rare", value), ("never", "")])
            })
            .collect();

        let sequential = ColumnClassifier::classify(&records);
        let parallel = ColumnClassifier::classify_par(&records);
        assert_eq!(sequential, parallel);
        assert!(parallel.is_ever_non_empty("rare"));
        assert!(parallel.is_always_empty("never"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn classification_serializes_both_sets() {
        let classification = ColumnClassifier::classify(&rows());
        let encoded = serde_json::to_value(&classification).expect("classification should encode");
        assert_eq!(encoded["always_empty"], serde_json::json!(["extra", "grade"]));
        assert_eq!(encoded["ever_non_empty"], serde_json::json!(["positive", "state"]));
    }
}
