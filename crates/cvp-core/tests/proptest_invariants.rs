// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cvp_core::{
    ColumnClassifier, ColumnStats, Record, RowProjector, StateSeriesBuilder, is_empty_value,
};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use std::collections::BTreeSet;

const MIN_PROPTEST_CASES: u32 = 256;
const FIELD_NAMES: [&str; 6] = ["state", "date", "positive", "negative", "grade", "extra"];
const VALUES: [&str; 6] = ["", " ", "0", "17", "NY", "20200401"];

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn record_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..FIELD_NAMES.len(), 0..VALUES.len()), 0..FIELD_NAMES.len())
}

fn dataset_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record_strategy(), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(ordinal, cells)| {
                Record::from_pairs(
                    ordinal as u64,
                    cells
                        .into_iter()
                        .map(|(field, value)| (FIELD_NAMES[field], VALUES[value])),
                )
            })
            .collect()
    })
}

fn allowlist_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(0..FIELD_NAMES.len(), 0..3).prop_map(|indices| {
        indices
            .into_iter()
            .map(|idx| FIELD_NAMES[idx].to_string())
            .collect()
    })
}

fn fold_shards(records: &[Record], cuts: &[usize]) -> Vec<ColumnStats> {
    let mut bounds: Vec<usize> = cuts
        .iter()
        .map(|cut| cut % (records.len() + 1))
        .collect();
    bounds.push(0);
    bounds.push(records.len());
    bounds.sort_unstable();
    bounds.dedup();

    bounds
        .windows(2)
        .map(|window| {
            let mut stats = ColumnStats::new();
            for record in &records[window[0]..window[1]] {
                stats.observe(record);
            }
            stats
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn classification_partitions_every_seen_field(records in dataset_strategy()) {
        let classification = ColumnClassifier::classify(&records);

        let seen: BTreeSet<&str> = records
            .iter()
            .flat_map(|record| record.iter().map(|(name, _)| name))
            .collect();
        prop_assert_eq!(classification.field_count(), seen.len());

        for name in seen {
            let populated = records
                .iter()
                .any(|record| record.get(name).is_some_and(|value| !is_empty_value(value)));
            prop_assert_eq!(classification.is_ever_non_empty(name), populated);
            prop_assert_eq!(classification.is_always_empty(name), !populated);
        }
        prop_assert!(classification.always_empty().is_disjoint(classification.ever_non_empty()));
    }

    #[test]
    fn classification_is_independent_of_sharding_and_merge_order(
        records in dataset_strategy(),
        cuts in prop::collection::vec(0usize..64, 0..6),
    ) {
        let sequential = ColumnClassifier::classify(&records);

        let shards = fold_shards(&records, &cuts);
        let forward = shards
            .iter()
            .cloned()
            .fold(ColumnStats::new(), ColumnStats::merge)
            .finish();
        let backward = shards
            .into_iter()
            .rev()
            .fold(ColumnStats::new(), ColumnStats::merge)
            .finish();

        prop_assert_eq!(&forward, &sequential);
        prop_assert_eq!(&backward, &sequential);
    }

    #[test]
    fn projection_only_keeps_populated_or_allowlisted_fields(
        records in dataset_strategy(),
        allowlist in allowlist_strategy(),
    ) {
        let classification = ColumnClassifier::classify(&records);
        let projector = RowProjector::new(&classification, &allowlist);

        for record in records {
            let original = record.clone();
            match projector.project(record) {
                Some(projected) => {
                    prop_assert!(!projected.is_empty());
                    prop_assert_eq!(projected.ordinal(), original.ordinal);
                    for (name, value) in projected.fields() {
                        prop_assert!(!is_empty_value(value));
                        prop_assert!(
                            classification.is_ever_non_empty(name) || allowlist.contains(name)
                        );
                        prop_assert_eq!(original.get(name), Some(value.as_str()));
                    }
                }
                None => {
                    prop_assert!(original
                        .iter()
                        .all(|(name, value)| is_empty_value(value) || !projector.keeps(name)));
                }
            }
        }
    }

    #[test]
    fn series_are_sorted_and_cover_every_dated_keyed_record(records in dataset_strategy()) {
        let classification = ColumnClassifier::classify(&records);
        let keep = BTreeSet::new();
        let projector = RowProjector::new(&classification, &keep);
        let projected: Vec<_> = records
            .into_iter()
            .filter_map(|record| projector.project(record))
            .collect();
        let total = projected.len();

        let build = StateSeriesBuilder::new("state", "date").build(projected);
        prop_assert_eq!(build.observation_count() + build.undated + build.unkeyed, total);

        for series in &build.series {
            prop_assert!(!series.is_empty());
            for pair in series.points().windows(2) {
                prop_assert!(
                    (pair[0].date, pair[0].ordinal()) < (pair[1].date, pair[1].ordinal())
                );
            }
            for point in series.points() {
                prop_assert_eq!(point.record.get("state"), Some(series.region()));
            }
        }
        for pair in build.series.windows(2) {
            prop_assert!(pair[0].region() < pair[1].region());
        }
    }
}
