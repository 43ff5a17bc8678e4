// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::classify::ColumnClassification;
use crate::record::{Record, is_empty_value};
use std::collections::{BTreeMap, BTreeSet};

/// A record reduced to the fields worth keeping.
///
/// Only [`RowProjector::project`] constructs values of this type, so every
/// field is either populated somewhere in the dataset or allowlisted, and no
/// field is empty.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedRecord {
    ordinal: u64,
    fields: BTreeMap<String, String>,
}

impl ProjectedRecord {
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Per-record sanitizer driven by the dataset-wide classification.
///
/// Borrows the sealed classification, so it cannot exist before the
/// classification fold has finished. Holds no mutable state and is `Sync`;
/// one projector is shared by every worker.
#[derive(Clone, Copy, Debug)]
pub struct RowProjector<'a> {
    classification: &'a ColumnClassification,
    allowlist: &'a BTreeSet<String>,
}

impl<'a> RowProjector<'a> {
    pub fn new(classification: &'a ColumnClassification, allowlist: &'a BTreeSet<String>) -> Self {
        Self {
            classification,
            allowlist,
        }
    }

    pub fn classification(&self) -> &'a ColumnClassification {
        self.classification
    }

    pub fn allowlist(&self) -> &'a BTreeSet<String> {
        self.allowlist
    }

    /// Returns true when a non-empty value of `name` survives projection.
    pub fn keeps(&self, name: &str) -> bool {
        self.classification.is_ever_non_empty(name) || self.allowlist.contains(name)
    }

    /// Projects one record, or returns `None` when no field survives.
    pub fn project(&self, record: Record) -> Option<ProjectedRecord> {
        let fields: BTreeMap<String, String> = record
            .fields
            .into_iter()
            .filter(|(name, value)| !is_empty_value(value) && self.keeps(name))
            .collect();

        if fields.is_empty() {
            return None;
        }

        Some(ProjectedRecord {
            ordinal: record.ordinal,
            fields,
        })
    }
}
