// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core record model and the dataset-shaping stages of the spike pipeline.
//!
//! The stages run in a fixed order: [`ColumnClassifier`] folds the whole
//! input into one [`ColumnClassification`], [`RowProjector`] borrows that
//! value to sanitize each record, and [`StateSeriesBuilder`] partitions the
//! surviving records into one [`RegionSeries`] per region.

pub mod classify;
pub mod error;
pub mod project;
pub mod record;
pub mod series;

pub use classify::{ColumnClassification, ColumnClassifier, ColumnStats};
pub use error::CvpError;
pub use project::{ProjectedRecord, RowProjector};
pub use record::{Record, is_empty_value};
pub use series::{
    DATE_FORMATS, RegionPartition, RegionSeries, SeriesBuild, SeriesPoint, Shuffle,
    StateSeriesBuilder, parse_date,
};
