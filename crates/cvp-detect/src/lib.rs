// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Trailing-window spike detection over region series.

pub mod policy;
pub mod spike;

pub use policy::{
    DEFAULT_MIN_RATIO, DEFAULT_WINDOW_SIZE, MetricMode, SpikeConfig, ThresholdPolicy, WindowPolicy,
};
pub use spike::{Observation, RegionReport, Score, SpikeDetector, SpikeEvent, parse_metric};
