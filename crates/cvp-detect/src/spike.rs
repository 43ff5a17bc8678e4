// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::policy::{MetricMode, SpikeConfig, WindowPolicy};
use chrono::{Days, NaiveDate};
use cvp_core::{CvpError, RegionSeries};
use std::collections::VecDeque;
use tracing::debug;

/// Parses a metric cell. Non-numeric and non-finite values yield `None`.
pub fn parse_metric(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// One flagged observation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SpikeEvent {
    pub region: String,
    pub date: NaiveDate,
    /// Zero-based index of the observation within its region series.
    pub position: usize,
    pub observed: f64,
    pub baseline: f64,
    pub deviation: f64,
}

/// Comparison of one observation against a full window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
    pub observed: f64,
    pub baseline: f64,
    pub deviation: f64,
    pub spike: bool,
}

/// Outcome of feeding one observation to the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// Malformed metric; the window was left untouched.
    Skipped,
    /// Not enough history yet; the value only extends the window.
    Warmup,
    /// The window was full but the threshold policy cannot score it.
    Unscored,
    Scored(Score),
}

/// Per-region detection summary.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionReport {
    pub region: String,
    /// Observations with a usable metric value.
    pub valid: usize,
    /// Observations compared against a full window.
    pub scored: usize,
    /// Observations dropped for a malformed metric value.
    pub skipped: usize,
    /// Flagged observations in series order.
    pub spikes: Vec<SpikeEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct WindowEntry {
    date: NaiveDate,
    value: f64,
}

/// Trailing-window spike detector for a single region.
///
/// State is order dependent, so one detector walks one series at a time;
/// run separate detectors to process regions concurrently.
#[derive(Clone, Debug)]
pub struct SpikeDetector {
    config: SpikeConfig,
    window: VecDeque<WindowEntry>,
    last_total: Option<f64>,
}

impl SpikeDetector {
    pub fn new(config: SpikeConfig) -> Result<Self, CvpError> {
        config.validate()?;
        Ok(Self {
            config,
            window: VecDeque::new(),
            last_total: None,
        })
    }

    pub fn config(&self) -> &SpikeConfig {
        &self.config
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_total = None;
    }

    fn evict_expired(&mut self, date: NaiveDate) {
        let WindowPolicy::TrailingDays { days } = self.config.window else {
            return;
        };
        let Some(cutoff) = date.checked_sub_days(Days::new(days as u64)) else {
            return;
        };
        while self.window.front().is_some_and(|entry| entry.date < cutoff) {
            self.window.pop_front();
        }
    }

    /// Running mean of the window; exact when every entry is equal.
    fn baseline(&self) -> f64 {
        let mut mean = 0.0;
        for (idx, entry) in self.window.iter().enumerate() {
            mean += (entry.value - mean) / (idx + 1) as f64;
        }
        mean
    }

    fn push(&mut self, entry: WindowEntry) {
        self.window.push_back(entry);
        if let WindowPolicy::TrailingObservations { size } = self.config.window {
            while self.window.len() > size {
                self.window.pop_front();
            }
        }
    }

    /// Feeds one observation dated `date` with raw metric text `raw`.
    pub fn observe(&mut self, date: NaiveDate, raw: &str) -> Observation {
        let Some(parsed) = parse_metric(raw) else {
            return Observation::Skipped;
        };

        let value = match self.config.metric {
            MetricMode::Raw => parsed,
            MetricMode::DailyDelta => match self.last_total.replace(parsed) {
                Some(previous) => parsed - previous,
                None => return Observation::Warmup,
            },
        };

        self.evict_expired(date);

        let outcome = if self.window.len() >= self.config.window.required() {
            let baseline = self.baseline();
            match self.config.threshold.deviation(value, baseline) {
                Some(deviation) => Observation::Scored(Score {
                    observed: value,
                    baseline,
                    deviation,
                    spike: self.config.threshold.exceeds(deviation),
                }),
                None => Observation::Unscored,
            }
        } else {
            Observation::Warmup
        };

        self.push(WindowEntry { date, value });
        outcome
    }

    /// Runs a fresh window over `series`, reading the metric from `metric_field`.
    pub fn detect(&mut self, series: &RegionSeries, metric_field: &str) -> RegionReport {
        self.reset();

        let mut report = RegionReport {
            region: series.region().to_string(),
            ..RegionReport::default()
        };

        for (position, point) in series.points().iter().enumerate() {
            let raw = point.record.get(metric_field).unwrap_or_default();
            match self.observe(point.date, raw) {
                Observation::Skipped => {
                    report.skipped += 1;
                    debug!(
                        region = series.region(),
                        date = %point.date,
                        position,
                        raw,
                        "skipping malformed metric value"
                    );
                }
                Observation::Warmup | Observation::Unscored => report.valid += 1,
                Observation::Scored(score) => {
                    report.valid += 1;
                    report.scored += 1;
                    if score.spike {
                        debug!(
                            region = series.region(),
                            date = %point.date,
                            observed = score.observed,
                            baseline = score.baseline,
                            "spike flagged"
                        );
                        report.spikes.push(SpikeEvent {
                            region: series.region().to_string(),
                            date: point.date,
                            position,
                            observed: score.observed,
                            baseline: score.baseline,
                            deviation: score.deviation,
                        });
                    }
                }
            }
        }

        report
    }
}
