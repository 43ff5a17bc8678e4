// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cvp_core::CvpError;

/// Number of prior observations in the default trailing window.
pub const DEFAULT_WINDOW_SIZE: usize = 7;
/// Default observed/baseline ratio above which an observation is a spike.
pub const DEFAULT_MIN_RATIO: f64 = 2.0;

/// Which prior observations form the baseline window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPolicy {
    /// The most recent `size` valid observations, regardless of date gaps.
    TrailingObservations { size: usize },
    /// Valid observations dated no earlier than `date - days`.
    ///
    /// The window only counts as full once it holds `days` observations, so
    /// a region with reporting gaps is not judged across them.
    TrailingDays { days: usize },
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::TrailingObservations {
            size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl WindowPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrailingObservations { .. } => "TrailingObservations",
            Self::TrailingDays { .. } => "TrailingDays",
        }
    }

    /// Observations required before the baseline is trusted.
    pub const fn required(self) -> usize {
        match self {
            Self::TrailingObservations { size } => size,
            Self::TrailingDays { days } => days,
        }
    }

    pub fn validate(self) -> Result<(), CvpError> {
        if self.required() == 0 {
            return Err(CvpError::invalid_input(format!(
                "{} window must be >= 1; got 0",
                self.as_str()
            )));
        }
        Ok(())
    }
}

/// How the raw metric column relates to daily activity.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetricMode {
    /// Values are already daily figures.
    #[default]
    Raw,
    /// Values are running totals; the detector works on the difference
    /// between consecutive valid observations.
    DailyDelta,
}

impl MetricMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::DailyDelta => "daily_delta",
        }
    }
}

/// Deviation measure and the bound it must exceed to flag a spike.
///
/// Only upward jumps are spikes under either policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ThresholdPolicy {
    /// deviation = observed / baseline. Baselines <= 0 are not scored.
    Ratio { min_ratio: f64 },
    /// deviation = observed - baseline.
    Delta { min_delta: f64 },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::Ratio {
            min_ratio: DEFAULT_MIN_RATIO,
        }
    }
}

impl ThresholdPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ratio { .. } => "Ratio",
            Self::Delta { .. } => "Delta",
        }
    }

    pub fn validate(self) -> Result<(), CvpError> {
        match self {
            Self::Ratio { min_ratio } => {
                if !min_ratio.is_finite() || min_ratio <= 0.0 {
                    return Err(CvpError::invalid_input(format!(
                        "Ratio.min_ratio must be finite and > 0; got {min_ratio}"
                    )));
                }
            }
            Self::Delta { min_delta } => {
                if !min_delta.is_finite() || min_delta < 0.0 {
                    return Err(CvpError::invalid_input(format!(
                        "Delta.min_delta must be finite and >= 0; got {min_delta}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deviation of `observed` from `baseline`, or `None` when unscorable.
    pub fn deviation(self, observed: f64, baseline: f64) -> Option<f64> {
        let deviation = match self {
            Self::Ratio { .. } => {
                if baseline <= 0.0 {
                    return None;
                }
                observed / baseline
            }
            Self::Delta { .. } => observed - baseline,
        };
        deviation.is_finite().then_some(deviation)
    }

    pub fn exceeds(self, deviation: f64) -> bool {
        match self {
            Self::Ratio { min_ratio } => deviation > min_ratio,
            Self::Delta { min_delta } => deviation > min_delta,
        }
    }
}

/// Spike detector configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpikeConfig {
    pub window: WindowPolicy,
    pub metric: MetricMode,
    pub threshold: ThresholdPolicy,
}

impl SpikeConfig {
    pub fn validate(&self) -> Result<(), CvpError> {
        self.window.validate()?;
        self.threshold.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_MIN_RATIO, DEFAULT_WINDOW_SIZE, MetricMode, SpikeConfig, ThresholdPolicy,
        WindowPolicy,
    };

    #[test]
    fn default_config_is_seven_observations_raw_ratio_two() {
        let config = SpikeConfig::default();
        assert_eq!(
            config.window,
            WindowPolicy::TrailingObservations {
                size: DEFAULT_WINDOW_SIZE
            }
        );
        assert_eq!(config.metric, MetricMode::Raw);
        assert_eq!(
            config.threshold,
            ThresholdPolicy::Ratio {
                min_ratio: DEFAULT_MIN_RATIO
            }
        );
        config.validate().expect("default config should validate");
    }

    #[test]
    fn validation_rejects_empty_windows() {
        let zero_obs = SpikeConfig {
            window: WindowPolicy::TrailingObservations { size: 0 },
            ..SpikeConfig::default()
        };
        let err = zero_obs.validate().expect_err("zero window must fail");
        assert!(err.to_string().contains("TrailingObservations window must be >= 1"));

        let zero_days = SpikeConfig {
            window: WindowPolicy::TrailingDays { days: 0 },
            ..SpikeConfig::default()
        };
        let err = zero_days.validate().expect_err("zero day window must fail");
        assert!(err.to_string().contains("TrailingDays"));
    }

    #[test]
    fn validation_rejects_bad_thresholds() {
        for threshold in [
            ThresholdPolicy::Ratio { min_ratio: 0.0 },
            ThresholdPolicy::Ratio {
                min_ratio: f64::NAN,
            },
            ThresholdPolicy::Delta { min_delta: -1.0 },
            ThresholdPolicy::Delta {
                min_delta: f64::INFINITY,
            },
        ] {
            let config = SpikeConfig {
                threshold,
                ..SpikeConfig::default()
            };
            assert!(config.validate().is_err(), "{threshold:?} should be rejected");
        }
    }

    #[test]
    fn ratio_deviation_skips_non_positive_baselines() {
        let ratio = ThresholdPolicy::Ratio { min_ratio: 2.0 };
        assert_eq!(ratio.deviation(1000.0, 100.0), Some(10.0));
        assert_eq!(ratio.deviation(5.0, 0.0), None);
        assert_eq!(ratio.deviation(5.0, -3.0), None);
        assert!(ratio.exceeds(10.0));
        assert!(!ratio.exceeds(2.0));
    }

    #[test]
    fn delta_deviation_is_signed_difference() {
        let delta = ThresholdPolicy::Delta { min_delta: 50.0 };
        assert_eq!(delta.deviation(120.0, 100.0), Some(20.0));
        assert_eq!(delta.deviation(0.0, 100.0), Some(-100.0));
        assert!(!delta.exceeds(50.0));
        assert!(delta.exceeds(50.5));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_json_uses_tagged_policies_and_defaults() {
        let config: SpikeConfig = serde_json::from_str(
            r#"{"window":{"kind":"trailing_days","days":14},"metric":"daily_delta"}"#,
        )
        .expect("config should parse");
        assert_eq!(config.window, WindowPolicy::TrailingDays { days: 14 });
        assert_eq!(config.metric, MetricMode::DailyDelta);
        assert_eq!(config.threshold, ThresholdPolicy::default());
    }
}
