// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use chrono::{Days, NaiveDate};
use cvp_cli::source::parse_records;
use cvp_cli::{PipelineConfig, analyze};
use cvp_detect::{MetricMode, SpikeConfig, SpikeDetector, ThresholdPolicy, WindowPolicy};
use libfuzzer_sys::fuzz_target;

fn build_spike_config(window_seed: u8, mode_seed: u8, threshold_seed: u8) -> SpikeConfig {
    let span = usize::from(window_seed % 16);
    let window = if window_seed & 0x80 == 0 {
        WindowPolicy::TrailingObservations { size: span }
    } else {
        WindowPolicy::TrailingDays { days: span }
    };
    let metric = if mode_seed & 1 == 0 {
        MetricMode::Raw
    } else {
        MetricMode::DailyDelta
    };
    let threshold = match threshold_seed % 3 {
        0 => ThresholdPolicy::default(),
        1 => ThresholdPolicy::Ratio {
            min_ratio: f64::from(threshold_seed) / 16.0,
        },
        _ => ThresholdPolicy::Delta {
            min_delta: f64::from(threshold_seed) * 4.0,
        },
    };
    SpikeConfig {
        window,
        metric,
        threshold,
    }
}

fuzz_target!(|data: &[u8]| {
    let [window_seed, mode_seed, threshold_seed, delimiter_seed, payload @ ..] = data else {
        return;
    };
    let spike = build_spike_config(*window_seed, *mode_seed, *threshold_seed);
    let delimiter = match delimiter_seed % 3 {
        0 => b',',
        1 => b'\t',
        _ => b';',
    };

    // Whole pipeline over arbitrary delimited text.
    if let Ok(records) = parse_records(payload, delimiter, "fuzz") {
        let config = PipelineConfig {
            spike,
            ..PipelineConfig::default()
        };
        let _ = analyze(records, &config);
    }

    // Streaming detector over arbitrary cells with a wandering calendar.
    let Ok(mut detector) = SpikeDetector::new(spike) else {
        return;
    };
    let Some(mut date) = NaiveDate::from_ymd_opt(2020, 1, 22) else {
        return;
    };
    let text = String::from_utf8_lossy(payload);
    for (idx, cell) in text.split(|c: char| c == ',' || c == '\n').enumerate() {
        let step = u64::from(payload.get(idx).copied().unwrap_or(1) % 4);
        date = date.checked_add_days(Days::new(step)).unwrap_or(date);
        let _ = detector.observe(date, cell);
        if idx % 97 == 96 {
            detector.reset();
        }
    }
});
