// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{Days, NaiveDate};
use cvp_core::Record;

/// Deterministic states-daily style rows: `regions` regions over `days`
/// consecutive days, with occasional blank metrics, rare jumps and two
/// always-empty columns.
pub fn synthetic_records(regions: usize, days: usize) -> Vec<Record> {
    let Some(start) = NaiveDate::from_ymd_opt(2020, 3, 1) else {
        return Vec::new();
    };
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut records = Vec::with_capacity(regions * days);

    for day in 0..days {
        let date = (start + Days::new(day as u64)).format("%Y%m%d").to_string();
        for region in 0..regions {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let noise = (state >> 33) % 50;
            let positive = if (state >> 20) % 97 == 0 {
                String::new()
            } else if (state >> 12) % 211 == 0 {
                (noise * 40 + 1_000).to_string()
            } else {
                (100 + noise).to_string()
            };

            records.push(Record::from_pairs(
                records.len() as u64,
                [
                    ("state", format!("S{region:02}")),
                    ("date", date.clone()),
                    ("positive", positive),
                    ("negative", (noise * 3).to_string()),
                    ("hospitalized", String::new()),
                    ("grade", String::new()),
                ],
            ));
        }
    }
    records
}
