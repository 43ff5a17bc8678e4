// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::project::ProjectedRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Accepted spellings of the date field, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y%m%d", "%Y-%m-%d", "%m/%d/%Y"];

const DEFAULT_PARTITIONS: usize = 16;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Parses a calendar date in any of [`DATE_FORMATS`].
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

// FNV-1a keeps partition routing identical across runs and toolchains.
fn stable_region_hash(region: &str) -> u64 {
    region.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// One dated observation of a region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub record: ProjectedRecord,
}

impl SeriesPoint {
    pub fn ordinal(&self) -> u64 {
        self.record.ordinal()
    }
}

/// One region's observations ordered by `(date, input ordinal)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionSeries {
    region: String,
    points: Vec<SeriesPoint>,
}

impl RegionSeries {
    fn from_unsorted(region: String, mut points: Vec<SeriesPoint>) -> Self {
        points.sort_by(|lhs, rhs| {
            lhs.date
                .cmp(&rhs.date)
                .then(lhs.ordinal().cmp(&rhs.ordinal()))
        });
        Self { region, points }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Map-keyed bucket of every region routed to one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionPartition {
    buckets: BTreeMap<String, Vec<SeriesPoint>>,
}

impl RegionPartition {
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn push(&mut self, region: &str, point: SeriesPoint) {
        match self.buckets.get_mut(region) {
            Some(points) => points.push(point),
            None => {
                self.buckets.insert(region.to_string(), vec![point]);
            }
        }
    }

    pub fn into_series(self) -> Vec<RegionSeries> {
        self.buckets
            .into_iter()
            .map(|(region, points)| RegionSeries::from_unsorted(region, points))
            .collect()
    }
}

/// Output of the shuffle step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Shuffle {
    pub partitions: Vec<RegionPartition>,
    /// Records whose date field was missing or unparsable.
    pub undated: usize,
    /// Records without a region value.
    pub unkeyed: usize,
}

/// Result of grouping records into per-region series.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeriesBuild {
    /// One series per region, ascending by region key.
    pub series: Vec<RegionSeries>,
    pub undated: usize,
    pub unkeyed: usize,
}

impl SeriesBuild {
    pub fn observation_count(&self) -> usize {
        self.series.iter().map(RegionSeries::len).sum()
    }
}

/// Groups projected records by region and orders each region by date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateSeriesBuilder {
    region_field: String,
    date_field: String,
    partitions: usize,
}

impl StateSeriesBuilder {
    pub fn new(region_field: impl Into<String>, date_field: impl Into<String>) -> Self {
        Self {
            region_field: region_field.into(),
            date_field: date_field.into(),
            partitions: DEFAULT_PARTITIONS,
        }
    }

    /// Sets the shuffle fan-out. Zero is treated as one.
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn partition_count(&self) -> usize {
        self.partitions
    }

    pub fn region_field(&self) -> &str {
        &self.region_field
    }

    pub fn date_field(&self) -> &str {
        &self.date_field
    }

    /// Partition that owns every record of `region`.
    pub fn partition_of(&self, region: &str) -> usize {
        (stable_region_hash(region) % self.partitions as u64) as usize
    }

    /// Routes each record to the partition owning its region.
    pub fn shuffle(&self, records: Vec<ProjectedRecord>) -> Shuffle {
        let mut shuffle = Shuffle {
            partitions: vec![RegionPartition::default(); self.partitions],
            undated: 0,
            unkeyed: 0,
        };

        for record in records {
            let Some(region) = record.get(&self.region_field).map(str::to_string) else {
                shuffle.unkeyed += 1;
                continue;
            };
            let Some(date) = record.get(&self.date_field).and_then(parse_date) else {
                shuffle.undated += 1;
                continue;
            };
            let partition = self.partition_of(&region);
            shuffle.partitions[partition].push(&region, SeriesPoint { date, record });
        }

        shuffle
    }

    /// Shuffles, then sorts every region bucket into a [`RegionSeries`].
    pub fn build(&self, records: Vec<ProjectedRecord>) -> SeriesBuild {
        let Shuffle {
            partitions,
            undated,
            unkeyed,
        } = self.shuffle(records);

        #[cfg(feature = "rayon")]
        let mut series: Vec<RegionSeries> = partitions
            .into_par_iter()
            .flat_map_iter(RegionPartition::into_series)
            .collect();
        #[cfg(not(feature = "rayon"))]
        let mut series: Vec<RegionSeries> = partitions
            .into_iter()
            .flat_map(RegionPartition::into_series)
            .collect();

        series.sort_by(|lhs, rhs| lhs.region.cmp(&rhs.region));

        SeriesBuild {
            series,
            undated,
            unkeyed,
        }
    }
}
