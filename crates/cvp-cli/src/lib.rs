// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Batch runner: read a delimited file, classify and project its columns,
//! group the rows into per-region series, flag spikes and write them as
//! newline-delimited JSON.

pub mod config;
pub mod error;
pub mod sink;
pub mod source;

pub use config::PipelineConfig;
pub use error::PipelineError;

use cvp_core::{ColumnClassifier, ProjectedRecord, Record, RowProjector, StateSeriesBuilder};
use cvp_detect::{RegionReport, SpikeDetector, SpikeEvent};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

/// Counters reported at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rows_read: usize,
    pub fields_ever_non_empty: usize,
    pub fields_always_empty: usize,
    /// Rows with no surviving field after projection.
    pub empty_rows_dropped: usize,
    /// Projected rows without a value for the metric field.
    pub missing_metric: usize,
    /// Rows with a missing or unparsable date.
    pub undated: usize,
    /// Rows without a region key.
    pub unkeyed: usize,
    pub regions: usize,
    /// Valid metric observations consumed by the detectors.
    pub observations: usize,
    pub skipped_malformed: usize,
    pub spikes: usize,
    pub output_files: Vec<String>,
}

/// Result of the in-memory analysis stages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    pub summary: RunSummary,
    /// One report per region, ascending by region key.
    pub reports: Vec<RegionReport>,
}

impl Analysis {
    /// Every spike, grouped by region and in series order within a region.
    pub fn spikes(&self) -> impl Iterator<Item = &SpikeEvent> {
        self.reports.iter().flat_map(|report| report.spikes.iter())
    }
}

/// Runs classification, projection, filtering, grouping and detection.
///
/// Uses the current rayon pool; see [`run_pipeline`] for thread control.
pub fn analyze(records: Vec<Record>, config: &PipelineConfig) -> Result<Analysis, PipelineError> {
    config.validate_analysis()?;

    let rows_read = records.len();
    let classification = ColumnClassifier::classify_par(&records);
    info!(
        rows = rows_read,
        ever_non_empty = classification.ever_non_empty().len(),
        always_empty = classification.always_empty().len(),
        "classified columns"
    );

    let allowlist = config.allowlist();
    let projector = RowProjector::new(&classification, &allowlist);
    let projected: Vec<ProjectedRecord> = records
        .into_par_iter()
        .filter_map(|record| projector.project(record))
        .collect();
    let empty_rows_dropped = rows_read - projected.len();

    let metric_field = config.metric_field.as_str();
    let with_metric: Vec<ProjectedRecord> = projected
        .into_par_iter()
        .filter(|record| record.contains(metric_field))
        .collect();
    let missing_metric = rows_read - empty_rows_dropped - with_metric.len();
    info!(
        kept = with_metric.len(),
        empty_rows_dropped, missing_metric, "projected and filtered rows"
    );

    let build = StateSeriesBuilder::new(config.region_field.as_str(), config.date_field.as_str())
        .build(with_metric);
    info!(
        regions = build.series.len(),
        undated = build.undated,
        unkeyed = build.unkeyed,
        "grouped rows into region series"
    );

    let spike = config.spike;
    let reports = build
        .series
        .par_iter()
        .map(|series| -> Result<RegionReport, PipelineError> {
            let mut detector = SpikeDetector::new(spike)?;
            Ok(detector.detect(series, metric_field))
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    let summary = RunSummary {
        rows_read,
        fields_ever_non_empty: classification.ever_non_empty().len(),
        fields_always_empty: classification.always_empty().len(),
        empty_rows_dropped,
        missing_metric,
        undated: build.undated,
        unkeyed: build.unkeyed,
        regions: reports.len(),
        observations: reports.iter().map(|report| report.valid).sum(),
        skipped_malformed: reports.iter().map(|report| report.skipped).sum(),
        spikes: reports.iter().map(|report| report.spikes.len()).sum(),
        output_files: Vec::new(),
    };
    info!(
        observations = summary.observations,
        skipped_malformed = summary.skipped_malformed,
        spikes = summary.spikes,
        "detected spikes"
    );

    Ok(Analysis { summary, reports })
}

fn with_thread_pool<T, F>(threads: usize, op: F) -> Result<T, PipelineError>
where
    T: Send,
    F: FnOnce() -> Result<T, PipelineError> + Send,
{
    if threads == 0 {
        return op();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| {
            PipelineError::resource_limit(format!(
                "failed to start a worker pool with {threads} threads: {err}"
            ))
        })?;
    pool.install(op)
}

/// Executes a full run described by `config`.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let records = source::read_records(&config.input_file, config.delimiter_byte()?)?;
    info!(
        input = %config.input_file.display(),
        rows = records.len(),
        "read input"
    );

    let analysis = with_thread_pool(config.threads, || analyze(records, config))?;

    let paths = sink::write_spikes(
        &config.spikes_output_file,
        config.num_shards,
        analysis.spikes(),
    )?;
    info!(files = paths.len(), spikes = analysis.summary.spikes, "wrote spikes");

    let mut summary = analysis.summary;
    summary.output_files = paths
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    Ok(summary)
}
