// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use clap::{Parser, ValueEnum};
use cvp_cli::{PipelineConfig, PipelineError, run_pipeline};
use cvp_detect::{DEFAULT_MIN_RATIO, MetricMode, ThresholdPolicy, WindowPolicy};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Flag daily spikes in per-state COVID-19 counts.
#[derive(Parser, Debug)]
#[command(name = "covidpipe", author, version, about, long_about = None)]
struct Args {
    /// Delimited input file with a header row
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Output path (or shard prefix) for newline-delimited spike events
    #[arg(long)]
    spikes_output_file: Option<PathBuf>,

    /// JSON pipeline config; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Output shards (0 = single file)
    #[arg(long)]
    num_shards: Option<usize>,

    #[arg(long)]
    delimiter: Option<char>,

    #[arg(long)]
    region_field: Option<String>,

    #[arg(long)]
    date_field: Option<String>,

    #[arg(long)]
    metric_field: Option<String>,

    /// Field kept by projection even if never populated; repeatable
    #[arg(long = "keep-field")]
    keep_fields: Vec<String>,

    /// Trailing window of N prior observations
    #[arg(long, conflicts_with = "window_days")]
    window_size: Option<usize>,

    /// Trailing calendar window of N days
    #[arg(long)]
    window_days: Option<usize>,

    #[arg(long, value_enum)]
    metric_mode: Option<MetricModeArg>,

    #[arg(long, value_enum)]
    threshold_kind: Option<ThresholdKindArg>,

    /// Ratio or delta the deviation must exceed
    #[arg(long)]
    threshold: Option<f64>,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MetricModeArg {
    Raw,
    DailyDelta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ThresholdKindArg {
    Ratio,
    Delta,
}

impl MetricModeArg {
    fn as_mode(self) -> MetricMode {
        match self {
            Self::Raw => MetricMode::Raw,
            Self::DailyDelta => MetricMode::DailyDelta,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    let args = Args::parse();
    let filter = match log_filter(&args.log_level) {
        Ok(filter) => filter,
        Err(err) => {
            emit_structured_error(&err);
            process::exit(1);
        }
    };
    init_tracing(filter);

    if let Err(err) = run(args) {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), PipelineError> {
    let config = resolve_config(args)?;
    let summary = run_pipeline(&config)?;
    let encoded = serde_json::to_string_pretty(&summary)
        .map_err(|source| PipelineError::json("failed to serialize run summary", source))?;
    println!("{encoded}");
    Ok(())
}

/// RUST_LOG wins when it parses; otherwise `--log-level` must be a valid filter.
fn log_filter(log_level: &str) -> Result<EnvFilter, PipelineError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse_log_level(log_level),
    }
}

fn parse_log_level(log_level: &str) -> Result<EnvFilter, PipelineError> {
    EnvFilter::try_new(log_level).map_err(|err| {
        PipelineError::invalid_input(format!("invalid --log-level '{log_level}': {err}"))
    })
}

fn init_tracing(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_config(args: Args) -> Result<PipelineConfig, PipelineError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(path) = args.input_file {
        config.input_file = path;
    }
    if let Some(path) = args.spikes_output_file {
        config.spikes_output_file = path;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(num_shards) = args.num_shards {
        config.num_shards = num_shards;
    }
    if let Some(delimiter) = args.delimiter {
        config.delimiter = delimiter;
    }
    if let Some(field) = args.region_field {
        config.region_field = field;
    }
    if let Some(field) = args.date_field {
        config.date_field = field;
    }
    if let Some(field) = args.metric_field {
        config.metric_field = field;
    }
    if !args.keep_fields.is_empty() {
        config.keep_fields = args.keep_fields;
    }

    if let Some(size) = args.window_size {
        config.spike.window = WindowPolicy::TrailingObservations { size };
    }
    if let Some(days) = args.window_days {
        config.spike.window = WindowPolicy::TrailingDays { days };
    }
    if let Some(mode) = args.metric_mode {
        config.spike.metric = mode.as_mode();
    }
    config.spike.threshold =
        resolve_threshold(config.spike.threshold, args.threshold_kind, args.threshold)?;

    config.validate()?;
    Ok(config)
}

fn resolve_threshold(
    current: ThresholdPolicy,
    kind: Option<ThresholdKindArg>,
    value: Option<f64>,
) -> Result<ThresholdPolicy, PipelineError> {
    let kind = kind.unwrap_or(match current {
        ThresholdPolicy::Ratio { .. } => ThresholdKindArg::Ratio,
        ThresholdPolicy::Delta { .. } => ThresholdKindArg::Delta,
    });

    match (kind, current, value) {
        (ThresholdKindArg::Ratio, _, Some(min_ratio)) => Ok(ThresholdPolicy::Ratio { min_ratio }),
        (ThresholdKindArg::Delta, _, Some(min_delta)) => Ok(ThresholdPolicy::Delta { min_delta }),
        (ThresholdKindArg::Ratio, ThresholdPolicy::Ratio { .. }, None)
        | (ThresholdKindArg::Delta, ThresholdPolicy::Delta { .. }, None) => Ok(current),
        (ThresholdKindArg::Ratio, ThresholdPolicy::Delta { .. }, None) => {
            Ok(ThresholdPolicy::Ratio {
                min_ratio: DEFAULT_MIN_RATIO,
            })
        }
        (ThresholdKindArg::Delta, ThresholdPolicy::Ratio { .. }, None) => Err(
            PipelineError::invalid_input("--threshold-kind delta requires --threshold"),
        ),
    }
}

fn emit_structured_error(err: &PipelineError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
