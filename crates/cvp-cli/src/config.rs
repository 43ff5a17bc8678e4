// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::PipelineError;
use cvp_detect::SpikeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REGION_FIELD: &str = "state";
pub const DEFAULT_DATE_FIELD: &str = "date";
pub const DEFAULT_METRIC_FIELD: &str = "positive";
pub const DEFAULT_KEEP_FIELDS: [&str; 2] = ["positive", "negative"];

/// Everything one run needs. Loaded from JSON, then overridden by flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input_file: PathBuf,
    pub spikes_output_file: PathBuf,
    pub delimiter: char,
    pub region_field: String,
    pub date_field: String,
    pub metric_field: String,
    /// Fields retained by projection even when the dataset never fills them.
    pub keep_fields: Vec<String>,
    /// Worker threads; 0 uses the rayon default.
    pub threads: usize,
    /// Output shard count; 0 writes a single file at `spikes_output_file`.
    pub num_shards: usize,
    pub spike: SpikeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::new(),
            spikes_output_file: PathBuf::new(),
            delimiter: ',',
            region_field: DEFAULT_REGION_FIELD.to_string(),
            date_field: DEFAULT_DATE_FIELD.to_string(),
            metric_field: DEFAULT_METRIC_FIELD.to_string(),
            keep_fields: DEFAULT_KEEP_FIELDS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            threads: 0,
            num_shards: 0,
            spike: SpikeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(raw)
            .map_err(|source| PipelineError::json("failed to parse pipeline config JSON", source))
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|source| {
            PipelineError::io(format!("failed to read '{}'", path.display()), source)
        })?;
        serde_json::from_str(&raw).map_err(|source| {
            PipelineError::json(
                format!("failed to parse pipeline config '{}'", path.display()),
                source,
            )
        })
    }

    pub fn allowlist(&self) -> BTreeSet<String> {
        self.keep_fields.iter().cloned().collect()
    }

    /// Delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, PipelineError> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(PipelineError::invalid_input(format!(
                "delimiter must be a single ASCII character other than a quote or newline; got {:?}",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }

    /// Checks the settings the analysis stages depend on.
    pub fn validate_analysis(&self) -> Result<(), PipelineError> {
        for (flag, value) in [
            ("region_field", &self.region_field),
            ("date_field", &self.date_field),
            ("metric_field", &self.metric_field),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::invalid_input(format!(
                    "{flag} must not be empty"
                )));
            }
        }
        if self.region_field == self.date_field {
            return Err(PipelineError::invalid_input(format!(
                "region_field and date_field must differ; both are '{}'",
                self.region_field
            )));
        }
        self.spike.validate()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.input_file.as_os_str().is_empty() {
            return Err(PipelineError::invalid_input("input_file is required"));
        }
        if self.spikes_output_file.as_os_str().is_empty() {
            return Err(PipelineError::invalid_input(
                "spikes_output_file is required",
            ));
        }
        if self.spikes_output_file.file_name().is_none() {
            return Err(PipelineError::invalid_input(format!(
                "spikes_output_file must name a file; got '{}'",
                self.spikes_output_file.display()
            )));
        }
        self.delimiter_byte()?;
        self.validate_analysis()
    }
}
