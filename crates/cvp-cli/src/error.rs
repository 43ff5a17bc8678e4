// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cvp_core::CvpError;
use thiserror::Error;

/// Failures that abort a pipeline run.
///
/// Per-record problems never surface here; they are filtered and counted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CvpError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Csv {
        context: String,
        source: csv::Error,
    },
    #[error("{context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    ResourceLimit(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Io { .. } => "io_error",
            Self::Csv { .. } => "csv_error",
            Self::Json { .. } => "json_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;
    use cvp_core::CvpError;
    use std::error::Error as _;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            PipelineError::from(CvpError::invalid_input("bad window")).code(),
            "invalid_input"
        );
        assert_eq!(PipelineError::invalid_input("x").code(), "invalid_input");
        assert_eq!(PipelineError::resource_limit("x").code(), "resource_limit");
        let io = PipelineError::io(
            "failed to read 'missing.csv'",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(io.code(), "io_error");
    }

    #[test]
    fn context_is_prefixed_and_source_is_kept() {
        let err = PipelineError::io(
            "failed to read 'missing.csv'",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.to_string(), "failed to read 'missing.csv': no such file");
        assert!(err.source().is_some());

        let core = PipelineError::from(CvpError::invalid_input("window must be >= 1"));
        assert_eq!(core.to_string(), "invalid input: window must be >= 1");
    }
}
