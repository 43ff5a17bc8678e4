// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors raised by the analytic stages.
///
/// Data problems are filtered and counted instead; this only signals invalid
/// configuration handed to a stage.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CvpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CvpError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable code for error envelopes.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}
