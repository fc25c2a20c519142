//! Pipeline error types
//!
//! Per-window and per-family failures are recoverable and are caught by the
//! caller that owns the continuation policy. Only `NoValidWindows` (and I/O or
//! configuration problems) surface to the user as fatal.

use thiserror::Error;

use crate::models::ModelFamily;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("insufficient data for {context}: need {required} observations, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("{family} fit failed: {reason}")]
    ModelFit { family: ModelFamily, reason: String },

    #[error("no valid walk-forward windows for {ticker} ({skipped} windows skipped)")]
    NoValidWindows { ticker: String, skipped: usize },

    #[error("no candidate models to select from")]
    NoCandidates,

    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("data error: {0}")]
    Data(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        PipelineError::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }

    pub fn model_fit(family: ModelFamily, reason: impl Into<String>) -> Self {
        PipelineError::ModelFit {
            family,
            reason: reason.into(),
        }
    }

    /// Whether the error only invalidates one window or candidate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientData { .. }
                | PipelineError::ModelFit { .. }
                | PipelineError::NoCandidates
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_fit_message_names_family() {
        let err = PipelineError::model_fit(ModelFamily::Figarch, "non-finite likelihood");
        assert_eq!(err.to_string(), "FIGARCH fit failed: non-finite likelihood");
        assert!(err.is_recoverable());
    }

    #[test]
    fn no_valid_windows_is_fatal() {
        let err = PipelineError::NoValidWindows {
            ticker: "INFY.NS".to_string(),
            skipped: 4,
        };
        assert!(!err.is_recoverable());
    }
}
