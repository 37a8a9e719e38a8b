use std::path::PathBuf;

use thiserror::Error;

use crate::sample::OperationKind;

/// Failures raised while collecting, aggregating, persisting or analyzing a run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The target did not answer its health check before measurement started.
    #[error("target {target} is unreachable: {reason}")]
    Connectivity { target: String, reason: String },

    /// A timed call returned a non-success response or failed in transport.
    #[error("{operation} failed for key {key}: {reason}")]
    OperationFailure {
        operation: OperationKind,
        key: String,
        reason: String,
    },

    #[error("run aborted before the pairing completed")]
    Aborted,

    #[error("cannot aggregate an empty sample sequence")]
    EmptySample,

    /// Mean latency was exactly zero, so ops/sec has no finite value.
    #[error("throughput is undefined for a zero mean latency")]
    DivisionUndefined,

    #[error("sample value {0} is not a finite, non-negative duration")]
    InvalidSample(f64),

    #[error("results document {path} is unusable: {reason}")]
    MissingInput { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write results to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Errors that should stop the whole run rather than a single pairing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::Connectivity { .. }
                | BenchError::Aborted
                | BenchError::MissingInput { .. }
                | BenchError::InvalidConfig(_)
                | BenchError::Persist { .. }
        )
    }

    /// The operation a failed call was issuing, if the error came from one.
    pub fn operation(&self) -> Option<OperationKind> {
        match self {
            BenchError::OperationFailure { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
