//! Error types for building a process tree

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PsTreeError {
    #[error("Invalid header in 'ps' output: {0:?}")]
    Header(String),

    #[error("Invalid number of columns ({found} instead of {expected}): {line:?}")]
    RowShape {
        found: usize,
        expected: usize,
        line: String,
    },

    #[error("Metric {0:?} is not found or empty")]
    MissingField(String),

    #[error("Parsing metric {key} {value:?}: {reason}")]
    NumberFormat {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Parsing metric {key} {value:?}: negative value")]
    NegativeValue { key: String, value: String },

    #[error("Root process with pid {0} is not found")]
    RootNotFound(u32),

    /// The listing command could not be started or exited with a failure,
    /// carries the normalized diagnostic of the command
    #[error("{0}")]
    Execution(String),
}

pub type PsTreeResult<T> = Result<T, PsTreeError>;
