//! Errors reported by the command-line tool.

use std::path::PathBuf;

use domain::{ClubbingError, MergeError, TotalsError};
use thiserror::Error;

/// Errors that end a command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum CliError {
    /// An input file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An input file is not valid JSON for the expected shape.
    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The cart could not be planned.
    #[error(transparent)]
    Clubbing(#[from] ClubbingError),

    /// The totals could not be computed.
    #[error(transparent)]
    Totals(#[from] TotalsError),

    /// The amendment could not be merged.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The result could not be encoded.
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
