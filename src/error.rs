use std::path::PathBuf;

use thiserror::Error;

use crate::grid::color::ColorParseError;

pub type GridResult<T> = Result<T, GridError>;

/// Why a single fetch for a slot did not produce an artifact.
/// Always absorbed into the slot's failure counter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot index {index} out of range (slot count {len})")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Color(#[from] ColorParseError),
    #[error("refresh interval must be a positive number of seconds up to one day, got {0}")]
    InvalidInterval(f64),
    #[error("grid size {rows}x{cols} exceeds the {max}x{max} limit")]
    InvalidGridSize { rows: u32, cols: u32, max: u32 },
    #[error("failure threshold must be at least 1")]
    InvalidFailureThreshold,
}

impl GridError {
    pub fn as_slot(&self) -> Option<&SlotError> {
        match self {
            GridError::Slot(err) => Some(err),
            _ => None,
        }
    }
}
