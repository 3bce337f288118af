//! Error types shared by the indexer and the query surface

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading transcripts or loading/persisting the index.
///
/// Most of these are recovered locally by the indexer: a malformed record is
/// skipped, an unavailable transcript becomes an empty delta, and a corrupt
/// index triggers a rebuild.
#[derive(Debug, Error)]
pub enum RecallError {
    #[error("transcript unavailable at {path}: {source}")]
    TranscriptUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("corrupt index at {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A time expression that none of the grammars accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse time '{expression}': {reason}")]
pub struct TimeParseError {
    pub expression: String,
    pub reason: String,
}

impl TimeParseError {
    pub fn new(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the textual query surface (`last<N>`, `around`, `search`).
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),
}

pub type Result<T> = std::result::Result<T, RecallError>;
