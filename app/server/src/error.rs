//! Error types for the search pipeline
//!
//! Each stage owns its own enum so callers can tell a bad form apart from a
//! dead service or an empty export.

use thiserror::Error;

/// Pre-flight rejection of an incomplete search form. No network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("seed phrase is required")]
    EmptySeed,

    #[error("select at least one network")]
    NoNetworkSelected,

    #[error("Bitcoin is selected: select at least one Bitcoin address type")]
    NoBtcTypeSelected,

    #[error("select at least one address chain (external/internal)")]
    NoChangeTypeSelected,

    #[error("invalid {field} range '{value}': expected N, N-M or N,M,...")]
    InvalidRange { field: &'static str, value: String },
}

/// Failure of a single search attempt. None of these are retried automatically.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request never completed (connect failure, timeout, reset).
    #[error("connection error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status. `message` is its `error` field verbatim.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The service answered 2xx but the body could not be decoded.
    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    #[error("a search is already in progress")]
    Busy,

    /// A newer search (or a reset) replaced this one before its response arrived.
    #[error("search {token} was superseded")]
    Superseded { token: u64 },
}

impl SearchError {
    /// Error kind as exposed to the UI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Service { .. } => "service",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Busy => "busy",
            Self::Superseded { .. } => "superseded",
        }
    }
}

/// A numeric field of one record that could not be parsed.
///
/// Only the affected cell degrades; the rest of the report is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("{field} of {address} is not a number: '{raw}'")]
pub struct FormatError {
    /// Redacted address of the offending record.
    pub address: String,
    pub field: &'static str,
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: {0}")]
    Empty(&'static str),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("failed to read credentials file {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
