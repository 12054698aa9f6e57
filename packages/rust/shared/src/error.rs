//! Error types for omeka-harvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all harvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The API answered in a shape the pagination logic cannot use.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// A results page could not be fetched; fatal for the whole run.
    #[error("failed to fetch page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: Box<HarvestError>,
    },

    /// A supplementary file lookup failed for one item.
    #[error("file lookup for item {item_id} failed: {source}")]
    Lookup {
        item_id: u64,
        #[source]
        source: Box<HarvestError>,
    },

    /// Transport-level failure (connect, DNS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("{url}: HTTP {status}")]
    Http { status: u16, url: String },

    /// A request did not complete within the configured timeout.
    #[error("{url}: timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Caller-supplied input is invalid (query range, sort key, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a protocol error from any displayable message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the page number of the request that produced this error.
    pub fn for_page(self, page: u32) -> Self {
        Self::Fetch {
            page,
            source: Box::new(self),
        }
    }

    /// Attach the item id of the file lookup that produced this error.
    pub fn for_item(self, item_id: u64) -> Self {
        Self::Lookup {
            item_id,
            source: Box::new(self),
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Connection failures, timeouts, `429` and `5xx` responses are transient.
    /// Everything else (bad config, malformed bodies, `4xx`) is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Fetch { source, .. } | Self::Lookup { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
