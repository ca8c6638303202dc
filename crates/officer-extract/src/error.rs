//! Error taxonomy for loading, extracting and persisting catalog data.
//!
//! Whether an error is fatal depends on the stage that hit it: the same
//! `Timeout` aborts list discovery but only skips one entity during
//! enrichment. The enum itself carries no policy.

use std::path::PathBuf;

/// All errors surfaced by the extraction pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("timed out after {after_ms}ms waiting for {url}")]
    Timeout { url: String, after_ms: u64 },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid locator {locator}: {message}")]
    Locator { locator: String, message: String },

    #[error("failed to read stub file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode dataset: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the network-level classes: transport, HTTP status and timeout.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Http { .. } | Self::Timeout { .. }
        )
    }

    /// Short machine-readable kind, used in skip reports and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Http { .. } => "http",
            Self::Timeout { .. } => "timeout",
            Self::Browser(_) => "browser",
            Self::Locator { .. } => "locator",
            Self::Decode { .. } => "decode",
            Self::Encode(_) => "encode",
            Self::Io { .. } => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_classes() {
        let timeout = ExtractError::Timeout {
            url: "https://example.com".into(),
            after_ms: 10,
        };
        let http = ExtractError::Http {
            url: "https://example.com".into(),
            status: 503,
        };
        let io = ExtractError::io("/tmp/x", std::io::Error::other("disk full"));

        assert!(timeout.is_fetch_failure());
        assert!(http.is_fetch_failure());
        assert!(!io.is_fetch_failure());
        assert_eq!(timeout.kind(), "timeout");
        assert_eq!(http.to_string(), "HTTP 503 for https://example.com");
    }
}
