//! Ingestion error types

use std::io;

use mpat_protocol::{Classify, ErrorKind};

/// Warts ingestion errors
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// HTTP request failed before a response arrived
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid cycle date
    #[error("invalid date '{0}': expected YYYY-MM-DD or YYYYMMDD")]
    InvalidDate(String),

    /// Local file could not be opened
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Converter could not be started
    #[error("failed to start converter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Corrupt or truncated gzip stream
    #[error("failed to decompress {source_name}: {source}")]
    Decompress {
        source_name: String,
        #[source]
        source: io::Error,
    },

    /// Converter wrote to stderr or exited non-zero
    #[error("converter failed on {source_name}: {message}")]
    Converter { source_name: String, message: String },

    /// Malformed converter output line
    #[error("malformed record at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Too many malformed lines
    #[error("{count} malformed records exceed the limit of {limit}")]
    TooManyParseErrors { count: u64, limit: u64 },

    /// I/O error on converter pipes
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IngestError {
    pub(crate) fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }
}

impl Classify for IngestError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { source, .. } => {
                if source.is_timeout() || source.is_connect() {
                    ErrorKind::TransientNetwork
                } else if let Some(status) = source.status() {
                    status_kind(status.as_u16())
                } else {
                    ErrorKind::Other
                }
            }
            Self::Status { status, .. } => status_kind(*status),
            Self::Spawn { .. } | Self::Converter { .. } => ErrorKind::ConverterFailure,
            Self::Decompress { .. } | Self::Parse { .. } | Self::TooManyParseErrors { .. } => {
                ErrorKind::Parse
            }
            Self::Url(_) | Self::InvalidDate(_) | Self::Open { .. } | Self::Io(_) => ErrorKind::Other,
        }
    }
}

fn status_kind(status: u16) -> ErrorKind {
    if status >= 500 || status == 429 {
        ErrorKind::TransientNetwork
    } else {
        ErrorKind::Other
    }
}

/// Result type for ingestion
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = IngestError::Status {
            url: "https://example.org/a.gz".into(),
            status: 503,
        };
        assert!(err.is_retryable());

        let err = IngestError::Status {
            url: "https://example.org/a.gz".into(),
            status: 404,
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "https://example.org/a.gz returned HTTP 404");
    }

    #[test]
    fn test_converter_and_parse_kinds() {
        let err = IngestError::Converter {
            source_name: "a.warts.gz".into(),
            message: "bad magic".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ConverterFailure);

        let err = IngestError::Parse {
            line: 3,
            message: "expected value".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(!err.is_retryable());
    }
}
