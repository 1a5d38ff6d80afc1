//! Store errors

use mpat_protocol::{Classify, ErrorKind};

/// Errors from store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// ClickHouse client error (typed reads and inserts)
    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    /// HTTP transport error (native streams)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// DSN could not be parsed
    #[error("invalid DSN '{dsn}': {reason}")]
    InvalidDsn { dsn: String, reason: String },

    /// Table does not exist
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Row could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// Timeout or dropped connection reported by the store itself
    #[error("transient failure: {0}")]
    Transient(String),
}

impl StoreError {
    /// Strip the query text ClickHouse echoes back so errors stay on one line
    pub(crate) fn status(status: u16, body: &str) -> Self {
        let body = body.lines().next().unwrap_or_default().trim();
        Self::Status {
            status,
            body: body.to_string(),
        }
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ClickHouse(e) => classify_clickhouse(e),
            Self::Http(e) => classify_http(e),
            Self::Status { status, .. } => {
                if *status >= 500 || *status == 429 {
                    ErrorKind::TransientNetwork
                } else {
                    ErrorKind::Parse
                }
            }
            Self::InvalidDsn { .. } => ErrorKind::Other,
            Self::TableNotFound(_) => ErrorKind::Other,
            Self::Codec(_) => ErrorKind::Parse,
            Self::Transient(_) => ErrorKind::TransientNetwork,
        }
    }
}

fn classify_http(e: &reqwest::Error) -> ErrorKind {
    if e.is_connect() {
        ErrorKind::StoreUnavailable
    } else if e.is_timeout() || e.is_request() || e.is_body() {
        ErrorKind::TransientNetwork
    } else if let Some(status) = e.status() {
        if status.is_server_error() || status.as_u16() == 429 {
            ErrorKind::TransientNetwork
        } else {
            ErrorKind::Parse
        }
    } else {
        ErrorKind::Other
    }
}

fn classify_clickhouse(e: &clickhouse::error::Error) -> ErrorKind {
    use clickhouse::error::Error;

    match e {
        Error::Network(_) | Error::TimedOut => ErrorKind::TransientNetwork,
        Error::BadResponse(body) if is_server_overload(body) => ErrorKind::TransientNetwork,
        _ => ErrorKind::Parse,
    }
}

/// ClickHouse exception codes that clear up on their own
/// (TOO_MANY_SIMULTANEOUS_QUERIES, MEMORY_LIMIT_EXCEEDED, SOCKET_TIMEOUT)
fn is_server_overload(body: &str) -> bool {
    ["Code: 202.", "Code: 241.", "Code: 209."]
        .iter()
        .any(|code| body.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            StoreError::status(503, "busy").kind(),
            ErrorKind::TransientNetwork
        );
        assert_eq!(
            StoreError::status(429, "slow down").kind(),
            ErrorKind::TransientNetwork
        );
        assert_eq!(
            StoreError::status(400, "Code: 62. DB::Exception: Syntax error").kind(),
            ErrorKind::Parse
        );
    }

    #[test]
    fn test_status_body_is_single_line() {
        let err = StoreError::status(500, "Code: 241. Memory limit\nquery: SELECT ...\n");
        assert_eq!(err.to_string(), "store returned HTTP 500: Code: 241. Memory limit");
    }

    #[test]
    fn test_other_kinds() {
        assert!(StoreError::Transient("reset".into()).is_retryable());
        assert!(!StoreError::Codec("bad row".into()).is_retryable());
        assert_eq!(StoreError::TableNotFound("t".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_server_overload_codes() {
        assert!(is_server_overload("Code: 202. DB::Exception: Too many simultaneous queries"));
        assert!(!is_server_overload("Code: 60. DB::Exception: Table does not exist"));
    }
}
