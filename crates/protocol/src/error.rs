//! Error categories
//!
//! Every error type in MPAT maps onto one of these kinds. The pipeline runtime
//! only looks at the kind to decide between retrying, failing, or unwinding
//! silently.

use std::fmt;

/// Error category shared across crates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Timeout, connection reset, 5xx - retryable
    TransientNetwork,
    /// Store could not be reached - retryable at stage granularity
    StoreUnavailable,
    /// Destination table does not have the expected columns
    TableShapeMismatch,
    /// Table name is neither `results` nor `routes`
    UnknownTableType,
    /// Converter subprocess wrote to stderr or exited non-zero
    ConverterFailure,
    /// Malformed record or rejected query
    Parse,
    /// Operation was cancelled
    Cancelled,
    /// Anything else (I/O, configuration)
    Other,
}

impl ErrorKind {
    /// Whether a stage may retry an operation that failed with this kind
    #[inline]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetwork | Self::StoreUnavailable)
    }

    /// Get the string name of this kind
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::StoreUnavailable => "store_unavailable",
            Self::TableShapeMismatch => "table_shape_mismatch",
            Self::UnknownTableType => "unknown_table_type",
            Self::ConverterFailure => "converter_failure",
            Self::Parse => "parse_error",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an error value onto an [`ErrorKind`]
pub trait Classify {
    /// The category of this error
    fn kind(&self) -> ErrorKind;

    /// Shorthand for `self.kind().is_retryable()`
    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::TransientNetwork.is_retryable());
        assert!(ErrorKind::StoreUnavailable.is_retryable());
        assert!(!ErrorKind::Parse.is_retryable());
        assert!(!ErrorKind::ConverterFailure.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::TableShapeMismatch.is_retryable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::UnknownTableType.to_string(), "unknown_table_type");
        assert_eq!(ErrorKind::Parse.to_string(), "parse_error");
    }
}
