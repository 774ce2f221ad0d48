//! Error taxonomy for the disambiguation stage.
//!
//! Only configuration problems ever reach the caller. Oracle errors are
//! recovered inside the adapter and turned into non-votes; the classification
//! here exists so logs can tell infrastructure failures apart from each other.
//!
//! | Variant       | Transient | Meaning                                   |
//! |---------------|-----------|-------------------------------------------|
//! | `Request`     | yes       | connection / transport failure            |
//! | `Status`      | 5xx only  | non-success HTTP status from the backend  |
//! | `RateLimited` | yes       | backend asked us to slow down (429)       |
//! | `Timeout`     | yes       | attempt exceeded `attempt_timeout_secs`   |
//! | `Parse`       | no        | response did not match the output schema  |
//! | `Cancelled`   | no        | attempt dropped by stage cancellation     |

use std::fmt;

use thiserror::Error;

/// Failure of a single oracle call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// Transport failure (DNS, connect, reset, body read).
    #[error("Oracle request failed: {0}")]
    Request(String),

    /// Backend answered with a non-success status.
    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend rate limit.
    #[error("Oracle rate limited: {0}")]
    RateLimited(String),

    /// The attempt did not complete within the configured timeout.
    #[error("Oracle attempt timed out after {0}s")]
    Timeout(u64),

    /// Response body could not be decoded into the structured output.
    #[error("Oracle response parse failure: {0}")]
    Parse(String),

    /// The attempt was cancelled before it completed.
    #[error("Oracle attempt cancelled")]
    Cancelled,
}

/// Coarse classification used in structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl OracleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Request(_) | Self::RateLimited(_) | Self::Timeout(_) => FailureKind::Transient,
            Self::Status { status, .. } if *status >= 500 => FailureKind::Transient,
            Self::Status { .. } | Self::Parse(_) => FailureKind::Permanent,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Returns `true` for network / backend faults that a later call may not hit.
    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Map a reqwest error onto the taxonomy.
    pub fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_secs)
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Invalid stage configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        let err = OracleError::Timeout(30);
        assert!(err.is_transient());
        assert_eq!(err.kind(), FailureKind::Transient);
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = OracleError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        let client = OracleError::Status {
            status: 400,
            body: "bad schema".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn parse_failure_is_permanent() {
        let err = OracleError::Parse("expected object".into());
        assert_eq!(err.kind(), FailureKind::Permanent);
    }

    #[test]
    fn cancelled_has_its_own_kind() {
        assert_eq!(OracleError::Cancelled.kind(), FailureKind::Cancelled);
        assert_eq!(OracleError::Cancelled.kind().to_string(), "cancelled");
    }
}
