//! Error types for retry sessions and backoff configuration
//!
//! `RetryError` is the single failure a session resolves with. It is generic
//! over `E`, the error type of the operation being retried.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::failure::Failure;

/// The failure a retry session resolves with
#[derive(Debug)]
pub enum RetryError<E> {
    /// The backoff source ran out of delays before the operation succeeded
    ///
    /// Carries the *first* failure recorded in the session, not the most
    /// recent one, so the root cause stays visible.
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The first failure recorded in the session
        first: Failure<E>,
        /// Total time spent in the session
        total_duration: Duration,
    },

    /// The failure policy decided the failure must not be retried
    Stopped(Failure<E>),

    /// The failure policy itself failed while evaluating a failure
    PolicyFailed {
        /// The failure that was being evaluated
        failure: Failure<E>,
        /// The error raised by the policy
        source: anyhow::Error,
    },

    /// The backoff source produced no delay at all, so no attempt was made
    EmptyBackoff,

    /// The session was cancelled before it resolved
    Cancelled {
        /// Number of attempts started before cancellation
        attempts: u32,
    },

    /// The outcome was already returned by an earlier await of the handle
    Consumed {
        /// Number of attempts the session made
        attempts: u32,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                first,
                total_duration,
            } => write!(
                f,
                "retry exhausted after {} attempts over {:.2}s, first failure: {}",
                attempts,
                total_duration.as_secs_f64(),
                first.error()
            ),
            RetryError::Stopped(failure) => {
                write!(
                    f,
                    "retry stopped at attempt {}: {}",
                    failure.attempt(),
                    failure.error()
                )
            }
            RetryError::PolicyFailed { failure, source } => write!(
                f,
                "failure policy errored at attempt {}: {} (while evaluating: {})",
                failure.attempt(),
                source,
                failure.error()
            ),
            RetryError::EmptyBackoff => write!(f, "backoff source yielded no delays"),
            RetryError::Cancelled { attempts } => {
                write!(f, "retry cancelled after {} attempts", attempts)
            }
            RetryError::Consumed { attempts } => write!(
                f,
                "retry outcome already taken (session made {} attempts)",
                attempts
            ),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { first, .. } => Some(first.error()),
            RetryError::Stopped(failure) => Some(failure.error()),
            RetryError::PolicyFailed { source, .. } => Some(source.as_ref()),
            RetryError::EmptyBackoff
            | RetryError::Cancelled { .. }
            | RetryError::Consumed { .. } => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Get the number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Stopped(failure) => failure.attempt(),
            RetryError::PolicyFailed { failure, .. } => failure.attempt(),
            RetryError::EmptyBackoff => 0,
            RetryError::Cancelled { attempts } | RetryError::Consumed { attempts } => *attempts,
        }
    }

    /// Check if this error indicates the backoff source ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if the failure policy stopped the session
    pub fn is_stopped(&self) -> bool {
        matches!(self, RetryError::Stopped(_))
    }

    /// Check if the failure policy itself failed
    pub fn is_policy_failure(&self) -> bool {
        matches!(self, RetryError::PolicyFailed { .. })
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Check if the handle's outcome was already taken by an earlier await
    pub fn is_consumed(&self) -> bool {
        matches!(self, RetryError::Consumed { .. })
    }

    /// The failure record this error surfaces, if any
    pub fn failure(&self) -> Option<&Failure<E>> {
        match self {
            RetryError::Exhausted { first, .. } => Some(first),
            RetryError::Stopped(failure) => Some(failure),
            RetryError::PolicyFailed { failure, .. } => Some(failure),
            RetryError::EmptyBackoff
            | RetryError::Cancelled { .. }
            | RetryError::Consumed { .. } => None,
        }
    }

    /// The underlying operation error this error surfaces, if any
    pub fn error(&self) -> Option<&E> {
        self.failure().map(Failure::error)
    }

    /// Consume this error, returning the surfaced failure record
    pub fn into_failure(self) -> Option<Failure<E>> {
        match self {
            RetryError::Exhausted { first, .. } => Some(first),
            RetryError::Stopped(failure) => Some(failure),
            RetryError::PolicyFailed { failure, .. } => Some(failure),
            RetryError::EmptyBackoff
            | RetryError::Cancelled { .. }
            | RetryError::Consumed { .. } => None,
        }
    }
}

/// Errors raised while building a backoff generator or loading configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A generator must be allowed to yield at least one delay
    #[error("max-attempts must be greater than zero")]
    ZeroAttempts,

    /// A delay given in seconds is negative, NaN or infinite
    #[error("invalid {field}: {value} (expected a finite, non-negative number of seconds)")]
    InvalidDelay { field: &'static str, value: f64 },

    /// A growth factor is negative, NaN or infinite
    #[error("invalid growth factor: {0} (expected a finite, non-negative number)")]
    InvalidFactor(f64),

    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    NotFound { path: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn failure(attempt: u32, message: &str) -> Failure<io::Error> {
        Failure::new(
            attempt,
            Duration::ZERO,
            Duration::from_millis(5),
            io::Error::other(message.to_string()),
        )
    }

    #[test]
    fn test_exhausted_error() {
        let err = RetryError::Exhausted {
            attempts: 3,
            first: failure(1, "first"),
            total_duration: Duration::from_secs(5),
        };

        assert!(err.is_exhausted());
        assert!(!err.is_stopped());
        assert!(!err.is_cancelled());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.error().map(|e| e.to_string()), Some("first".into()));
    }

    #[test]
    fn test_stopped_error_reports_failure_attempt() {
        let err = RetryError::Stopped(failure(2, "fatal"));

        assert!(err.is_stopped());
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.into_failure().map(|f| f.attempt()), Some(2));
    }

    #[test]
    fn test_policy_failed_source_is_policy_error() {
        let err = RetryError::PolicyFailed {
            failure: failure(1, "boom"),
            source: anyhow::anyhow!("policy broke"),
        };

        assert!(err.is_policy_failure());
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("policy broke"));
    }

    #[test]
    fn test_errors_without_failure() {
        let empty: RetryError<io::Error> = RetryError::EmptyBackoff;
        assert_eq!(empty.attempts(), 0);
        assert!(empty.failure().is_none());
        assert!(empty.source().is_none());

        let cancelled: RetryError<io::Error> = RetryError::Cancelled { attempts: 4 };
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.attempts(), 4);
        assert!(cancelled.into_failure().is_none());

        let consumed: RetryError<io::Error> = RetryError::Consumed { attempts: 2 };
        assert!(consumed.is_consumed());
        assert_eq!(consumed.attempts(), 2);
        assert!(consumed.source().is_none());
        assert!(consumed.to_string().contains("already taken"));
    }

    #[test]
    fn test_display() {
        let err = RetryError::Exhausted {
            attempts: 3,
            first: failure(1, "connection timeout"),
            total_duration: Duration::from_secs(5),
        };

        let display = err.to_string();
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection timeout"));
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroAttempts.to_string(),
            "max-attempts must be greater than zero"
        );
        let err = ConfigError::InvalidDelay {
            field: "max-delay-secs",
            value: -1.0,
        };
        assert!(err.to_string().contains("max-delay-secs"));
    }
}
