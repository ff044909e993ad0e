//! Failure records
//!
//! A `Failure` captures one failed attempt: the error the operation returned
//! plus enough context to re-surface it later. The error is reference counted
//! so the same record can sit in the session history and be handed back to
//! the caller without requiring `E: Clone`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One failed attempt of a retried operation
pub struct Failure<E> {
    attempt: u32,
    delay: Duration,
    elapsed: Duration,
    error: Arc<E>,
}

impl<E> Failure<E> {
    /// Create a failure record
    ///
    /// * `attempt` - The attempt number that failed (1-indexed)
    /// * `delay` - The backoff delay waited before this attempt
    /// * `elapsed` - Time since the session started, taken when the failure was seen
    /// * `error` - The error returned by the operation
    pub fn new(attempt: u32, delay: Duration, elapsed: Duration, error: E) -> Self {
        Self {
            attempt,
            delay,
            elapsed,
            error: Arc::new(error),
        }
    }

    /// The attempt number that failed (1-indexed)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The backoff delay waited before the failed attempt
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time since the session started when the failure was recorded
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The error returned by the operation
    pub fn error(&self) -> &E {
        &self.error
    }

    /// A shared handle to the error
    pub fn shared_error(&self) -> Arc<E> {
        Arc::clone(&self.error)
    }

    /// Take the error out of the record
    ///
    /// Returns the record unchanged if other clones still share the error.
    pub fn into_error(self) -> Result<E, Self> {
        let Failure {
            attempt,
            delay,
            elapsed,
            error,
        } = self;
        Arc::try_unwrap(error).map_err(|error| Failure {
            attempt,
            delay,
            elapsed,
            error,
        })
    }

    /// A record for the same attempt carrying a different error
    pub fn with_error(&self, error: E) -> Self {
        Self::new(self.attempt, self.delay, self.elapsed, error)
    }
}

impl<E> Clone for Failure<E> {
    fn clone(&self) -> Self {
        Self {
            attempt: self.attempt,
            delay: self.delay,
            elapsed: self.elapsed,
            error: Arc::clone(&self.error),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("attempt", &self.attempt)
            .field("delay", &self.delay)
            .field("elapsed", &self.elapsed)
            .field("error", &self.error)
            .finish()
    }
}

impl<E: fmt::Display> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {}: {}", self.attempt, self.error)
    }
}
