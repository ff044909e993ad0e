//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait for monitoring a retry
//! session and a `TracingObserver` implementation that logs using the
//! `tracing` crate.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Observer trait for retry session events
///
/// Implement this trait to receive callbacks while a session runs. This is
/// useful for logging, metrics collection, or debugging.
///
/// # Example
///
/// ```rust
/// use retrying_call::RetryObserver;
/// use std::fmt::Display;
/// use std::time::Duration;
///
/// struct MetricsObserver {
///     // Your metrics client here
/// }
///
/// impl RetryObserver for MetricsObserver {
///     fn on_attempt_start(&self, attempt: u32, delay: Duration) {
///         // Record attempt start metric
///     }
///
///     fn on_attempt_failed(&self, attempt: u32, error: &dyn Display) {
///         // Record failure metric
///     }
///
///     fn on_success(&self, attempt: u32, total_duration: Duration) {
///         // Record success metric with latency
///     }
///
///     fn on_exhausted(&self, attempts: u32, first_error: Option<&dyn Display>) {
///         // Record exhaustion metric
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start, after its delay elapsed
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    /// * `delay` - The backoff delay that preceded the attempt
    fn on_attempt_start(&self, attempt: u32, delay: Duration);

    /// Called when an attempt fails and the policy allows another try
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display);

    /// Called when the operation succeeds
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number that succeeded (1-indexed)
    /// * `total_duration` - Total time spent in the session
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// Called when the backoff source runs out of delays
    ///
    /// # Arguments
    ///
    /// * `attempts` - Total number of attempts made
    /// * `first_error` - The first error recorded; `None` if nothing was attempted
    fn on_exhausted(&self, attempts: u32, first_error: Option<&dyn Display>);

    /// Called when the failure policy stops the session or itself fails
    fn on_stopped(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }

    /// Called when a session notices it has been cancelled
    fn on_cancelled(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _delay: Duration) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _first_error: Option<&dyn Display>) {}
}

/// An observer that logs session events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR
/// - `on_stopped`: WARN
/// - `on_cancelled`: DEBUG
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `operation` - A descriptive name for the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retrying-call")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, delay: Duration) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "ignoring failure, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, first_error: Option<&dyn Display>) {
        match first_error {
            Some(err) => tracing::error!(
                operation = %self.operation,
                attempts = attempts,
                error = %err,
                "ran out of attempts"
            ),
            None => tracing::error!(
                operation = %self.operation,
                "backoff source yielded no delays"
            ),
        }
    }

    fn on_stopped(&self, attempt: u32, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "retry stopped by failure policy"
        );
    }

    fn on_cancelled(&self, attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempts = attempts,
            "retry cancelled"
        );
    }
}

/// An observer that collects statistics about a session
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Attempt start events
    pub attempt_starts: AtomicU32,
    /// Retried failure events
    pub failures: AtomicU32,
    /// Success events
    pub successes: AtomicU32,
    /// Exhaustion events
    pub exhaustions: AtomicU32,
    /// Policy stop events
    pub stops: AtomicU32,
    /// Cancellation events
    pub cancellations: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Get the number of retried failures
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Get the number of exhaustions
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Get the number of policy stops
    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Get the number of cancellations
    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _delay: Duration) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _first_error: Option<&dyn Display>) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stopped(&self, _attempt: u32, _error: &dyn Display) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempts: u32) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, delay: Duration) {
        (**self).on_attempt_start(attempt, delay)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display) {
        (**self).on_attempt_failed(attempt, error)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, first_error: Option<&dyn Display>) {
        (**self).on_exhausted(attempts, first_error)
    }

    fn on_stopped(&self, attempt: u32, error: &dyn Display) {
        (**self).on_stopped(attempt, error)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, attempt: u32, delay: Duration) {
        (**self).on_attempt_start(attempt, delay)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display) {
        (**self).on_attempt_failed(attempt, error)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, first_error: Option<&dyn Display>) {
        (**self).on_exhausted(attempts, first_error)
    }

    fn on_stopped(&self, attempt: u32, error: &dyn Display) {
        (**self).on_stopped(attempt, error)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_observer() {
        let observer = NoOpObserver;
        let error = "test";

        observer.on_attempt_start(1, Duration::ZERO);
        observer.on_attempt_failed(1, &error);
        observer.on_success(2, Duration::from_millis(500));
        observer.on_exhausted(3, Some(&error));
        observer.on_stopped(2, &error);
        observer.on_cancelled(2);
    }

    #[test]
    fn test_stats_observer() {
        let observer = StatsObserver::new();
        let error = "test";

        observer.on_attempt_start(1, Duration::ZERO);
        observer.on_attempt_failed(1, &error);
        observer.on_attempt_start(2, Duration::from_millis(10));
        observer.on_success(2, Duration::from_millis(500));

        assert_eq!(observer.attempt_starts(), 2);
        assert_eq!(observer.failures(), 1);
        assert_eq!(observer.successes(), 1);
        assert_eq!(observer.exhaustions(), 0);
    }

    #[test]
    fn test_stats_observer_exhaustion_and_stop() {
        let observer = StatsObserver::new();
        let error = "test";

        observer.on_exhausted(3, Some(&error));
        observer.on_exhausted(0, None);
        observer.on_stopped(1, &error);
        observer.on_cancelled(1);

        assert_eq!(observer.exhaustions(), 2);
        assert_eq!(observer.stops(), 1);
        assert_eq!(observer.cancellations(), 1);
    }

    #[test]
    fn test_tracing_observer_creation() {
        let observer = TracingObserver::new("test_operation");
        assert_eq!(observer.operation(), "test_operation");

        let default_observer = TracingObserver::default();
        assert_eq!(default_observer.operation(), "retrying-call");
    }

    #[test]
    fn test_tracing_observer_logs_under_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let observer = TracingObserver::new("fetch");
        let error = "connection reset";
        observer.on_attempt_start(1, Duration::ZERO);
        observer.on_attempt_failed(1, &error);
        observer.on_success(2, Duration::from_millis(12));
        observer.on_exhausted(3, Some(&error));
        observer.on_exhausted(0, None);
        observer.on_stopped(1, &error);
        observer.on_cancelled(1);
    }

    #[test]
    fn test_arc_observer() {
        let observer = std::sync::Arc::new(StatsObserver::new());
        let error = "test";

        observer.on_attempt_start(1, Duration::ZERO);
        observer.on_attempt_failed(1, &error);

        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.failures(), 1);
    }
}
