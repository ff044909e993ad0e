//! Failure policies
//!
//! After every failed attempt the controller hands the failure to a
//! `FailurePolicy`, which either lets the session retry or stops it. A policy
//! that returns an error stops the session too, surfacing that error.

use crate::failure::Failure;

/// The decision a failure policy makes about one failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<E> {
    /// No objection; try again after the next backoff delay
    Retry,
    /// Stop and surface the failure as-is
    Stop,
    /// Stop and surface this error in place of the original one
    StopWith(E),
}

impl<E> Verdict<E> {
    /// Check if the verdict lets the session continue
    pub fn is_retry(&self) -> bool {
        matches!(self, Verdict::Retry)
    }
}

/// Decides whether a failed attempt may be retried
///
/// Returning `Err` means the policy itself failed; the session resolves with
/// `RetryError::PolicyFailed` and no further attempts are made.
///
/// # Example
///
/// ```rust
/// use retrying_call::{Failure, FailurePolicy, Verdict};
/// use std::io::{Error, ErrorKind};
///
/// struct TransientIo;
///
/// impl FailurePolicy<Error> for TransientIo {
///     fn evaluate(&mut self, failure: &Failure<Error>) -> anyhow::Result<Verdict<Error>> {
///         match failure.error().kind() {
///             ErrorKind::TimedOut | ErrorKind::Interrupted => Ok(Verdict::Retry),
///             _ => Ok(Verdict::Stop),
///         }
///     }
/// }
/// ```
pub trait FailurePolicy<E>: Send {
    /// Evaluate one failure
    fn evaluate(&mut self, failure: &Failure<E>) -> anyhow::Result<Verdict<E>>;
}

impl<E, P> FailurePolicy<E> for Box<P>
where
    P: FailurePolicy<E> + ?Sized,
{
    fn evaluate(&mut self, failure: &Failure<E>) -> anyhow::Result<Verdict<E>> {
        (**self).evaluate(failure)
    }
}

/// A policy that retries every failure
///
/// Retries are then bounded only by the backoff source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E> FailurePolicy<E> for AlwaysRetry {
    fn evaluate(&mut self, _failure: &Failure<E>) -> anyhow::Result<Verdict<E>> {
        Ok(Verdict::Retry)
    }
}

/// A policy that stops on the first failure
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E> FailurePolicy<E> for NeverRetry {
    fn evaluate(&mut self, _failure: &Failure<E>) -> anyhow::Result<Verdict<E>> {
        Ok(Verdict::Stop)
    }
}

/// Retry only the errors a predicate accepts; stop on everything else
pub struct RetryIf<F> {
    predicate: F,
}

impl<F> RetryIf<F> {
    /// Create a new predicate-based policy
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> FailurePolicy<E> for RetryIf<F>
where
    F: FnMut(&E) -> bool + Send,
{
    fn evaluate(&mut self, failure: &Failure<E>) -> anyhow::Result<Verdict<E>> {
        if (self.predicate)(failure.error()) {
            Ok(Verdict::Retry)
        } else {
            Ok(Verdict::Stop)
        }
    }
}

/// A policy backed by a closure over the whole failure record
pub struct PolicyFn<F> {
    evaluate: F,
}

impl<F> PolicyFn<F> {
    /// Create a new closure-based policy
    pub fn new(evaluate: F) -> Self {
        Self { evaluate }
    }
}

impl<E, F> FailurePolicy<E> for PolicyFn<F>
where
    F: FnMut(&Failure<E>) -> anyhow::Result<Verdict<E>> + Send,
{
    fn evaluate(&mut self, failure: &Failure<E>) -> anyhow::Result<Verdict<E>> {
        (self.evaluate)(failure)
    }
}

/// Shorthand for `RetryIf::new`
pub fn retry_if<F>(predicate: F) -> RetryIf<F> {
    RetryIf::new(predicate)
}

/// Shorthand for `PolicyFn::new`
pub fn policy_fn<F>(evaluate: F) -> PolicyFn<F> {
    PolicyFn::new(evaluate)
}
