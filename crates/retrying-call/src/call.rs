//! The retry controller
//!
//! `RetryingCall` binds an operation to its arguments and drives the session
//! state machine: wait for the next backoff delay, invoke the operation, and
//! on failure ask the policy whether to go round again. The session resolves
//! exactly once, with the operation's value or a single `RetryError`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;

use crate::backoff::SimpleBackoff;
use crate::error::RetryError;
use crate::failure::Failure;
use crate::handle::RetryHandle;
use crate::observer::{RetryObserver, TracingObserver};
use crate::policy::{AlwaysRetry, FailurePolicy, Verdict};
use crate::session::{Session, SessionState};

/// A retrying invocation of one operation
///
/// The operation receives a clone of `args` on every attempt, so tuples
/// stand in for positional arguments and structs for named ones. Defaults:
/// a `SimpleBackoff` with default settings, the `AlwaysRetry` policy and a
/// `TracingObserver`.
///
/// # Example
///
/// ```rust,no_run
/// use retrying_call::{retry_if, RetryingCall};
/// use std::io;
///
/// async fn fetch(host: String, port: u16) -> io::Result<Vec<u8>> {
///     // Your fallible operation here
///     Ok(Vec::new())
/// }
///
/// # async fn example() {
/// let handle = RetryingCall::new(
///     |(host, port): (String, u16)| fetch(host, port),
///     ("example.org".to_string(), 443),
/// )
/// .with_policy(retry_if(|err: &io::Error| err.kind() == io::ErrorKind::TimedOut))
/// .start();
///
/// let failures = handle.session();
/// match handle.await {
///     Ok(body) => println!("{} bytes after {} failures", body.len(), failures.failure_count()),
///     Err(err) => eprintln!("giving up: {}", err),
/// }
/// # }
/// ```
pub struct RetryingCall<F, A, E, B = SimpleBackoff, P = AlwaysRetry, O = TracingObserver> {
    func: F,
    args: A,
    backoff: B,
    policy: P,
    observer: O,
    session: Session<E>,
}

impl<F, E> RetryingCall<F, (), E> {
    /// Create a retrying call for an operation that takes no arguments
    pub fn from_fn<Fut, T>(func: F) -> RetryingCall<impl FnMut(()) -> Fut, (), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut func = func;
        RetryingCall::new(move |()| func(), ())
    }
}

impl<F, A, E> RetryingCall<F, A, E> {
    /// Create a retrying call that invokes `func(args.clone())` per attempt
    pub fn new<Fut, T>(func: F, args: A) -> Self
    where
        F: FnMut(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
    {
        Self {
            func,
            args,
            backoff: SimpleBackoff::default(),
            policy: AlwaysRetry,
            observer: TracingObserver::default(),
            session: Session::new(),
        }
    }
}

impl<F, A, E, B, P, O> RetryingCall<F, A, E, B, P, O> {
    /// Replace the backoff source
    ///
    /// Anything that iterates over `Duration`s works: a configured
    /// `SimpleBackoff`, a literal `vec![..]`, an unbounded iterator. The
    /// session gives up when the source returns `None`.
    pub fn with_backoff<I>(self, backoff: I) -> RetryingCall<F, A, E, I::IntoIter, P, O>
    where
        I: IntoIterator<Item = Duration>,
    {
        RetryingCall {
            func: self.func,
            args: self.args,
            backoff: backoff.into_iter(),
            policy: self.policy,
            observer: self.observer,
            session: self.session,
        }
    }

    /// Replace the failure policy
    pub fn with_policy<P2>(self, policy: P2) -> RetryingCall<F, A, E, B, P2, O>
    where
        P2: FailurePolicy<E>,
    {
        RetryingCall {
            func: self.func,
            args: self.args,
            backoff: self.backoff,
            policy,
            observer: self.observer,
            session: self.session,
        }
    }

    /// Replace the observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryingCall<F, A, E, B, P, O2>
    where
        O2: RetryObserver,
    {
        RetryingCall {
            func: self.func,
            args: self.args,
            backoff: self.backoff,
            policy: self.policy,
            observer,
            session: self.session,
        }
    }

    /// The arguments passed to every attempt
    pub fn args(&self) -> &A {
        &self.args
    }

    /// A read-only view of the session, valid before, during and after the run
    pub fn session(&self) -> Session<E> {
        self.session.clone()
    }

    /// A snapshot of the failures recorded so far
    pub fn failures(&self) -> Vec<Failure<E>> {
        self.session.failures()
    }
}

impl<F, A, E, B, P, O> RetryingCall<F, A, E, B, P, O>
where
    A: Clone,
    E: Display,
    B: Iterator<Item = Duration>,
    P: FailurePolicy<E>,
    O: RetryObserver,
{
    /// Drive the session to resolution on the current task
    pub async fn run<Fut, T>(mut self) -> Result<T, RetryError<E>>
    where
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();

        loop {
            self.enter(SessionState::Waiting)?;

            let Some(delay) = self.backoff.next() else {
                return self.exhausted(start);
            };
            // Always yield, even with no delay, so other tasks get to run
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }

            self.enter(SessionState::Calling)?;
            let attempt = self.session.begin_attempt();
            self.observer.on_attempt_start(attempt, delay);

            let error = match (self.func)(self.args.clone()).await {
                Ok(value) => {
                    self.enter(SessionState::Resolved)?;
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(error) => error,
            };

            self.enter(SessionState::EvaluatingFailure)?;
            let failure = Failure::new(attempt, delay, start.elapsed(), error);
            self.session.record(failure.clone());

            match self.policy.evaluate(&failure) {
                Ok(Verdict::Retry) => {
                    self.observer.on_attempt_failed(attempt, &failure);
                }
                Ok(Verdict::Stop) => {
                    self.enter(SessionState::Resolved)?;
                    self.observer.on_stopped(attempt, &failure);
                    return Err(RetryError::Stopped(failure));
                }
                Ok(Verdict::StopWith(replacement)) => {
                    self.enter(SessionState::Resolved)?;
                    let failure = failure.with_error(replacement);
                    self.observer.on_stopped(attempt, &failure);
                    return Err(RetryError::Stopped(failure));
                }
                Err(source) => {
                    self.enter(SessionState::Resolved)?;
                    self.observer.on_stopped(attempt, &source);
                    return Err(RetryError::PolicyFailed { failure, source });
                }
            }
        }
    }

    fn enter(&self, next: SessionState) -> Result<(), RetryError<E>> {
        if self.session.advance(next) {
            return Ok(());
        }
        let attempts = self.session.attempts();
        self.observer.on_cancelled(attempts);
        Err(RetryError::Cancelled { attempts })
    }

    fn exhausted<T>(&self, start: Instant) -> Result<T, RetryError<E>> {
        self.enter(SessionState::Resolved)?;

        let attempts = self.session.attempts();
        match self.session.first_failure() {
            Some(first) => {
                self.observer.on_exhausted(attempts, Some(&first));
                Err(RetryError::Exhausted {
                    attempts,
                    first,
                    total_duration: start.elapsed(),
                })
            }
            None => {
                self.observer.on_exhausted(attempts, None);
                Err(RetryError::EmptyBackoff)
            }
        }
    }
}

impl<F, A, E, B, P, O> RetryingCall<F, A, E, B, P, O>
where
    A: Clone + Send + 'static,
    E: Display + Send + Sync + 'static,
    B: Iterator<Item = Duration> + Send + 'static,
    P: FailurePolicy<E> + 'static,
    O: RetryObserver + 'static,
{
    /// Spawn the session onto the tokio runtime and return its handle
    ///
    /// Returns immediately; the first attempt happens on the spawned task.
    /// Must be called from within a tokio runtime.
    pub fn start<Fut, T>(self) -> RetryHandle<T, E>
    where
        F: FnMut(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        let session = self.session.clone();
        let span = tracing::debug_span!("retrying_call");
        let join = tokio::spawn(self.run().instrument(span));
        RetryHandle::new(join, session)
    }
}
