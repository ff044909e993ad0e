//! Handle to a spawned retry session
//!
//! `RetryHandle` is the single-resolution result of `RetryingCall::start`:
//! await it (by value or through `&mut`) to get the outcome. If the session
//! already resolved, the first await completes straight away. The outcome is
//! handed out once; awaiting the same handle again yields
//! `RetryError::Consumed` instead of the outcome.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::task::JoinHandle;

use crate::error::RetryError;
use crate::failure::Failure;
use crate::session::{Session, SessionState};

/// The pending outcome of a spawned retry session
#[must_use = "dropping a RetryHandle detaches the session; await it or call abort()"]
pub struct RetryHandle<T, E> {
    join: Option<JoinHandle<Result<T, RetryError<E>>>>,
    session: Session<E>,
}

impl<T, E> RetryHandle<T, E> {
    pub(crate) fn new(join: JoinHandle<Result<T, RetryError<E>>>, session: Session<E>) -> Self {
        Self {
            join: Some(join),
            session,
        }
    }

    /// A read-only view of the session
    pub fn session(&self) -> Session<E> {
        self.session.clone()
    }

    /// The current session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.session.attempts()
    }

    /// A snapshot of the failures recorded so far, oldest first
    pub fn failures(&self) -> Vec<Failure<E>> {
        self.session.failures()
    }

    /// Check if the session reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// Check if an earlier await already took the outcome
    pub fn is_consumed(&self) -> bool {
        self.join.is_none()
    }

    /// Cancel the session
    ///
    /// Has no effect once the session resolved. Otherwise the session moves to
    /// `Cancelled`, no further attempt or policy evaluation happens, and
    /// awaiting the handle yields `RetryError::Cancelled`.
    pub fn abort(&self) {
        if self.session.cancel() {
            tracing::debug!(attempts = self.session.attempts(), "aborting retry session");
            if let Some(join) = &self.join {
                join.abort();
            }
        }
    }
}

impl<T, E> Future for RetryHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(join) = this.join.as_mut() else {
            return Poll::Ready(Err(RetryError::Consumed {
                attempts: this.session.attempts(),
            }));
        };

        let result = ready!(Pin::new(join).poll(cx));
        this.join = None;

        match result {
            Ok(outcome) => Poll::Ready(outcome),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                this.session.cancel();
                Poll::Ready(Err(RetryError::Cancelled {
                    attempts: this.session.attempts(),
                }))
            }
        }
    }
}

impl<T, E> std::fmt::Debug for RetryHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandle")
            .field("session", &self.session)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
