//! Session state shared between a running retry and its observers
//!
//! The driving loop is the only writer: it advances the state machine and
//! appends failures. Everyone else gets a read-only `Session` view. Once a
//! session reaches a terminal state (`Resolved` or `Cancelled`) every further
//! transition is refused, which is what keeps a cancelled session from ever
//! resolving.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::failure::Failure;

/// Where a retry session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Constructed, not started
    Idle = 0,
    /// Waiting for the next backoff delay to elapse
    Waiting = 1,
    /// An attempt is in flight
    Calling = 2,
    /// The failure policy is evaluating a failure
    EvaluatingFailure = 3,
    /// Resolved with a success or a final failure
    Resolved = 4,
    /// Cancelled before resolution
    Cancelled = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Waiting,
            2 => SessionState::Calling,
            3 => SessionState::EvaluatingFailure,
            4 => SessionState::Resolved,
            _ => SessionState::Cancelled,
        }
    }

    /// Check if no further transitions can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Resolved | SessionState::Cancelled)
    }

    /// Check if the state machine allows moving from `self` to `next`
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Resolved | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Idle, Waiting) => true,
            (Waiting, Calling | Resolved) => true,
            (Calling, Resolved | EvaluatingFailure) => true,
            (EvaluatingFailure, Waiting | Resolved) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Waiting => "waiting",
            SessionState::Calling => "calling",
            SessionState::EvaluatingFailure => "evaluating-failure",
            SessionState::Resolved => "resolved",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

struct Shared<E> {
    state: AtomicU8,
    attempts: AtomicU32,
    failures: RwLock<Vec<Failure<E>>>,
}

/// Read-only view of a retry session
///
/// Cheap to clone; every clone observes the same session.
pub struct Session<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Session<E> {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(SessionState::Idle as u8),
                attempts: AtomicU32::new(0),
                failures: RwLock::new(Vec::new()),
            }),
        }
    }

    /// The current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// A snapshot of the failures recorded so far, oldest first
    pub fn failures(&self) -> Vec<Failure<E>> {
        self.shared
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of failures recorded so far
    pub fn failure_count(&self) -> usize {
        self.shared
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The first failure recorded, if any
    pub fn first_failure(&self) -> Option<Failure<E>> {
        self.shared
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    /// Check if the session has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Move to `next` if the state machine allows it
    ///
    /// Returns false if the transition is refused, which after a successful
    /// start only happens once the session has been cancelled.
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        self.shared
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                SessionState::from_u8(current)
                    .can_advance_to(next)
                    .then_some(next as u8)
            })
            .is_ok()
    }

    /// Mark the session cancelled unless it already finished
    pub(crate) fn cancel(&self) -> bool {
        self.advance(SessionState::Cancelled)
    }

    pub(crate) fn begin_attempt(&self) -> u32 {
        self.shared.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn record(&self, failure: Failure<E>) {
        self.shared
            .failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}

impl<E> Clone for Session<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("failures", &self.failure_count())
            .finish()
    }
}
