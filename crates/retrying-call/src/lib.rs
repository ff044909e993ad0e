//! Retry an asynchronous operation with backoff and a failure policy
//!
//! A `RetryingCall` binds a fallible async operation to its arguments and
//! keeps invoking it until it succeeds, the failure policy stops it, or the
//! backoff source runs out of delays. Every failure is recorded in order and
//! stays observable through the session, whatever the outcome.
//!
//! # Features
//!
//! - Any `Iterator<Item = Duration>` as the backoff source, with
//!   `SimpleBackoff` as a configurable bounded generator
//! - Pluggable growth rules: multiply, add, constant or a closure
//! - Failure policies that retry, stop, replace the error, or fail themselves
//! - Exhaustion surfaces the *first* failure, not the last
//! - Observable attempts via the `RetryObserver` trait, with a built-in
//!   `TracingObserver`
//! - Run inline with `run()` or spawn with `start()` and await or abort the
//!   returned `RetryHandle`
//! - YAML backoff configuration through `config::RetryConfig`
//!
//! # Example
//!
//! ```rust,no_run
//! use retrying_call::backoff::SimpleBackoff;
//! use retrying_call::{RetryError, RetryingCall};
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let backoff = SimpleBackoff::builder()
//!         .with_max_attempts(5)
//!         .with_max_delay(Duration::from_secs(30))
//!         .build()
//!         .expect("valid backoff");
//!
//!     RetryingCall::from_fn(|| async {
//!         // Your fallible operation here
//!         Ok("success".to_string())
//!     })
//!     .with_backoff(backoff)
//!     .run()
//!     .await
//! }
//! ```

pub mod backoff;
mod call;
pub mod config;
mod error;
mod failure;
mod handle;
mod observer;
mod policy;
mod session;

pub use backoff::{SimpleBackoff, SimpleBackoffBuilder};
pub use call::RetryingCall;
pub use config::{BackoffConfig, GrowthConfig, RetryConfig};
pub use error::{ConfigError, RetryError};
pub use failure::Failure;
pub use handle::RetryHandle;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use policy::{
    policy_fn, retry_if, AlwaysRetry, FailurePolicy, NeverRetry, PolicyFn, RetryIf, Verdict,
};
pub use session::{Session, SessionState};
