//! Backoff delay generation
//!
//! A backoff source is any iterator of `Duration`s: the controller asks it for
//! the next delay before every attempt and gives up when it returns `None`.
//! `SimpleBackoff` is the built-in generator; it yields a bounded sequence
//! that grows from an initial delay according to a `Growth` rule and is
//! clamped to a maximum.

use std::fmt;
use std::iter::FusedIterator;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Default number of delays a generator yields
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default ceiling for a single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(120);

/// Default first non-immediate delay
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(10);

/// Default growth factor between consecutive delays
pub const DEFAULT_FACTOR: f64 = 2.0;

/// Computes the next delay from the previous one
///
/// The previous delay passed in is the unclamped value; clamping to the
/// generator's maximum happens when a value is yielded.
///
/// # Example
///
/// ```rust
/// use retrying_call::backoff::Growth;
/// use std::time::Duration;
///
/// struct OneAndAHalf;
///
/// impl Growth for OneAndAHalf {
///     fn grow(&self, previous: Duration) -> Duration {
///         previous + previous / 2
///     }
/// }
/// ```
pub trait Growth: Send + Sync {
    /// Compute the delay that follows `previous`
    fn grow(&self, previous: Duration) -> Duration;
}

/// Multiply the previous delay by a constant factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multiply(pub f64);

impl Default for Multiply {
    fn default() -> Self {
        Multiply(DEFAULT_FACTOR)
    }
}

impl Growth for Multiply {
    fn grow(&self, previous: Duration) -> Duration {
        scale(previous, self.0)
    }
}

/// Add a constant step to the previous delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Add(pub Duration);

impl Growth for Add {
    fn grow(&self, previous: Duration) -> Duration {
        previous.saturating_add(self.0)
    }
}

/// Ignore the previous delay and always produce the same one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub Duration);

impl Growth for Constant {
    fn grow(&self, _previous: Duration) -> Duration {
        self.0
    }
}

/// A growth rule backed by a closure
pub struct GrowthFn<F> {
    grow: F,
}

impl<F> GrowthFn<F> {
    /// Create a new closure-based growth rule
    pub fn new(grow: F) -> Self {
        Self { grow }
    }
}

impl<F> Growth for GrowthFn<F>
where
    F: Fn(Duration) -> Duration + Send + Sync,
{
    fn grow(&self, previous: Duration) -> Duration {
        (self.grow)(previous)
    }
}

/// Scale a duration by a float factor, saturating instead of panicking
///
/// Negative or NaN results collapse to zero, overflow to `Duration::MAX`.
fn scale(delay: Duration, factor: f64) -> Duration {
    let nanos = delay.as_nanos() as f64 * factor;
    if nanos.is_nan() || nanos <= 0.0 {
        Duration::ZERO
    } else if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos.round() as u64)
    }
}

/// Convert float seconds into a delay, rejecting negative and non-finite input
pub(crate) fn secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDelay { field, value })
}

/// Build a literal backoff schedule from delays given in seconds
///
/// # Example
///
/// ```rust
/// use retrying_call::backoff::delays_from_secs;
/// use std::time::Duration;
///
/// let schedule = delays_from_secs([0.05, 0.06, 0.07]).unwrap();
/// assert_eq!(schedule[0], Duration::from_millis(50));
/// assert!(delays_from_secs([0.1, -1.0]).is_err());
/// ```
pub fn delays_from_secs<I>(delays: I) -> Result<Vec<Duration>, ConfigError>
where
    I: IntoIterator<Item = f64>,
{
    delays.into_iter().map(|d| secs("delay", d)).collect()
}

/// Bounded exponential (or custom) backoff generator
///
/// Yields exactly `max_attempts` delays and then `None` forever. With
/// `immediate` set (the default) the first delay is zero; the rest start at
/// `initial_delay` and follow the growth rule, each clamped to `max_delay`.
///
/// # Example
///
/// ```rust
/// use retrying_call::backoff::{Multiply, SimpleBackoff};
/// use std::time::Duration;
///
/// let delays: Vec<_> = SimpleBackoff::builder()
///     .with_max_attempts(5)
///     .with_immediate(false)
///     .with_initial_delay(Duration::from_secs(1))
///     .with_growth(Multiply(3.0))
///     .with_max_delay(Duration::from_secs(10))
///     .build()
///     .unwrap()
///     .collect();
///
/// let secs: Vec<u64> = delays.iter().map(Duration::as_secs).collect();
/// assert_eq!(secs, [1, 3, 9, 10, 10]);
/// ```
pub struct SimpleBackoff {
    remaining: u32,
    immediate_pending: bool,
    current: Duration,
    max_delay: Duration,
    growth: Box<dyn Growth>,
    jitter: bool,
}

impl SimpleBackoff {
    /// Start configuring a generator
    pub fn builder() -> SimpleBackoffBuilder {
        SimpleBackoffBuilder::new()
    }

    /// Number of delays still to be yielded
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        // Up to 25% extra, re-clamped so the ceiling still holds
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let extra = rand::rng().random_range(0..=nanos / 4);
        delay
            .saturating_add(Duration::from_nanos(extra))
            .min(self.max_delay)
    }
}

impl Default for SimpleBackoff {
    fn default() -> Self {
        SimpleBackoffBuilder::new().build_unchecked()
    }
}

impl Iterator for SimpleBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        if self.immediate_pending {
            self.immediate_pending = false;
            return Some(Duration::ZERO);
        }

        let delay = self.current.min(self.max_delay);
        self.current = self.growth.grow(self.current);
        Some(self.apply_jitter(delay))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SimpleBackoff {}

impl FusedIterator for SimpleBackoff {}

impl fmt::Debug for SimpleBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleBackoff")
            .field("remaining", &self.remaining)
            .field("immediate_pending", &self.immediate_pending)
            .field("current", &self.current)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

/// Builder for `SimpleBackoff`
///
/// Defaults: 10 attempts, 120s ceiling, immediate first attempt, 10ms
/// initial delay, doubling growth, no jitter.
pub struct SimpleBackoffBuilder {
    max_attempts: u32,
    max_delay: Duration,
    immediate: bool,
    initial_delay: Duration,
    growth: Box<dyn Growth>,
    jitter: bool,
}

impl Default for SimpleBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleBackoffBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: DEFAULT_MAX_DELAY,
            immediate: true,
            initial_delay: DEFAULT_INITIAL_DELAY,
            growth: Box::new(Multiply::default()),
            jitter: false,
        }
    }

    /// Set the total number of delays the generator yields
    ///
    /// Must be greater than zero; `build` rejects zero.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the ceiling for a single delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Yield a zero delay first, so the first attempt happens right away
    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Set the first non-immediate delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the growth rule
    pub fn with_growth(mut self, growth: impl Growth + 'static) -> Self {
        self.growth = Box::new(growth);
        self
    }

    /// Set the growth rule from a closure
    pub fn with_growth_fn<F>(self, grow: F) -> Self
    where
        F: Fn(Duration) -> Duration + Send + Sync + 'static,
    {
        self.with_growth(GrowthFn::new(grow))
    }

    /// Enable or disable jitter
    ///
    /// Jitter adds up to 25% random extra delay to every non-zero value.
    /// Disabled by default.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the generator
    pub fn build(self) -> Result<SimpleBackoff, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> SimpleBackoff {
        SimpleBackoff {
            remaining: self.max_attempts,
            immediate_pending: self.immediate,
            current: self.initial_delay,
            max_delay: self.max_delay,
            growth: self.growth,
            jitter: self.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_immediate() -> SimpleBackoffBuilder {
        SimpleBackoff::builder().with_immediate(false)
    }

    #[test]
    fn test_immediate_by_default() {
        let mut backoff = SimpleBackoff::default();
        assert_eq!(backoff.next(), Some(Duration::ZERO));
        assert_eq!(backoff.next(), Some(DEFAULT_INITIAL_DELAY));
    }

    #[test]
    fn test_not_immediate_starts_at_initial_delay() {
        let mut backoff = not_immediate().build().unwrap();
        let first = backoff.next().unwrap();

        assert_ne!(first, Duration::ZERO);
        assert_eq!(first, DEFAULT_INITIAL_DELAY);
    }

    #[test]
    fn test_initial_delay_is_first_value() {
        let mut backoff = not_immediate()
            .with_initial_delay(Duration::from_secs(7))
            .build()
            .unwrap();
        assert_eq!(backoff.next(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_default_yields_exactly_max_attempts() {
        let backoff = SimpleBackoff::default();
        assert_eq!(backoff.len(), DEFAULT_MAX_ATTEMPTS as usize);
        assert_eq!(backoff.count(), DEFAULT_MAX_ATTEMPTS as usize);
    }

    #[test]
    fn test_max_attempts_respected() {
        for n in 1..=12 {
            for immediate in [true, false] {
                let backoff = SimpleBackoff::builder()
                    .with_max_attempts(n)
                    .with_immediate(immediate)
                    .build()
                    .unwrap();
                assert_eq!(backoff.count(), n as usize);
            }
        }
    }

    #[test]
    fn test_exhaustion_is_permanent() {
        let mut backoff = not_immediate().with_max_attempts(2).build().unwrap();
        assert!(backoff.next().is_some());
        assert!(backoff.next().is_some());
        for _ in 0..5 {
            assert_eq!(backoff.next(), None);
        }
        assert_eq!(backoff.remaining(), 0);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = SimpleBackoff::builder().with_max_attempts(0).build();
        assert!(matches!(result, Err(ConfigError::ZeroAttempts)));
    }

    #[test]
    fn test_single_immediate_attempt() {
        let delays: Vec<_> = SimpleBackoff::builder()
            .with_max_attempts(1)
            .build()
            .unwrap()
            .collect();
        assert_eq!(delays, [Duration::ZERO]);
    }

    #[test]
    fn test_default_doubles_from_initial_delay() {
        let delays: Vec<_> = SimpleBackoff::default().collect();
        assert_eq!(delays[0], Duration::ZERO);
        assert_eq!(delays[1], Duration::from_millis(10));
        assert_eq!(delays[2], Duration::from_millis(20));
        assert_eq!(delays[3], Duration::from_millis(40));
        assert_eq!(delays[9], Duration::from_millis(2560));
    }

    #[test]
    fn test_no_value_is_negative_or_above_max_delay() {
        let max_delay = Duration::from_millis(300);
        let backoff = SimpleBackoff::builder()
            .with_max_attempts(50)
            .with_max_delay(max_delay)
            .build()
            .unwrap();
        for delay in backoff {
            assert!(delay >= Duration::ZERO);
            assert!(delay <= max_delay);
        }
    }

    #[test]
    fn test_multiply_by_three_is_clamped() {
        let delays: Vec<_> = not_immediate()
            .with_initial_delay(Duration::from_secs(1))
            .with_growth(Multiply(3.0))
            .with_max_delay(Duration::from_secs(10))
            .build()
            .unwrap()
            .take(5)
            .collect();

        assert_eq!(
            delays,
            [1, 3, 9, 10, 10].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_add_three() {
        let delays: Vec<_> = not_immediate()
            .with_initial_delay(Duration::from_secs(2))
            .with_growth(Add(Duration::from_secs(3)))
            .with_max_delay(Duration::from_secs(10))
            .build()
            .unwrap()
            .take(4)
            .collect();

        assert_eq!(delays, [2, 5, 8, 10].map(Duration::from_secs).to_vec());
    }

    #[test]
    fn test_constant_after_initial() {
        let n = 10;
        let mut backoff = not_immediate()
            .with_initial_delay(Duration::from_secs(3))
            .with_growth(Constant(Duration::from_secs(5)))
            .with_max_delay(Duration::from_secs(10))
            .with_max_attempts(n + 1)
            .build()
            .unwrap();

        assert_eq!(backoff.next(), Some(Duration::from_secs(3)));
        for _ in 0..n {
            assert_eq!(backoff.next(), Some(Duration::from_secs(5)));
        }
        assert_eq!(backoff.next(), None);
    }

    #[test]
    fn test_growth_fn_closure() {
        let delays: Vec<_> = not_immediate()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(100))
            .with_growth_fn(|d| d + Duration::from_millis(50))
            .build()
            .unwrap()
            .collect();

        assert_eq!(delays, [100, 150, 200].map(Duration::from_millis).to_vec());
    }

    #[test]
    fn test_growth_grows_unclamped_value() {
        // 4s -> 8s -> 16s, with only the yielded values clamped to 5s
        let delays: Vec<_> = not_immediate()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_secs(4))
            .with_growth_fn(|d| d * 2)
            .with_max_delay(Duration::from_secs(5))
            .build()
            .unwrap()
            .collect();

        assert_eq!(delays, [4, 5, 5].map(Duration::from_secs).to_vec());
    }

    #[test]
    fn test_multiply_saturates() {
        assert_eq!(Multiply(2.0).grow(Duration::MAX), Duration::MAX);
        assert_eq!(Multiply(-1.0).grow(Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(Multiply(f64::NAN).grow(Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(Add(Duration::from_secs(1)).grow(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let mut backoff = not_immediate()
                .with_initial_delay(Duration::from_millis(1000))
                .with_growth(Constant(Duration::from_millis(1000)))
                .with_jitter(true)
                .build()
                .unwrap();
            let delay = backoff.next().unwrap();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_jitter_respects_max_delay_and_zero() {
        let max_delay = Duration::from_millis(100);
        let backoff = SimpleBackoff::builder()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(max_delay)
            .with_jitter(true)
            .build()
            .unwrap();

        let delays: Vec<_> = backoff.collect();
        assert_eq!(delays[0], Duration::ZERO);
        assert!(delays.iter().all(|d| *d <= max_delay));
    }

    #[test]
    fn test_delays_from_secs() {
        let schedule = delays_from_secs([0.05, 0.06, 0.07]).unwrap();
        assert_eq!(
            schedule,
            [50, 60, 70].map(Duration::from_millis).to_vec()
        );

        assert!(matches!(
            delays_from_secs([f64::INFINITY]),
            Err(ConfigError::InvalidDelay { .. })
        ));
        assert!(delays_from_secs([-0.5]).is_err());
    }
}
