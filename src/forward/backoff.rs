//! Jittered linear backoff.
//!
//! After attempt `k` (1-based) the wait is a uniformly random duration in
//! `[min, max)` multiplied by `k`. The jitter spreads out retries from many
//! deliveries that failed at the same moment; the multiplier makes later
//! retries wait longer.

use std::time::Duration;

use rand::Rng;

/// Computes the wait after the given (1-based) attempt.
///
/// When `max <= min` there is no jitter range and the wait is `min * attempt`.
/// Attempt `0` is treated as `1`.
///
/// ```
/// use std::time::Duration;
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use webhook_relay::forward::linear_jitter_backoff;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let min = Duration::from_millis(100);
/// let max = Duration::from_millis(500);
///
/// let wait = linear_jitter_backoff(min, max, 3, &mut rng);
/// assert!(wait >= min * 3 && wait < max * 3);
/// ```
pub fn linear_jitter_backoff<R>(min: Duration, max: Duration, attempt: u32, rng: &mut R) -> Duration
where
    R: Rng + ?Sized,
{
    let attempt = attempt.max(1);

    if max <= min {
        return min.saturating_mul(attempt);
    }

    let span_nanos = u64::try_from((max - min).as_nanos()).unwrap_or(u64::MAX);
    let jitter = Duration::from_nanos(rng.gen_range(0..span_nanos));

    min.saturating_add(jitter).saturating_mul(attempt)
}
