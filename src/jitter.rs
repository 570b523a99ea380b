//! TTL jitter.
//!
//! Keys written in the same burst must not expire in lockstep, or the next
//! expiry front re-creates the stampede the lock just absorbed.

use rand::Rng;
use std::time::Duration;

const JITTER_RATIO: f64 = 0.1;
const MIN_TTL: Duration = Duration::from_secs(1);

/// Perturb `base` by a uniformly random amount within ±10%.
///
/// A zero `base` means "no expiry" and is returned unchanged. The result is
/// floored at one second so jitter can never produce an immediately
/// expiring entry.
#[must_use]
pub fn with_jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }

    let range = base.as_secs_f64() * JITTER_RATIO;
    let adjusted = base.as_secs_f64() + rand::thread_rng().gen_range(-range..=range);

    if adjusted < MIN_TTL.as_secs_f64() {
        MIN_TTL
    } else {
        Duration::from_secs_f64(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_base_is_unchanged() {
        assert_eq!(with_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn stays_within_ten_percent_of_base() {
        let base = Duration::from_secs(60);
        for _ in 0..1_000 {
            let jittered = with_jitter(base);
            assert!(jittered >= Duration::from_secs(54), "got {jittered:?}");
            assert!(jittered <= Duration::from_secs(66), "got {jittered:?}");
        }
    }

    #[test]
    fn small_base_is_floored_at_one_second() {
        // ±10% of 500ms can never reach the 1s floor
        for _ in 0..100 {
            assert_eq!(with_jitter(Duration::from_millis(500)), MIN_TTL);
        }
    }

    #[test]
    fn jitter_actually_varies() {
        let base = Duration::from_secs(3600);
        let first = with_jitter(base);
        let varied = (0..100).any(|_| with_jitter(base) != first);
        assert!(varied, "100 draws produced the same TTL");
    }
}
