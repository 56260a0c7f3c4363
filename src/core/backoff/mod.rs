//! Retry delay calculation for clusters whose last poll failed.
//!
//! The delay grows exponentially with the number of consecutive failures,
//! is capped, and gets a random jitter on top so that many clusters failing
//! at the same moment do not retry in lockstep.

use std::time::Duration;

use rand::Rng;

/// Multiplier applied to `2^tries`.
pub const BACKOFF_FACTOR: f64 = 2.0;

/// Cap of the exponential part, in seconds.
pub const BACKOFF_MAX_SECONDS: f64 = 120.0;

/// Upper bound of the jitter added to every delay, in seconds.
pub const BACKOFF_MAX_JITTER_SECONDS: f64 = 4.0;

/// `factor * 2^tries`, capped at `max_value`.
pub fn expo(tries: u32, factor: f64, max_value: f64) -> f64 {
    // 2^64 is far beyond any sane cap already
    let exp = tries.min(64) as i32;
    (factor * 2f64.powi(exp)).min(max_value)
}

/// Adds a uniformly distributed jitter in `[0, jitter)` to `value`.
pub fn random_jitter_with<R: Rng + ?Sized>(value: f64, jitter: f64, rng: &mut R) -> f64 {
    if jitter <= 0.0 {
        return value;
    }
    value + rng.gen_range(0.0..jitter)
}

/// Same as [`random_jitter_with`] using the thread local RNG.
pub fn random_jitter(value: f64, jitter: f64) -> f64 {
    random_jitter_with(value, jitter, &mut rand::thread_rng())
}

/// Backoff delay for the given number of consecutive failures.
pub fn calculate_backoff_with<R: Rng + ?Sized>(tries: u32, rng: &mut R) -> Duration {
    let base = expo(tries, BACKOFF_FACTOR, BACKOFF_MAX_SECONDS);
    let seconds = random_jitter_with(base, BACKOFF_MAX_JITTER_SECONDS, rng);
    Duration::from_secs_f64(seconds)
}

pub fn calculate_backoff(tries: u32) -> Duration {
    calculate_backoff_with(tries, &mut rand::thread_rng())
}

/// Sleep interval around `base` used between scheduler ticks.
pub fn jittered_interval(base: Duration) -> Duration {
    Duration::from_secs_f64(random_jitter(base.as_secs_f64(), base.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn expo_grows_then_caps() {
        assert_eq!(expo(1, 2.0, 120.0), 4.0);
        assert_eq!(expo(2, 2.0, 120.0), 8.0);
        assert_eq!(expo(5, 2.0, 120.0), 64.0);
        assert_eq!(expo(6, 2.0, 120.0), 120.0);
        assert_eq!(expo(1_000, 2.0, 120.0), 120.0);
    }

    #[test]
    fn backoff_is_bounded_by_cap_plus_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        let bound = Duration::from_secs_f64(BACKOFF_MAX_SECONDS + BACKOFF_MAX_JITTER_SECONDS);

        for tries in 1..=50 {
            let delay = calculate_backoff_with(tries, &mut rng);
            let floor = Duration::from_secs_f64(expo(tries, BACKOFF_FACTOR, BACKOFF_MAX_SECONDS));
            assert!(delay >= floor, "tries={tries} delay={delay:?}");
            assert!(delay < bound, "tries={tries} delay={delay:?}");
        }
    }

    #[test]
    fn backoff_is_non_decreasing_in_expectation() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples = 200;

        let mean = |tries: u32, rng: &mut StdRng| -> f64 {
            (0..samples)
                .map(|_| calculate_backoff_with(tries, rng).as_secs_f64())
                .sum::<f64>()
                / samples as f64
        };

        let mut previous = 0.0;
        for tries in 1..=10 {
            let m = mean(tries, &mut rng);
            // jitter can shave off at most its own width from the mean
            assert!(m + BACKOFF_MAX_JITTER_SECONDS >= previous, "tries={tries}");
            previous = m;
        }
    }

    #[test]
    fn same_seed_same_delay() {
        let a = calculate_backoff_with(3, &mut StdRng::seed_from_u64(1));
        let b = calculate_backoff_with(3, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn zero_jitter_returns_value() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(random_jitter_with(3.5, 0.0, &mut rng), 3.5);
    }

    #[test]
    fn jittered_interval_stays_within_double() {
        for _ in 0..100 {
            let d = jittered_interval(Duration::from_secs(1));
            assert!(d >= Duration::from_secs(1));
            assert!(d < Duration::from_secs(2));
        }
    }
}
