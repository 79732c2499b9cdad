//! Token-bucket rate limiter with an injectable clock (component C5).

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Anything that can report the current instant. Abstracted so tests can
/// advance time deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real wall clock, used in production.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

enum State {
    Disabled,
    Enabled {
        rate: f64,
        burst: f64,
        bucket: Mutex<Bucket>,
        clock: Box<dyn Clock>,
    },
}

/// A single shared token bucket. `rate <= 0` yields a disabled sentinel that
/// always allows, mirroring the "rate limiting is off" configuration.
pub struct RateLimiter {
    state: State,
}

impl RateLimiter {
    pub fn new(rate: f64) -> Self {
        Self::with_clock(rate, SystemClock)
    }

    pub fn with_clock(rate: f64, clock: impl Clock + 'static) -> Self {
        if rate <= 0.0 {
            return Self { state: State::Disabled };
        }

        let burst = (2.0 * rate).max(1.0);
        let now = clock.now();
        Self {
            state: State::Enabled {
                rate,
                burst,
                bucket: Mutex::new(Bucket { tokens: burst, last: now }),
                clock: Box::new(clock),
            },
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.state, State::Disabled)
    }

    /// Refill for elapsed time, then consume one token if available.
    pub fn allow(&self) -> bool {
        match &self.state {
            State::Disabled => true,
            State::Enabled { rate, burst, bucket, clock } => {
                let mut bucket = bucket.lock().expect("rate limiter lock poisoned");
                let now = clock.now();
                let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * rate).min(*burst);
                bucket.last = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current token count; `-1.0` for the disabled sentinel.
    pub fn tokens(&self) -> f64 {
        match &self.state {
            State::Disabled => -1.0,
            State::Enabled { bucket, .. } => bucket.lock().expect("rate limiter lock poisoned").tokens,
        }
    }
}

/// Paths never subject to the rate limit, regardless of whether the limiter
/// is enabled.
pub fn is_exempt_path(path: &str) -> bool {
    path == "/health" || path == "/metrics"
}

/// Fixed `Retry-After` value (seconds) sent with a 429 rejection.
pub const RETRY_AFTER_SECONDS: u64 = 1;

pub fn retry_after() -> Duration {
    Duration::from_secs(RETRY_AFTER_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// A deterministic clock for tests: starts at an arbitrary epoch and
    /// only moves forward when explicitly advanced.
    struct FakeClock {
        now: Arc<Mutex<Instant>>,
    }

    impl FakeClock {
        fn new() -> (Self, Arc<Mutex<Instant>>) {
            let now = Arc::new(Mutex::new(Instant::now()));
            (Self { now: now.clone() }, now)
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().expect("fake clock lock poisoned")
        }
    }

    #[test]
    fn rate_zero_or_negative_is_disabled_and_always_allows() {
        let limiter = RateLimiter::new(0.0);
        assert!(limiter.is_disabled());
        assert_eq!(limiter.tokens(), -1.0);
        for _ in 0..1000 {
            assert!(limiter.allow());
        }
    }

    #[test]
    fn burst_is_floored_at_one() {
        let (clock, _now) = FakeClock::new();
        let limiter = RateLimiter::with_clock(0.1, clock);
        assert_eq!(limiter.tokens(), 1.0);
    }

    #[test]
    fn burst_defaults_to_twice_the_rate() {
        let (clock, _now) = FakeClock::new();
        let limiter = RateLimiter::with_clock(5.0, clock);
        assert_eq!(limiter.tokens(), 10.0);
    }

    #[test]
    fn exhausts_burst_then_rejects() {
        let (clock, _now) = FakeClock::new();
        let limiter = RateLimiter::with_clock(1.0, clock);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow(), "burst of 2 should be exhausted after 2 allows");
    }

    #[test]
    fn refills_over_time_and_caps_at_burst() {
        let (clock, now) = FakeClock::new();
        let limiter = RateLimiter::with_clock(1.0, clock);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        *now.lock().unwrap() += Duration::from_secs(10);
        assert_eq!(limiter.tokens().round() as i64, 2);
        assert!(limiter.allow());
    }

    #[test]
    fn health_and_metrics_paths_are_exempt() {
        assert!(is_exempt_path("/health"));
        assert!(is_exempt_path("/metrics"));
        assert!(!is_exempt_path("/message"));
        assert!(!is_exempt_path("/events"));
    }
}
