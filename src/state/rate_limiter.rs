use governor::clock::{Clock, DefaultClock, ReasonablyRealtime};
use governor::state::{InMemoryState, NotKeyed};
use governor::middleware::NoOpMiddleware;
use governor::Quota;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lowest rate a limiter accepts; configuration validation rejects anything below
const MIN_RATE: f64 = 0.001;

type DirectLimiter<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Token bucket bounding the request rate of one source
///
/// A single instance is shared by every task of a source. The bucket starts
/// full and refills one permit per `1 / rate` seconds.
pub struct RateLimiter<C: Clock = DefaultClock> {
    limiter: DirectLimiter<C>,
    rate: f64,
    acquisitions: AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter admitting `requests_per_second` with a burst of one
    pub fn new(requests_per_second: f64) -> Self {
        Self::with_burst(requests_per_second, 1)
    }

    /// Creates a limiter that may admit up to `burst` requests back to back
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Sustained rate
    /// * `burst` - Bucket capacity; the bucket starts full
    pub fn with_burst(requests_per_second: f64, burst: u32) -> Self {
        Self::with_clock(requests_per_second, burst, &DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Creates a limiter reading time from `clock`
    pub fn with_clock(requests_per_second: f64, burst: u32, clock: &C) -> Self {
        let rate = if requests_per_second.is_finite() {
            requests_per_second.max(MIN_RATE)
        } else {
            MIN_RATE
        };

        Self {
            limiter: DirectLimiter::direct_with_clock(quota(rate, burst), clock),
            rate,
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Takes a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        match self.limiter.check() {
            Ok(()) => {
                self.acquisitions.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Number of permits handed out so far
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl<C: ReasonablyRealtime> RateLimiter<C> {
    /// Waits until a permit is available and takes it
    ///
    /// Never fails, only delays.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }
}

impl<C: Clock> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("acquisitions", &self.acquisitions())
            .finish()
    }
}

/// One permit per `1 / rate` seconds, `burst` permits at most
fn quota(rate: f64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_secs_f64(1.0 / rate);

    // Rates too high for a nanosecond period are capped
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(burst)
}
