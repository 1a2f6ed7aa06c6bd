use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    Fixed,
    Exponential,
}

/// Wait policy between attempts against a remote.
///
/// The ceiling for attempt `n` (0-indexed) is `base` for [`Growth::Fixed`] and
/// `base * 2^n` for [`Growth::Exponential`], capped at `max`. Jitter draws the
/// actual delay uniformly from `[ceiling * (1 - jitter), ceiling]` so that
/// workers failing together do not retry together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base:   Duration,
    max:    Duration,
    growth: Growth,
    jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self { Self::exponential(Duration::from_millis(500), Duration::from_secs(30)).with_jitter(0.5) }
}

impl Backoff {
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            growth: Growth::Exponential,
            jitter: 0.0,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            base:   delay,
            max:    delay,
            growth: Growth::Fixed,
            jitter: 0.0,
        }
    }

    /// No waiting at all.
    pub fn none() -> Self { Self::fixed(Duration::ZERO) }

    /// Fraction of the ceiling that may be shaved off, clamped to `0..=1`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
        self
    }

    pub fn jitter(&self) -> f64 { self.jitter }

    /// Upper bound of the delay before retry `attempt`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        match self.growth {
            Growth::Fixed => self.base,
            Growth::Exponential => {
                let multiplier = 2_u32.saturating_pow(attempt);
                self.base.saturating_mul(multiplier).min(self.max)
            }
        }
    }

    pub fn next_delay(&self, attempt: u32) -> Duration { self.next_delay_with(attempt, &mut rand::thread_rng()) }

    pub fn next_delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(attempt);
        if self.jitter == 0.0 || ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling.mul_f64(1.0 - self.jitter);
        floor + (ceiling - floor).mul_f64(rng.r#gen::<f64>())
    }
}
