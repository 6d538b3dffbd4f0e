//! Reconnect delay policies
//!
//! The delay is a function of the attempt counter (1 for the first retry).
//! Linear backoff is the default; exponential backoff with optional jitter
//! can be swapped in through [`ConnectionConfig`](super::ConnectionConfig).

use std::time::Duration;

use rand::Rng;

/// Delay policy between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffPolicy {
    /// `min(base * attempt, max)`
    Linear { base: Duration, max: Duration },

    /// `min(base * multiplier^(attempt - 1), max)`, then +/- `jitter`
    /// fraction, never above `max`
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
        jitter: f64,
    },

    /// Same delay for every attempt
    Fixed(Duration),
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Linear {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(5000),
        }
    }
}

impl BackoffPolicy {
    /// Linear policy with the given base and cap
    pub fn linear(base: Duration, max: Duration) -> Self {
        BackoffPolicy::Linear { base, max }
    }

    /// Exponential doubling policy without jitter
    pub fn exponential(base: Duration, max: Duration) -> Self {
        BackoffPolicy::Exponential {
            base,
            multiplier: 2.0,
            max,
            jitter: 0.0,
        }
    }

    /// Set the jitter fraction (exponential only, clamped to 0..=1)
    pub fn with_jitter(self, fraction: f64) -> Self {
        match self {
            BackoffPolicy::Exponential {
                base,
                multiplier,
                max,
                ..
            } => BackoffPolicy::Exponential {
                base,
                multiplier,
                max,
                jitter: fraction.clamp(0.0, 1.0),
            },
            other => other,
        }
    }

    /// Upper bound on any delay this policy produces
    pub fn cap(&self) -> Duration {
        match *self {
            BackoffPolicy::Linear { max, .. } | BackoffPolicy::Exponential { max, .. } => max,
            BackoffPolicy::Fixed(delay) => delay,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);

        match *self {
            BackoffPolicy::Linear { base, max } => base.saturating_mul(attempt).min(max),
            BackoffPolicy::Exponential {
                base,
                multiplier,
                max,
                jitter,
            } => {
                let step = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let exp = multiplier.max(1.0).powi(step);
                let raw = base.as_secs_f64() * exp;
                let capped = raw.min(max.as_secs_f64());
                let spread = if jitter > 0.0 {
                    let range = capped * jitter;
                    rand::rng().random_range(-range..=range)
                } else {
                    0.0
                };
                // Near Duration::MAX the f64 sum can overflow the conversion
                Duration::try_from_secs_f64((capped + spread).max(0.0))
                    .map_or(max, |delay| delay.min(max))
            }
            BackoffPolicy::Fixed(delay) => delay,
        }
    }
}
