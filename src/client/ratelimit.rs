//! Cost-based outbound rate limiter: a synchronous token-bucket variant
//! where each event's cost is a function of its serialised length rather
//! than a flat rate, matching §4.3's formula.

use std::time::Duration;

use tokio::time::Instant;

/// Per-character cost added on top of the flat per-event cost.
const PER_CHAR_COST: Duration = Duration::from_millis(10);
/// Flat cost charged to every outbound event.
const BASE_COST: Duration = Duration::from_secs(1);
/// Once accumulated delay exceeds this, the sender is blocked for the
/// event's own cost before the write proceeds.
const THROTTLE_THRESHOLD: Duration = Duration::from_secs(8);

/// Tracks accumulated send pressure and sleeps the caller when it's built
/// up past the threshold.
pub struct RateLimiter {
    last_write: Instant,
    write_delay: Duration,
}

impl RateLimiter {
    /// A limiter with no accumulated delay, anchored to now.
    pub fn new() -> Self {
        RateLimiter {
            last_write: Instant::now(),
            write_delay: Duration::ZERO,
        }
    }

    /// The cost of sending a line of `chars` characters.
    pub fn cost(chars: usize) -> Duration {
        BASE_COST + PER_CHAR_COST * chars as u32
    }

    /// Account for an outbound event of `chars` characters, sleeping first
    /// if accumulated delay has crossed the threshold. Must be called
    /// immediately before the write it gates.
    pub async fn throttle(&mut self, chars: usize) {
        let cost = Self::cost(chars);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_write);
        self.write_delay = self.write_delay.saturating_sub(elapsed) + cost;
        if self.write_delay > THROTTLE_THRESHOLD {
            tokio::time::sleep(cost).await;
        }
        self.last_write = Instant::now();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_scales_with_length() {
        assert_eq!(RateLimiter::cost(0), Duration::from_secs(1));
        assert_eq!(RateLimiter::cost(10), Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_sends_accumulate_delay_and_throttle() {
        let mut limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.throttle(0).await;
        }
        // Once write_delay exceeds 8s the limiter starts sleeping a full
        // event cost (1s here) per call; with 10 calls of 1s cost each,
        // accumulated delay crosses the 8s threshold well before the end.
        assert!(Instant::now() - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_out_sends_do_not_throttle() {
        let mut limiter = RateLimiter::new();
        limiter.throttle(0).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        let start = Instant::now();
        limiter.throttle(0).await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }
}
