//! Per-connection message throttling.
//!
//! A small token bucket: each accepted message spends one token, and tokens
//! grow back at a steady rate up to the bucket's capacity. Two buckets sit in
//! front of the command dispatcher, one for short bursts and one for
//! sustained chatter.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Throttle {
    capacity: u32,
    tokens: u32,
    /// Interval at which a single token grows back.
    regrow: Duration,
    last_regrow: Instant,
}

impl Throttle {
    /// A bucket holding `capacity` tokens that fully regrows over `per`.
    pub fn new(capacity: u32, per: Duration) -> Self {
        Self {
            capacity,
            tokens: capacity,
            regrow: per / capacity,
            last_regrow: Instant::now(),
        }
    }

    /// Burst guard: up to `n` messages in any one second.
    pub fn per_second(n: u32) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// Sustained guard: up to `n` messages in any one minute.
    pub fn per_minute(n: u32) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Spend one token if available. Regrowth is computed lazily from the
    /// time since the last credit, clamped to capacity so an idle connection
    /// cannot bank an unbounded burst.
    pub fn allow(&mut self) -> bool {
        let idle = self.last_regrow.elapsed();
        let earned = (idle.as_micros() / self.regrow.as_micros()).min(u128::from(self.capacity));
        if earned > 0 {
            let earned = earned as u32;
            self.tokens = (self.tokens + earned).min(self.capacity);
            self.last_regrow = if self.tokens == self.capacity {
                Instant::now()
            } else {
                self.last_regrow + self.regrow * earned
            };
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_spends_down_to_refusal() {
        let mut throttle = Throttle::new(4, Duration::from_secs(60));
        for _ in 0..4 {
            assert!(throttle.allow());
        }
        assert!(!throttle.allow());
    }

    #[test]
    fn test_tokens_regrow_over_time() {
        let mut throttle = Throttle::new(2, Duration::from_millis(80));
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(!throttle.allow());
        // One token regrows every 40 ms.
        std::thread::sleep(Duration::from_millis(50));
        assert!(throttle.allow());
        assert!(!throttle.allow());
    }

    #[test]
    fn test_idle_connection_cannot_bank_past_capacity() {
        let mut throttle = Throttle::new(3, Duration::from_millis(9));
        for _ in 0..3 {
            assert!(throttle.allow());
        }
        std::thread::sleep(Duration::from_millis(40));
        // Long idle regrows to the cap, never beyond it.
        for _ in 0..3 {
            assert!(throttle.allow());
        }
        assert!(!throttle.allow());
    }
}
