//! Reconnection delay schedule

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with randomization, matching the browser client's
/// reconnection schedule (1s doubling up to 5s, +/- 50% jitter).
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: u32,
    jitter: f64,
    attempts: u32,
}

impl Backoff {
    /// Create a schedule between `min` and `max`
    pub fn new(min: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            min,
            max,
            factor: 2,
            jitter: jitter.clamp(0.0, 1.0),
            attempts: 0,
        }
    }

    /// Next delay; advances the attempt count
    pub fn next_delay(&mut self) -> Duration {
        let sample = if self.jitter > 0.0 {
            Some(rand::thread_rng().gen::<f64>())
        } else {
            None
        };
        self.delay_with_sample(sample)
    }

    fn delay_with_sample(&mut self, sample: Option<f64>) -> Duration {
        let exp = self.factor.saturating_pow(self.attempts.min(16)) as f64;
        self.attempts = self.attempts.saturating_add(1);

        let mut ms = self.min.as_millis() as f64 * exp;
        if let Some(rand) = sample {
            let deviation = (rand * self.jitter * ms).floor();
            ms = if ((rand * 10.0).floor() as u64) & 1 == 0 {
                ms - deviation
            } else {
                ms + deviation
            };
        }

        let capped = ms.min(self.max.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start the schedule over
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 0.0);
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 0.5);
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_jitter_direction_follows_sample() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5), 0.5);
        // 0.2 -> floor(2.0) is even, delay shrinks by 10%
        assert_eq!(backoff.delay_with_sample(Some(0.2)), Duration::from_millis(900));
        // 0.1 -> floor(1.0) is odd, delay grows by 10% of 2s
        assert_eq!(backoff.delay_with_sample(Some(0.1)), Duration::from_millis(2100));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
