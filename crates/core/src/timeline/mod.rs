use std::time::Duration;

/// Monotonic stream clock. The booth advances it by one block duration per
/// captured block, so time follows the audio rather than the wall clock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    elapsed: Duration,
}

impl PlaybackClock {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
    }
}

/// Milliseconds between two timestamps, zero when `later` precedes `earlier`.
pub fn millis_between(earlier: Duration, later: Duration) -> f32 {
    later.saturating_sub(earlier).as_secs_f32() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut clock = PlaybackClock::start();
        clock.advance(Duration::from_millis(12));
        clock.advance(Duration::from_millis(13));
        assert_eq!(clock.now(), Duration::from_millis(25));

        clock.reset();
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn millis_between_saturates() {
        let a = Duration::from_millis(100);
        let b = Duration::from_millis(350);
        assert!((millis_between(a, b) - 250.0).abs() < 1e-3);
        assert_eq!(millis_between(b, a), 0.0);
    }
}
