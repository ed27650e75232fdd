/// Number of envelope samples the controller remembers.
pub const HISTORY_LEN: usize = 10;

/// Fixed ring of the most recent envelope values, zero-initialised.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VolumeHistory {
    slots: [f32; HISTORY_LEN],
    pos: usize,
}

impl VolumeHistory {
    pub fn push(&mut self, value: f32) {
        self.slots[self.pos] = value;
        self.pos = (self.pos + 1) % HISTORY_LEN;
    }

    pub fn newest(&self) -> f32 {
        self.back(0)
    }

    /// Value written `age` pushes before the newest one.
    pub fn back(&self, age: usize) -> f32 {
        let age = age % HISTORY_LEN;
        self.slots[(self.pos + 2 * HISTORY_LEN - 1 - age) % HISTORY_LEN]
    }

    /// Mean over all slots, including ones not yet written.
    pub fn average(&self) -> f32 {
        self.slots.iter().sum::<f32>() / HISTORY_LEN as f32
    }

    /// Newest value minus the one `lag` pushes older.
    pub fn trend(&self, lag: usize) -> f32 {
        self.newest() - self.back(lag)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_averages_all_slots() {
        let mut history = VolumeHistory::default();
        history.push(1.0);
        assert!((history.average() - 0.1).abs() < 1e-6);

        for i in 0..25 {
            history.push(i as f32);
        }
        assert_eq!(history.newest(), 24.0);
        assert_eq!(history.back(9), 15.0);
        assert!((history.average() - 19.5).abs() < 1e-4);
    }

    #[test]
    fn trend_compares_against_lagged_slot() {
        let mut history = VolumeHistory::default();
        for v in [0.1, 0.2, 0.3, 0.4, 0.5, 0.6] {
            history.push(v);
        }
        assert!((history.trend(4) - 0.4).abs() < 1e-6);

        history.clear();
        history.push(0.5);
        assert!((history.trend(4) - 0.5).abs() < 1e-6);
    }
}
