/// Fixed-capacity circular window of recent intercept predictions.
///
/// Only slots written since the last [`PredictionHistory::clear`] take part
/// in the mean, so a partly filled window is not biased towards zero.
#[derive(Clone, Debug)]
pub struct PredictionHistory {
    slots: Vec<f64>,
    index: usize,
    filled: usize,
}

impl PredictionHistory {
    /// Creates an empty history. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)],
            index: 0,
            filled: 0,
        }
    }

    /// Writes `value` at the current index, overwriting the oldest entry when full.
    pub fn push(&mut self, value: f64) {
        self.slots[self.index] = value;
        self.index = (self.index + 1) % self.slots.len();
        self.filled = (self.filled + 1).min(self.slots.len());
    }

    /// Arithmetic mean of the written slots.
    pub fn mean(&self) -> Option<f64> {
        if self.filled == 0 {
            return None;
        }
        let sum: f64 = self.slots[..self.filled].iter().sum();
        Some(sum / self.filled as f64)
    }

    pub fn clear(&mut self) {
        self.slots.fill(0.0);
        self.index = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_ignores_unwritten_slots() {
        let mut h = PredictionHistory::new(5);
        for v in [10.0, 20.0, 30.0] {
            h.push(v);
        }
        assert_eq!(h.len(), 3);
        assert_relative_eq!(h.mean().unwrap(), 20.0);
    }

    #[test]
    fn empty_history_has_no_mean() {
        let h = PredictionHistory::new(3);
        assert!(h.is_empty());
        assert!(h.mean().is_none());
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut h = PredictionHistory::new(3);
        for v in [1.0, 2.0, 3.0, 10.0] {
            h.push(v);
        }
        assert_eq!(h.len(), 3);
        assert_relative_eq!(h.mean().unwrap(), 5.0);
    }

    #[test]
    fn legitimate_zero_prediction_is_counted() {
        let mut h = PredictionHistory::new(4);
        h.push(0.0);
        h.push(40.0);
        assert_relative_eq!(h.mean().unwrap(), 20.0);
    }

    #[test]
    fn clear_resets_index_and_count() {
        let mut h = PredictionHistory::new(3);
        h.push(100.0);
        h.push(200.0);
        h.clear();
        assert!(h.mean().is_none());
        h.push(7.0);
        assert_relative_eq!(h.mean().unwrap(), 7.0);
    }

    #[test]
    fn zero_capacity_becomes_one() {
        let mut h = PredictionHistory::new(0);
        assert_eq!(h.capacity(), 1);
        h.push(3.0);
        h.push(9.0);
        assert_relative_eq!(h.mean().unwrap(), 9.0);
    }
}
