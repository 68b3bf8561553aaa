/// Streaming accuracy over (gold, hypothesis) pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    /// Number of pairs that agreed
    pub correct: usize,
    /// Number of pairs seen
    pub total: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one decision
    pub fn update<T: PartialEq + ?Sized>(&mut self, gold: &T, hypothesis: &T) {
        if gold == hypothesis {
            self.correct += 1;
        }
        self.total += 1;
    }

    /// Ratio of correct decisions; zero before anything was recorded
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}
