use serde::{Deserialize, Serialize};

/// Per-destination message counter exposed to templates as `${SEQNUM}`.
///
/// Starts at 1 and wraps back to 1 instead of reaching zero or going negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumber(i32);

impl SequenceNumber {
    /// Restores a persisted value. Non-positive values start over at 1.
    pub fn new(value: i32) -> Self {
        if value > 0 { Self(value) } else { Self::default() }
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    /// Advances to the next number.
    pub fn step(&mut self) {
        self.0 = self.0.checked_add(1).unwrap_or(1);
    }

    /// Returns the number `count` steps ahead, wrapping the same way as [`SequenceNumber::step`].
    pub fn advanced_by(self, count: usize) -> Self {
        let span = i64::from(i32::MAX);
        let offset = (count as u64 % span as u64) as i64;
        let value = (i64::from(self.0) - 1 + offset) % span + 1;

        Self(value as i32)
    }
}

impl Default for SequenceNumber {
    fn default() -> Self {
        Self(1)
    }
}
