use serde::{Deserialize, Serialize};

/// An inclusive primary-key range handed to one range-loader worker
/// (spec §3 PKRange).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkRange {
    pub start: i64,
    pub end: i64,
}

impl PkRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: &PkRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}
