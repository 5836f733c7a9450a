use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Half-open address range `[start, end)` inside one register bank.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl Range {
    /// Range of `size` cells from `start`. The end saturates at `usize::MAX`,
    /// which lies outside every bank.
    pub fn new(start: usize, size: usize) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the range fits into a bank holding `capacity` cells.
    pub fn within(&self, capacity: usize) -> bool {
        self.start <= self.end && self.end <= capacity
    }
}

impl From<(u16, u16)> for Range {
    /// Build a range from a Modbus `(address, count)` pair.
    fn from((addr, cnt): (u16, u16)) -> Self {
        Range::new(addr as usize, cnt as usize)
    }
}
