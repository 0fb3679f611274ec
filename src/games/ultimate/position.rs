//! Grid coordinates shared by sub-boards and the meta-board.

use serde::Serialize;
use tracing::instrument;

/// A `(row, col)` coordinate on a 3x3 grid.
///
/// The same type addresses a sub-board on the meta-board and a cell inside
/// a sub-board. Both components are always in `0..3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coord {
    row: usize,
    col: usize,
}

impl Coord {
    /// All 9 coordinates in row-major order.
    pub const ALL: [Coord; 9] = [
        Coord::at(0, 0),
        Coord::at(0, 1),
        Coord::at(0, 2),
        Coord::at(1, 0),
        Coord::at(1, 1),
        Coord::at(1, 2),
        Coord::at(2, 0),
        Coord::at(2, 1),
        Coord::at(2, 2),
    ];

    /// Creates a coordinate, or `None` if either component is outside `0..3`.
    #[instrument]
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < 3 && col < 3).then_some(Self { row, col })
    }

    /// Creates a coordinate from constant components.
    ///
    /// Panics at compile time when used in a const context with an
    /// out-of-range component.
    pub const fn at(row: usize, col: usize) -> Self {
        assert!(row < 3 && col < 3, "coordinate out of range");
        Self { row, col }
    }

    /// Creates a coordinate from a row-major index (0-8).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::new(index / 3, index % 3)
    }

    /// Returns the row (0-2).
    pub fn row(self) -> usize {
        self.row
    }

    /// Returns the column (0-2).
    pub fn col(self) -> usize {
        self.col
    }

    /// Returns the row-major index (0-8).
    pub fn index(self) -> usize {
        self.row * 3 + self.col
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Coord::new(3, 0).is_none());
        assert!(Coord::new(0, 3).is_none());
        assert_eq!(Coord::new(2, 1), Some(Coord::at(2, 1)));
    }

    #[test]
    fn test_index_matches_all_ordering() {
        for (i, coord) in Coord::ALL.iter().enumerate() {
            assert_eq!(coord.index(), i);
            assert_eq!(Coord::from_index(i), Some(*coord));
        }
        assert_eq!(Coord::from_index(9), None);
    }
}
