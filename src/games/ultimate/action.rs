//! First-class move type and move errors.
//!
//! Moves are transient player intents. They are validated by
//! [`super::rules::validate_move`] before [`super::rules::apply_move`] ever
//! sees them.

use super::position::Coord;
use super::types::Mark;
use serde::Serialize;
use tracing::instrument;

/// A move: a cell inside a sub-board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Sub-board on the meta-board.
    sub: Coord,
    /// Cell inside the sub-board.
    cell: Coord,
}

impl Move {
    /// Creates a new move.
    pub fn new(sub: Coord, cell: Coord) -> Self {
        Self { sub, cell }
    }

    /// Creates a move from raw indices, as received over the wire.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError::OutOfBounds`] if any index is outside `0..3`.
    #[instrument]
    pub fn from_indices(
        sub_row: usize,
        sub_col: usize,
        cell_row: usize,
        cell_col: usize,
    ) -> Result<Self, MoveError> {
        let sub = Coord::new(sub_row, sub_col).ok_or(MoveError::OutOfBounds)?;
        let cell = Coord::new(cell_row, cell_col).ok_or(MoveError::OutOfBounds)?;
        Ok(Self::new(sub, cell))
    }

    /// Returns the target sub-board.
    pub fn sub(&self) -> Coord {
        self.sub
    }

    /// Returns the target cell inside the sub-board.
    pub fn cell(&self) -> Coord {
        self.cell
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "board {} cell {}", self.sub, self.cell)
    }
}

/// Error that can occur when validating a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The game has already ended.
    #[display("Game is already over")]
    GameOver,

    /// It's not this mark's turn.
    #[display("It's not {}'s turn", _0)]
    WrongTurn(Mark),

    /// The target sub-board has already been won or drawn.
    #[display("Sub-board {} is closed", _0)]
    BoardClosed(Coord),

    /// The move ignores the next-board constraint.
    #[display("Must play in sub-board {required}, not {attempted}")]
    ConstraintViolation {
        /// Sub-board the mover is restricted to.
        required: Coord,
        /// Sub-board the move targeted.
        attempted: Coord,
    },

    /// The target cell is already occupied.
    #[display("Cell at {} is already occupied", _0)]
    CellOccupied(Move),

    /// A coordinate was outside the 3x3 grid.
    #[display("Coordinates must be in 0..3")]
    OutOfBounds,
}

impl std::error::Error for MoveError {}
