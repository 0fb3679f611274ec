//! Core domain types for ultimate tic-tac-toe.
//!
//! The board model is pure data: a 3x3 grid of sub-boards plus a parallel
//! 3x3 grid of meta-cells recording each sub-board's outcome. Game logic
//! lives in [`super::rules`].

use super::action::{Move, MoveError};
use super::position::Coord;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A player's mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Mark {
    /// First player (X), moves first in every game.
    #[serde(rename = "X")]
    #[strum(serialize = "X")]
    First,
    /// Second player (O).
    #[serde(rename = "O")]
    #[strum(serialize = "O")]
    Second,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::First => Mark::Second,
            Mark::Second => Mark::First,
        }
    }
}

/// A cell inside a sub-board.
///
/// Serialized as `null`, `"X"` or `"O"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<Mark>", into = "Option<Mark>")]
pub enum Square {
    /// Empty cell.
    #[default]
    Empty,
    /// Cell occupied by a mark.
    Occupied(Mark),
}

impl Square {
    /// Returns the occupying mark, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Square::Empty => None,
            Square::Occupied(mark) => Some(mark),
        }
    }
}

impl From<Option<Mark>> for Square {
    fn from(mark: Option<Mark>) -> Self {
        mark.map_or(Square::Empty, Square::Occupied)
    }
}

impl From<Square> for Option<Mark> {
    fn from(square: Square) -> Self {
        square.mark()
    }
}

/// One of the nine inner 3x3 boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SubBoard {
    cells: [[Square; 3]; 3],
}

impl SubBoard {
    /// Creates an empty sub-board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the square at the given cell.
    pub fn get(&self, cell: Coord) -> Square {
        self.cells[cell.row()][cell.col()]
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, cell: Coord) -> bool {
        self.get(cell) == Square::Empty
    }

    /// Checks if every cell is occupied.
    pub fn is_full(&self) -> bool {
        Coord::ALL.iter().all(|&cell| !self.is_empty(cell))
    }

    /// Iterates over the empty cells in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        Coord::ALL.into_iter().filter(|&cell| self.is_empty(cell))
    }

    /// Occupies a cell. Callers must check that the cell is empty.
    pub(crate) fn set(&mut self, cell: Coord, mark: Mark) {
        debug_assert!(self.is_empty(cell), "cells are never overwritten");
        self.cells[cell.row()][cell.col()] = Square::Occupied(mark);
    }
}

/// A sub-board's outcome as seen from the meta-board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaCell {
    /// Still playable.
    #[default]
    Open,
    /// Won by a mark.
    WonBy(Mark),
    /// Full with no winner.
    Drawn,
}

impl MetaCell {
    /// Returns true while the sub-board accepts moves.
    pub fn is_open(self) -> bool {
        self == MetaCell::Open
    }

    /// Returns the winning mark, if any.
    pub fn winner(self) -> Option<Mark> {
        match self {
            MetaCell::WonBy(mark) => Some(mark),
            MetaCell::Open | MetaCell::Drawn => None,
        }
    }
}

/// The nested grid: nine sub-boards and their meta-cells.
///
/// Once a meta-cell leaves [`MetaCell::Open`] it never changes, and no cell
/// of the corresponding sub-board can be placed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BoardModel {
    boards: [[SubBoard; 3]; 3],
    meta: [[MetaCell; 3]; 3],
}

impl BoardModel {
    /// Creates an empty board with every sub-board open.
    #[instrument]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sub-board at the given meta coordinate.
    pub fn sub_board(&self, sub: Coord) -> &SubBoard {
        &self.boards[sub.row()][sub.col()]
    }

    /// Returns the meta-cell at the given meta coordinate.
    pub fn meta(&self, sub: Coord) -> MetaCell {
        self.meta[sub.row()][sub.col()]
    }

    /// Returns the square targeted by a move.
    pub fn square(&self, mv: Move) -> Square {
        self.sub_board(mv.sub()).get(mv.cell())
    }

    /// Iterates over the sub-boards that still accept moves.
    pub fn open_boards(&self) -> impl Iterator<Item = Coord> + '_ {
        Coord::ALL.into_iter().filter(|&sub| self.meta(sub).is_open())
    }

    /// Checks if every meta-cell has been decided.
    pub fn all_closed(&self) -> bool {
        self.open_boards().next().is_none()
    }

    /// Places a mark and records the sub-board's outcome if it became terminal.
    ///
    /// This is a structural operation: it enforces the board invariants
    /// (open sub-board, empty cell) but knows nothing about turns or the
    /// next-board constraint. Returns the sub-board's meta-cell after the
    /// placement.
    #[instrument(skip(self), fields(sub = %mv.sub(), cell = %mv.cell()))]
    pub fn place(&mut self, mv: Move, mark: Mark) -> Result<MetaCell, MoveError> {
        if !self.meta(mv.sub()).is_open() {
            return Err(MoveError::BoardClosed(mv.sub()));
        }
        if self.square(mv) != Square::Empty {
            return Err(MoveError::CellOccupied(mv));
        }

        let board = &mut self.boards[mv.sub().row()][mv.sub().col()];
        board.set(mv.cell(), mark);

        if let Some(outcome) = super::rules::sub_board_outcome(board) {
            self.meta[mv.sub().row()][mv.sub().col()] = outcome;
        }
        Ok(self.meta(mv.sub()))
    }

    /// Formats the board as a human-readable 9x9 grid.
    ///
    /// Cells of decided sub-boards are drawn with the winner's mark in
    /// lowercase, or `#` for drawn sub-boards, when empty.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for sub_row in 0..3 {
            for cell_row in 0..3 {
                for sub_col in 0..3 {
                    let sub = Coord::at(sub_row, sub_col);
                    for cell_col in 0..3 {
                        let square = self.sub_board(sub).get(Coord::at(cell_row, cell_col));
                        let symbol = match (square, self.meta(sub)) {
                            (Square::Occupied(Mark::First), _) => 'X',
                            (Square::Occupied(Mark::Second), _) => 'O',
                            (Square::Empty, MetaCell::Open) => '.',
                            (Square::Empty, MetaCell::WonBy(Mark::First)) => 'x',
                            (Square::Empty, MetaCell::WonBy(Mark::Second)) => 'o',
                            (Square::Empty, MetaCell::Drawn) => '#',
                        };
                        result.push(symbol);
                    }
                    if sub_col < 2 {
                        result.push('|');
                    }
                }
                result.push('\n');
            }
            if sub_row < 2 {
                result.push_str("---+---+---\n");
            }
        }
        result
    }
}

/// Next-board restriction: the sub-board the next mover must play in, or
/// `None` for a free choice among open sub-boards.
pub type Constraint = Option<Coord>;

/// Current status of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    /// Game is ongoing.
    InProgress,
    /// Game ended in a win.
    Won(Mark),
    /// Game ended in a draw.
    Drawn,
}

impl GameStatus {
    /// Returns true once the game has ended.
    pub fn is_terminal(self) -> bool {
        self != GameStatus::InProgress
    }
}

/// Complete game state for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// The board.
    pub(super) board: BoardModel,
    /// Mark to move.
    pub(super) current_player: Mark,
    /// Next-board restriction.
    pub(super) constraint: Constraint,
    /// Game status.
    pub(super) status: GameStatus,
}

impl GameState {
    /// Creates a new game: empty board, First to move, no constraint.
    #[instrument]
    pub fn new() -> Self {
        Self {
            board: BoardModel::new(),
            current_player: Mark::First,
            constraint: None,
            status: GameStatus::InProgress,
        }
    }

    /// Builds a state from an arbitrary position, e.g. a puzzle or fixture.
    ///
    /// The status is derived from the board. A constraint naming a closed
    /// sub-board is normalized to a free choice.
    #[instrument(skip(board))]
    pub fn from_position(board: BoardModel, current_player: Mark, constraint: Constraint) -> Self {
        let status = super::rules::board_status(&board);
        let constraint = constraint
            .filter(|&sub| board.meta(sub).is_open())
            .filter(|_| !status.is_terminal());
        Self {
            board,
            current_player,
            constraint,
            status,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &BoardModel {
        &self.board
    }

    /// Returns the mark to move.
    pub fn current_player(&self) -> Mark {
        self.current_player
    }

    /// Returns the next-board constraint.
    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    /// Returns the game status.
    pub fn status(&self) -> GameStatus {
        self.status
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
