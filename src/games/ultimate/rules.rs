//! Rules engine for ultimate tic-tac-toe.
//!
//! Stateless functions over the board model. [`apply_move`] is the only
//! function that produces a new game state; everything else is a query.

use super::action::{Move, MoveError};
use super::position::Coord;
use super::types::{BoardModel, Constraint, GameState, GameStatus, Mark, MetaCell, SubBoard};
use tracing::{debug, instrument, warn};

/// The 8 three-in-a-row lines of a 3x3 grid.
pub const LINES: [[Coord; 3]; 8] = [
    // Rows
    [Coord::at(0, 0), Coord::at(0, 1), Coord::at(0, 2)],
    [Coord::at(1, 0), Coord::at(1, 1), Coord::at(1, 2)],
    [Coord::at(2, 0), Coord::at(2, 1), Coord::at(2, 2)],
    // Columns
    [Coord::at(0, 0), Coord::at(1, 0), Coord::at(2, 0)],
    [Coord::at(0, 1), Coord::at(1, 1), Coord::at(2, 1)],
    [Coord::at(0, 2), Coord::at(1, 2), Coord::at(2, 2)],
    // Diagonals
    [Coord::at(0, 0), Coord::at(1, 1), Coord::at(2, 2)],
    [Coord::at(0, 2), Coord::at(1, 1), Coord::at(2, 0)],
];

/// Returns the mark owning all three values of a line, if any.
pub fn line_winner(triple: [Option<Mark>; 3]) -> Option<Mark> {
    match triple {
        [Some(a), Some(b), Some(c)] if a == b && b == c => Some(a),
        _ => None,
    }
}

/// Finds a three-in-a-row on any 3x3 grid.
///
/// `read` yields the mark held at a coordinate. The same routine serves
/// cells inside a sub-board and meta-cells on the meta-board.
pub fn grid_winner(read: impl Fn(Coord) -> Option<Mark>) -> Option<Mark> {
    LINES
        .iter()
        .find_map(|&[a, b, c]| line_winner([read(a), read(b), read(c)]))
}

/// Returns the terminal outcome of a sub-board, or `None` while it is open.
pub fn sub_board_outcome(sub_board: &SubBoard) -> Option<MetaCell> {
    if let Some(winner) = grid_winner(|cell| sub_board.get(cell).mark()) {
        Some(MetaCell::WonBy(winner))
    } else if sub_board.is_full() {
        Some(MetaCell::Drawn)
    } else {
        None
    }
}

/// Returns the winner of the meta-board, if any.
pub fn meta_winner(board: &BoardModel) -> Option<Mark> {
    grid_winner(|sub| board.meta(sub).winner())
}

/// Derives the game status from the meta-board alone.
#[instrument(skip(board))]
pub fn board_status(board: &BoardModel) -> GameStatus {
    if let Some(winner) = meta_winner(board) {
        GameStatus::Won(winner)
    } else if board.all_closed() {
        GameStatus::Drawn
    } else {
        GameStatus::InProgress
    }
}

/// Derives the constraint for the next mover from the cell just played.
///
/// The cell's coordinate names the next sub-board; if that sub-board is
/// closed the next mover may choose freely.
pub fn derive_constraint(board: &BoardModel, played_cell: Coord) -> Constraint {
    board.meta(played_cell).is_open().then_some(played_cell)
}

/// Checks whether `actor` may play `mv` in `state`.
///
/// # Errors
///
/// Checks run in order: [`MoveError::GameOver`], [`MoveError::WrongTurn`],
/// [`MoveError::BoardClosed`], [`MoveError::ConstraintViolation`],
/// [`MoveError::CellOccupied`].
#[instrument(skip(state), fields(current = %state.current_player()))]
pub fn validate_move(state: &GameState, actor: Mark, mv: Move) -> Result<(), MoveError> {
    if state.status().is_terminal() {
        return Err(MoveError::GameOver);
    }
    if actor != state.current_player() {
        return Err(MoveError::WrongTurn(actor));
    }
    if !state.board().meta(mv.sub()).is_open() {
        return Err(MoveError::BoardClosed(mv.sub()));
    }
    if let Some(required) = state.constraint()
        && required != mv.sub()
    {
        return Err(MoveError::ConstraintViolation {
            required,
            attempted: mv.sub(),
        });
    }
    if !state.board().sub_board(mv.sub()).is_empty(mv.cell()) {
        return Err(MoveError::CellOccupied(mv));
    }
    Ok(())
}

/// Applies a validated move for the current player and returns the new state.
///
/// Sets the cell, closes the sub-board if it became terminal, then resolves
/// the meta-board: a meta line wins the game, a fully decided meta-board
/// draws it, otherwise the next constraint is derived from the cell played.
/// The turn passes to the opponent after every applied move.
///
/// Callers must run [`validate_move`] first.
#[instrument(skip(state), fields(player = %state.current_player(), mv = %mv))]
pub fn apply_move(state: &GameState, mv: Move) -> GameState {
    let mut next = state.clone();
    let mover = state.current_player();

    match next.board.place(mv, mover) {
        Ok(MetaCell::Open) => {}
        Ok(outcome) => debug!(sub = %mv.sub(), ?outcome, "Sub-board closed"),
        Err(error) => {
            warn!(%error, "Refusing to apply an unvalidated move");
            return next;
        }
    }

    next.status = board_status(&next.board);
    next.constraint = match next.status {
        GameStatus::InProgress => derive_constraint(&next.board, mv.cell()),
        GameStatus::Won(_) | GameStatus::Drawn => None,
    };
    next.current_player = mover.opponent();
    next
}

/// Returns the sub-boards the current player may play in.
pub fn legal_boards(state: &GameState) -> Vec<Coord> {
    if state.status().is_terminal() {
        return Vec::new();
    }
    match state.constraint() {
        Some(sub) => vec![sub],
        None => state.board().open_boards().collect(),
    }
}

/// Returns every legal move for the current player.
pub fn legal_moves(state: &GameState) -> Vec<Move> {
    legal_boards(state)
        .into_iter()
        .flat_map(|sub| {
            state
                .board()
                .sub_board(sub)
                .empty_cells()
                .map(move |cell| Move::new(sub, cell))
        })
        .collect()
}
