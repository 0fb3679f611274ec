//! Ultimate tic-tac-toe: board model, moves and rules engine.

mod action;
mod position;
pub mod rules;
mod types;

pub use action::{Move, MoveError};
pub use position::Coord;
pub use types::{BoardModel, Constraint, GameState, GameStatus, Mark, MetaCell, Square, SubBoard};
