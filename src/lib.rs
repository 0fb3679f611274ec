//! Strictly Ultimate - authoritative ultimate tic-tac-toe server
//!
//! Ultimate tic-tac-toe is a 3x3 grid of 3x3 sub-boards; the cell a player
//! picks decides which sub-board the opponent must play in next.
//!
//! # Architecture
//!
//! - **Games**: board model and rules engine (legality, sub-board and
//!   meta-board outcomes, next-board constraint)
//! - **Bot**: block / win / safe-move heuristic with one-ply lookahead
//! - **Room**: one authoritative game, its mark bindings and phase machine
//! - **Session**: room registry, matchmaking and bot scheduling
//! - **Server**: axum WebSocket transport speaking [`protocol`] messages
//!
//! # Example
//!
//! ```no_run
//! use strictly_ultimate::{ServerConfig, serve};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_port(4000);
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bot;
mod config;
mod games;
pub mod protocol;
mod room;
mod server;
mod session;

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Bot
pub use bot::{BotDecision, Tier, is_unsafe, select_move, wins_sub_board};

// Crate-level exports - Rooms and sessions
pub use room::{
    ConnectionId, Outbox, Room, RoomError, RoomId, RoomKind, RoomPhase, RoomSummary, Scores,
};
pub use session::{Flow, RoomManager, RoomSettings};

// Crate-level exports - Server
pub use server::{router, serve};

// Crate-level exports - Game types
pub use games::ultimate::rules;
pub use games::ultimate::{
    BoardModel, Constraint, Coord, GameState, GameStatus, Mark, MetaCell, Move, MoveError, Square,
    SubBoard,
};
