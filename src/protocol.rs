//! JSON wire messages exchanged over the WebSocket channel.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`;
//! events without a payload omit `data`.

use crate::games::ultimate::{GameState, Mark, Move, MoveError};
use crate::room::{ConnectionId, RoomId, RoomKind, RoomPhase, Scores};
use serde::{Deserialize, Serialize};

/// Client → server intents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a matched room or start a bot room.
    ChooseRoom(RoomKind),
    /// Play a move.
    MakeMove(MoveRequest),
    /// Reset the game in the current room.
    RestartGame,
}

/// Raw move coordinates as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Sub-board row.
    #[serde(alias = "row")]
    pub sub_row: usize,
    /// Sub-board column.
    #[serde(alias = "col")]
    pub sub_col: usize,
    /// Cell row inside the sub-board.
    pub cell_row: usize,
    /// Cell column inside the sub-board.
    pub cell_col: usize,
}

impl TryFrom<MoveRequest> for Move {
    type Error = MoveError;

    fn try_from(req: MoveRequest) -> Result<Self, Self::Error> {
        Move::from_indices(req.sub_row, req.sub_col, req.cell_row, req.cell_col)
    }
}

/// Server → client notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The mark bound to this connection.
    PlayerRole(Mark),
    /// No room could take this connection; the server closes it.
    GameFull,
    /// Full room state after every change.
    GameState(Box<Snapshot>),
    /// A player left the room.
    PlayerDisconnected(ConnectionId),
    /// A move was rejected. Only sent when explicit rejections are enabled.
    MoveRejected {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// Full room state as broadcast to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Room id.
    pub room_id: RoomId,
    /// Board, turn, constraint and status.
    #[serde(flatten)]
    pub state: GameState,
    /// Room phase.
    pub phase: RoomPhase,
    /// Score tally.
    pub scores: Scores,
}
