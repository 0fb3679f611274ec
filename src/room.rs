//! One authoritative game room.
//!
//! A [`Room`] owns the game state, binds connections to marks, and walks the
//! phase machine `Forming → Active → Terminal → Closed`. Every mutation goes
//! through the rules engine and is followed by a broadcast to the bound
//! connections. The room never blocks: outbound messages are queued on each
//! connection's unbounded channel.

use crate::bot::{self, BotDecision};
use crate::games::ultimate::rules::{apply_move, validate_move};
use crate::games::ultimate::{GameState, GameStatus, Mark, Move, MoveError};
use crate::protocol::{ServerMessage, Snapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

/// Outbound message queue of one connection.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Identity of one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("conn-{}", _0)]
pub struct ConnectionId(pub u64);

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity of one room. Ids come from a monotonic counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("room-{}", _0)]
pub struct RoomId(pub u64);

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind of room a client asks to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoomKind {
    /// Two remote players paired by matchmaking.
    #[serde(alias = "multiplayer")]
    Matched,
    /// One remote player against the bot.
    Bot,
}

/// Lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    /// Waiting for players.
    Forming,
    /// Both marks bound, game in progress.
    Active,
    /// Game won or drawn; moves are rejected until a restart.
    Terminal,
    /// Every player left; the room is gone from the registry.
    Closed,
}

/// Room-level failures.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum RoomError {
    /// No mark is available for a newcomer.
    #[display("Room is full")]
    RoomFull,
    /// The room does not exist or has closed.
    #[display("Room not found")]
    RoomNotFound,
    /// The connection is not bound in this room.
    #[display("Connection is not seated in this room")]
    NotSeated,
    /// The connection is already bound to a room.
    #[display("Connection is already seated")]
    AlreadySeated,
    /// The room is still waiting for its second player.
    #[display("Waiting for an opponent")]
    WaitingForOpponent,
    /// Restart requested before the game started.
    #[display("Restart is only allowed once the game has started")]
    RestartNotAllowed,
    /// The rules engine rejected the move.
    #[display("{}", _0)]
    Move(MoveError),
}

impl std::error::Error for RoomError {}

impl From<MoveError> for RoomError {
    fn from(error: MoveError) -> Self {
        RoomError::Move(error)
    }
}

/// Per-room tally of finished games, kept across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    /// Games won by First.
    pub first: u32,
    /// Games won by Second.
    pub second: u32,
    /// Drawn games.
    pub draws: u32,
}

impl Scores {
    fn record(&mut self, status: GameStatus) {
        match status {
            GameStatus::Won(Mark::First) => self.first += 1,
            GameStatus::Won(Mark::Second) => self.second += 1,
            GameStatus::Drawn => self.draws += 1,
            GameStatus::InProgress => {}
        }
    }
}

/// Read-only view of a room for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id.
    pub id: RoomId,
    /// Room kind.
    pub kind: RoomKind,
    /// Current phase.
    pub phase: RoomPhase,
    /// Marks bound to remote players.
    pub marks: Vec<Mark>,
    /// Game status.
    pub status: GameStatus,
}

#[derive(Debug)]
struct Seat {
    conn: ConnectionId,
    mark: Mark,
    outbox: Outbox,
}

/// A single game instance and the connections bound to it.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    kind: RoomKind,
    phase: RoomPhase,
    game: GameState,
    seats: Vec<Seat>,
    bot_mark: Option<Mark>,
    generation: u64,
    scores: Scores,
    pending_bot: Option<AbortHandle>,
    rng: StdRng,
}

impl Room {
    /// Creates an empty room in the `Forming` phase with an entropy-seeded bot.
    pub fn new(id: RoomId, kind: RoomKind) -> Self {
        Self::seeded(id, kind, None)
    }

    /// Creates an empty room whose bot RNG derives from `bot_seed` and the
    /// room id, so a room's bot replies depend only on its own history.
    #[instrument]
    pub fn seeded(id: RoomId, kind: RoomKind, bot_seed: Option<u64>) -> Self {
        let rng = match bot_seed {
            Some(seed) => {
                StdRng::seed_from_u64(seed ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            None => StdRng::from_entropy(),
        };
        info!(room_id = %id, %kind, seeded = bot_seed.is_some(), "Creating room");
        Self {
            id,
            kind,
            phase: RoomPhase::Forming,
            game: GameState::new(),
            seats: Vec::new(),
            bot_mark: (kind == RoomKind::Bot).then_some(Mark::Second),
            generation: 0,
            scores: Scores::default(),
            pending_bot: None,
            rng,
        }
    }

    /// Returns the room id.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Returns the room kind.
    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Returns the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Returns the game state.
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Returns the generation counter, bumped on every restart and close.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the score tally.
    pub fn scores(&self) -> Scores {
        self.scores
    }

    /// Returns the mark bound to a connection.
    pub fn mark_of(&self, conn: ConnectionId) -> Option<Mark> {
        self.seat(conn).map(|seat| seat.mark)
    }

    /// Returns the number of remote players bound.
    pub fn seated(&self) -> usize {
        self.seats.len()
    }

    /// Checks whether matchmaking may bind a newcomer here.
    pub fn is_joinable(&self) -> bool {
        self.kind == RoomKind::Matched && self.phase == RoomPhase::Forming && self.seats.len() < 2
    }

    /// Builds the full state snapshot sent to clients.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            room_id: self.id,
            state: self.game.clone(),
            phase: self.phase,
            scores: self.scores,
        }
    }

    /// Builds a listing summary.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            kind: self.kind,
            phase: self.phase,
            marks: self.seats.iter().map(|seat| seat.mark).collect(),
            status: self.game.status(),
        }
    }

    /// Binds a connection to the next free mark.
    ///
    /// The newcomer receives its role, then every bound connection receives
    /// the current state. A bot room binds First and becomes `Active`
    /// immediately; a matched room becomes `Active` once Second is bound.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomFull`] when the room is past `Forming` or both marks
    /// are bound; [`RoomError::AlreadySeated`] if the connection is bound here.
    #[instrument(skip(self, outbox), fields(room_id = %self.id))]
    pub fn seat_player(&mut self, conn: ConnectionId, outbox: Outbox) -> Result<Mark, RoomError> {
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomNotFound);
        }
        if self.seat(conn).is_some() {
            return Err(RoomError::AlreadySeated);
        }
        if self.phase != RoomPhase::Forming || self.seats.len() >= 2 {
            warn!(%conn, seated = self.seats.len(), phase = %self.phase, "Room is full");
            return Err(RoomError::RoomFull);
        }

        let mark = match self.kind {
            RoomKind::Bot => Mark::First,
            RoomKind::Matched if self.seats.iter().any(|seat| seat.mark == Mark::First) => {
                Mark::Second
            }
            RoomKind::Matched => Mark::First,
        };

        info!(%conn, %mark, "Seating player");
        if outbox.send(ServerMessage::PlayerRole(mark)).is_err() {
            debug!(%conn, "Outbox closed");
        }
        self.seats.push(Seat { conn, mark, outbox });

        if self.kind == RoomKind::Bot || self.seats.len() == 2 {
            self.phase = RoomPhase::Active;
            info!("Room is active");
        }

        self.broadcast_state();
        Ok(mark)
    }

    /// Validates and applies a move for a bound connection.
    ///
    /// # Errors
    ///
    /// [`RoomError::Move`] when the rules engine rejects the move; the state
    /// is unchanged and nothing is broadcast.
    #[instrument(skip(self), fields(room_id = %self.id, mv = %mv))]
    pub fn play(&mut self, conn: ConnectionId, mv: Move) -> Result<(), RoomError> {
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomNotFound);
        }
        let mark = self.mark_of(conn).ok_or(RoomError::NotSeated)?;
        if self.phase == RoomPhase::Forming {
            return Err(RoomError::WaitingForOpponent);
        }

        validate_move(&self.game, mark, mv).inspect_err(|error| {
            warn!(%conn, %mark, %error, "Rejected move");
        })?;
        self.commit(mv);
        Ok(())
    }

    /// Resets the game in place, keeping the bindings and the score tally.
    ///
    /// Any pending bot move is cancelled and the generation is bumped so a
    /// bot task that already fired becomes stale.
    ///
    /// # Errors
    ///
    /// [`RoomError::RestartNotAllowed`] while the room is `Forming`.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn restart(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        if self.phase == RoomPhase::Closed {
            return Err(RoomError::RoomNotFound);
        }
        if self.seat(conn).is_none() {
            return Err(RoomError::NotSeated);
        }
        if self.phase == RoomPhase::Forming {
            return Err(RoomError::RestartNotAllowed);
        }

        self.invalidate_bot();
        self.game = GameState::new();
        self.phase = RoomPhase::Active;
        info!(%conn, generation = self.generation, "Game restarted");
        self.broadcast_state();
        Ok(())
    }

    /// Unbinds a connection and returns the room's phase afterwards.
    ///
    /// Remaining players are told who left. The mark is not offered to new
    /// arrivals. The room closes when nobody is left, and a bot room closes
    /// as soon as its only remote player leaves.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn leave(&mut self, conn: ConnectionId) -> Result<RoomPhase, RoomError> {
        let index = self
            .seats
            .iter()
            .position(|seat| seat.conn == conn)
            .ok_or(RoomError::NotSeated)?;
        let seat = self.seats.remove(index);
        info!(%conn, mark = %seat.mark, remaining = self.seats.len(), "Player left");

        if self.kind == RoomKind::Bot || self.seats.is_empty() {
            self.close();
        } else {
            self.broadcast(&ServerMessage::PlayerDisconnected(conn));
        }
        Ok(self.phase)
    }

    /// Returns the generation to schedule a bot move for, if the bot is to move.
    pub fn bot_turn(&self) -> Option<u64> {
        let bot = self.bot_mark?;
        (self.phase == RoomPhase::Active
            && self.game.status() == GameStatus::InProgress
            && self.game.current_player() == bot)
            .then_some(self.generation)
    }

    /// Records the task that will fire the pending bot move.
    pub fn set_pending_bot(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.pending_bot.replace(handle) {
            previous.abort();
        }
    }

    /// Plays the bot's move if `generation` is still current.
    ///
    /// Returns `None` when the request is stale (the room restarted or
    /// closed since it was scheduled) or the bot is not to move.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn play_bot(&mut self, generation: u64) -> Option<BotDecision> {
        if generation != self.generation {
            debug!(expected = self.generation, generation, "Discarding stale bot move");
            return None;
        }
        self.pending_bot = None;
        self.bot_turn()?;
        let bot = self.bot_mark?;

        let decision = bot::select_move(&self.game, bot, &mut self.rng)?;
        if let Err(error) = validate_move(&self.game, bot, decision.mv) {
            warn!(%error, mv = %decision.mv, "Bot produced an illegal move");
            return None;
        }
        info!(mv = %decision.mv, tier = %decision.tier, "Bot moved");
        self.commit(decision.mv);
        Some(decision)
    }

    /// Sends a message to one bound connection.
    pub fn send_to(&self, conn: ConnectionId, message: ServerMessage) {
        if let Some(seat) = self.seat(conn)
            && seat.outbox.send(message).is_err()
        {
            debug!(%conn, "Outbox closed");
        }
    }

    fn seat(&self, conn: ConnectionId) -> Option<&Seat> {
        self.seats.iter().find(|seat| seat.conn == conn)
    }

    fn commit(&mut self, mv: Move) {
        self.game = apply_move(&self.game, mv);
        let status = self.game.status();
        if status.is_terminal() {
            self.scores.record(status);
            self.phase = RoomPhase::Terminal;
            info!(?status, scores = ?self.scores, "Game over");
        }
        self.broadcast_state();
    }

    fn close(&mut self) {
        self.invalidate_bot();
        self.phase = RoomPhase::Closed;
        info!(room_id = %self.id, "Room closed");
    }

    fn invalidate_bot(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending_bot.take() {
            handle.abort();
        }
    }

    fn broadcast_state(&self) {
        self.broadcast(&ServerMessage::GameState(Box::new(self.snapshot())));
    }

    fn broadcast(&self, message: &ServerMessage) {
        for seat in &self.seats {
            if seat.outbox.send(message.clone()).is_err() {
                debug!(conn = %seat.conn, "Outbox closed");
            }
        }
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_bot.take() {
            handle.abort();
        }
    }
}
