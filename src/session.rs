//! Room management: registry, matchmaking and per-room dispatch.
//!
//! The registry is the only structure shared across rooms. It maps room ids
//! to rooms (each behind its own lock) and connections to the room they are
//! bound to. Inserting and removing rooms happens under the registry lock,
//! so joins and disconnects never observe a half-created or half-removed
//! room. Moves only hold the registry lock long enough to find their room.
//!
//! Lock order is always registry, then room. Each room owns its bot RNG.

use crate::config::ServerConfig;
use crate::games::ultimate::{Mark, Move};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{ConnectionId, Outbox, Room, RoomError, RoomId, RoomKind, RoomPhase, RoomSummary};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Whether the transport should keep a connection open after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Close the connection.
    Close,
}

/// Tunables the room manager reads from the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Delay before the bot plays.
    pub think_delay: Duration,
    /// Maximum number of matched rooms alive at once.
    pub max_matched_rooms: usize,
    /// Answer rejected moves with `moveRejected`.
    pub explicit_rejections: bool,
    /// Base seed for each room's bot RNG.
    pub bot_seed: Option<u64>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RoomSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            think_delay: config.bot_think_delay(),
            max_matched_rooms: *config.max_matched_rooms(),
            explicit_rejections: *config.explicit_rejections(),
            bot_seed: *config.bot_seed(),
        }
    }
}

type SharedRoom = Arc<Mutex<Room>>;

#[derive(Debug)]
struct Connection {
    outbox: Outbox,
    room: Option<RoomId>,
}

#[derive(Debug, Default)]
struct Registry {
    rooms: BTreeMap<RoomId, SharedRoom>,
    connections: HashMap<ConnectionId, Connection>,
    next_room: u64,
}

impl Registry {
    fn create_room(&mut self, kind: RoomKind, bot_seed: Option<u64>) -> (RoomId, SharedRoom) {
        self.next_room += 1;
        let id = RoomId(self.next_room);
        let room = Arc::new(Mutex::new(Room::seeded(id, kind, bot_seed)));
        self.rooms.insert(id, Arc::clone(&room));
        (id, room)
    }

    fn room_of(&self, conn: ConnectionId) -> Result<SharedRoom, RoomError> {
        self.connections
            .get(&conn)
            .and_then(|connection| connection.room)
            .and_then(|id| self.rooms.get(&id))
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    fn matched_rooms(&self) -> usize {
        self.rooms
            .values()
            .filter(|room| lock(room).kind() == RoomKind::Matched)
            .count()
    }
}

#[derive(Debug)]
struct Shared {
    registry: Mutex<Registry>,
    settings: RoomSettings,
    next_connection: AtomicU64,
}

/// Owns every room for the lifetime of the server.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct RoomManager {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RoomManager {
    /// Creates a room manager with the given settings.
    #[instrument]
    pub fn new(settings: RoomSettings) -> Self {
        info!("Creating room manager");
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                settings,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the active settings.
    pub fn settings(&self) -> &RoomSettings {
        &self.shared.settings
    }

    /// Registers a new connection and its outbound queue.
    #[instrument(skip(self, outbox))]
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let conn = ConnectionId(self.shared.next_connection.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.registry)
            .connections
            .insert(conn, Connection { outbox, room: None });
        info!(%conn, "Connection registered");
        conn
    }

    /// Dispatches one client message.
    ///
    /// Errors are handled here: rejected moves are dropped (or answered with
    /// `moveRejected` when configured), and a full server closes the
    /// connection after `gameFull`.
    #[instrument(skip(self))]
    pub fn handle(&self, conn: ConnectionId, message: ClientMessage) -> Flow {
        match message {
            ClientMessage::ChooseRoom(kind) => match self.join(conn, kind) {
                Ok(_) => Flow::Continue,
                Err(RoomError::RoomFull) => Flow::Close,
                Err(error) => {
                    warn!(%conn, %error, "Join failed");
                    Flow::Continue
                }
            },
            ClientMessage::MakeMove(request) => {
                match Move::try_from(request) {
                    Ok(mv) => {
                        if let Err(error) = self.make_move(conn, mv) {
                            debug!(%conn, %error, "Move dropped");
                        }
                    }
                    Err(error) => {
                        warn!(%conn, %error, ?request, "Malformed move");
                        self.reject(conn, &error.to_string());
                    }
                }
                Flow::Continue
            }
            ClientMessage::RestartGame => {
                if let Err(error) = self.restart(conn) {
                    warn!(%conn, %error, "Restart refused");
                }
                Flow::Continue
            }
        }
    }

    /// Binds a connection to a room of the requested kind.
    ///
    /// Matched joins take the oldest `Forming` matched room with a free mark,
    /// or create a new one. Bot joins always create a new room.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomFull`] when no matched room can take the connection
    /// and the matched-room capacity is exhausted; `gameFull` has already
    /// been sent. [`RoomError::AlreadySeated`] if the connection is bound.
    #[instrument(skip(self))]
    pub fn join(&self, conn: ConnectionId, kind: RoomKind) -> Result<(RoomId, Mark), RoomError> {
        let mut registry = lock(&self.shared.registry);
        let connection = registry.connections.get(&conn).ok_or(RoomError::RoomNotFound)?;
        if connection.room.is_some() {
            warn!(%conn, "Connection already seated");
            return Err(RoomError::AlreadySeated);
        }
        let outbox = connection.outbox.clone();

        let existing = match kind {
            RoomKind::Matched => registry
                .rooms
                .iter()
                .find(|(_, room)| lock(room).is_joinable())
                .map(|(id, room)| (*id, Arc::clone(room))),
            RoomKind::Bot => None,
        };

        let (id, room) = match existing {
            Some(found) => found,
            None => {
                if kind == RoomKind::Matched
                    && registry.matched_rooms() >= self.shared.settings.max_matched_rooms
                {
                    let limit = self.shared.settings.max_matched_rooms;
                    warn!(%conn, limit, "No room available");
                    if outbox.send(ServerMessage::GameFull).is_err() {
                        debug!(%conn, "Outbox closed");
                    }
                    return Err(RoomError::RoomFull);
                }
                registry.create_room(kind, self.shared.settings.bot_seed)
            }
        };

        let mark = lock(&room).seat_player(conn, outbox)?;
        if let Some(connection) = registry.connections.get_mut(&conn) {
            connection.room = Some(id);
        }
        info!(%conn, room_id = %id, %mark, "Joined room");
        Ok((id, mark))
    }

    /// Validates and applies a move, then schedules the bot if it is to move.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomNotFound`] if the connection is not in a room, or the
    /// room's rejection. A rejected move leaves the room untouched.
    #[instrument(skip(self), fields(mv = %mv))]
    pub fn make_move(&self, conn: ConnectionId, mv: Move) -> Result<(), RoomError> {
        let room = lock(&self.shared.registry).room_of(conn)?;
        let mut room = lock(&room);
        match room.play(conn, mv) {
            Ok(()) => {
                self.schedule_bot(&mut room);
                Ok(())
            }
            Err(error) => {
                if self.shared.settings.explicit_rejections {
                    room.send_to(conn, rejection(&error));
                }
                Err(error)
            }
        }
    }

    /// Restarts the game in the connection's room.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomNotFound`] if the connection is not in a room, or
    /// [`RoomError::RestartNotAllowed`] while the room is still forming.
    #[instrument(skip(self))]
    pub fn restart(&self, conn: ConnectionId) -> Result<(), RoomError> {
        let room = lock(&self.shared.registry).room_of(conn)?;
        let mut room = lock(&room);
        room.restart(conn)?;
        self.schedule_bot(&mut room);
        Ok(())
    }

    /// Forgets a connection, unbinding it from its room.
    ///
    /// A room left without players is removed from the registry in the same
    /// critical section.
    #[instrument(skip(self))]
    pub fn disconnect(&self, conn: ConnectionId) {
        let mut registry = lock(&self.shared.registry);
        let Some(connection) = registry.connections.remove(&conn) else {
            debug!(%conn, "Unknown connection");
            return;
        };
        info!(%conn, "Connection closed");

        let Some(id) = connection.room else {
            return;
        };
        let Some(room) = registry.rooms.get(&id).cloned() else {
            return;
        };

        let phase = lock(&room).leave(conn);
        match phase {
            Ok(RoomPhase::Closed) => {
                registry.rooms.remove(&id);
                info!(room_id = %id, rooms = registry.rooms.len(), "Room removed");
            }
            Ok(phase) => debug!(room_id = %id, %phase, "Room kept"),
            Err(error) => warn!(room_id = %id, %error, "Leave failed"),
        }
    }

    /// Lists every live room in creation order.
    #[instrument(skip(self))]
    pub fn rooms(&self) -> Vec<RoomSummary> {
        lock(&self.shared.registry)
            .rooms
            .values()
            .map(|room| lock(room).summary())
            .collect()
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        lock(&self.shared.registry).rooms.len()
    }

    fn reject(&self, conn: ConnectionId, reason: &str) {
        if !self.shared.settings.explicit_rejections {
            return;
        }
        let registry = lock(&self.shared.registry);
        if let Some(connection) = registry.connections.get(&conn) {
            let message = ServerMessage::MoveRejected {
                reason: reason.to_string(),
            };
            if connection.outbox.send(message).is_err() {
                debug!(%conn, "Outbox closed");
            }
        }
    }

    /// Spawns the think-delay task when the bot is to move.
    ///
    /// The task carries the room generation it was scheduled for; a restart
    /// or close bumps the generation and aborts the task.
    fn schedule_bot(&self, room: &mut Room) {
        let Some(generation) = room.bot_turn() else {
            return;
        };
        let id = room.id();
        let delay = self.shared.settings.think_delay;
        let manager = self.clone();
        debug!(room_id = %id, generation, ?delay, "Scheduling bot move");

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.fire_bot(id, generation);
        });
        room.set_pending_bot(task.abort_handle());
    }

    #[instrument(skip(self))]
    fn fire_bot(&self, id: RoomId, generation: u64) {
        let Some(room) = lock(&self.shared.registry).rooms.get(&id).cloned() else {
            debug!(room_id = %id, "Room closed before bot moved");
            return;
        };
        let mut room = lock(&room);
        if room.play_bot(generation).is_some() {
            self.schedule_bot(&mut room);
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}

fn rejection(error: &RoomError) -> ServerMessage {
    ServerMessage::MoveRejected {
        reason: error.to_string(),
    }
}
