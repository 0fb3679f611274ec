//! Tests for a single room's phase machine and bindings.

use strictly_ultimate::protocol::ServerMessage;
use strictly_ultimate::rules::legal_moves;
use strictly_ultimate::{
    ConnectionId, Coord, GameState, GameStatus, Mark, Move, MoveError, Room, RoomError, RoomId,
    RoomKind, RoomPhase,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn mv(sub_row: usize, sub_col: usize, cell_row: usize, cell_col: usize) -> Move {
    Move::new(Coord::at(sub_row, sub_col), Coord::at(cell_row, cell_col))
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

fn last_state(messages: &[ServerMessage]) -> Option<GameState> {
    messages.iter().rev().find_map(|message| match message {
        ServerMessage::GameState(snapshot) => Some(snapshot.state.clone()),
        _ => None,
    })
}

/// A matched room with First on conn 1 and Second on conn 2.
fn active_room() -> (Room, UnboundedReceiver<ServerMessage>, UnboundedReceiver<ServerMessage>) {
    let mut room = Room::new(RoomId(1), RoomKind::Matched);
    let (tx1, rx1) = mpsc::unbounded_channel();
    let (tx2, rx2) = mpsc::unbounded_channel();
    room.seat_player(ConnectionId(1), tx1).unwrap();
    room.seat_player(ConnectionId(2), tx2).unwrap();
    (room, rx1, rx2)
}

#[test]
fn test_second_join_activates_and_third_is_refused() {
    let mut room = Room::new(RoomId(1), RoomKind::Matched);
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    let (tx3, _rx3) = mpsc::unbounded_channel();

    assert_eq!(room.seat_player(ConnectionId(1), tx1), Ok(Mark::First));
    assert_eq!(room.phase(), RoomPhase::Forming);
    assert!(room.is_joinable());

    assert_eq!(room.seat_player(ConnectionId(2), tx2), Ok(Mark::Second));
    assert_eq!(room.phase(), RoomPhase::Active);
    assert!(!room.is_joinable());

    assert_eq!(room.seat_player(ConnectionId(3), tx3), Err(RoomError::RoomFull));
    assert_eq!(room.seated(), 2);

    let first = drain(&mut rx1);
    assert_eq!(first[0], ServerMessage::PlayerRole(Mark::First));
    assert_eq!(first.len(), 3, "role plus one state per join");

    let second = drain(&mut rx2);
    assert_eq!(second[0], ServerMessage::PlayerRole(Mark::Second));
    assert_eq!(last_state(&second), Some(GameState::new()));
}

#[test]
fn test_moves_wait_for_an_opponent() {
    let mut room = Room::new(RoomId(1), RoomKind::Matched);
    let (tx, _rx) = mpsc::unbounded_channel();
    room.seat_player(ConnectionId(1), tx).unwrap();

    assert_eq!(
        room.play(ConnectionId(1), mv(1, 1, 1, 1)),
        Err(RoomError::WaitingForOpponent)
    );
    assert_eq!(room.restart(ConnectionId(1)), Err(RoomError::RestartNotAllowed));
}

#[test]
fn test_play_broadcasts_to_both_players() {
    let (mut room, mut rx1, mut rx2) = active_room();
    drain(&mut rx1);
    drain(&mut rx2);

    room.play(ConnectionId(1), mv(0, 0, 1, 1)).unwrap();

    let state = last_state(&drain(&mut rx1)).unwrap();
    assert_eq!(state.current_player(), Mark::Second);
    assert_eq!(state.constraint(), Some(Coord::at(1, 1)));
    assert_eq!(last_state(&drain(&mut rx2)), Some(state));
}

#[test]
fn test_rejected_moves_change_nothing() {
    let (mut room, mut rx1, _rx2) = active_room();
    drain(&mut rx1);

    assert_eq!(
        room.play(ConnectionId(2), mv(1, 1, 1, 1)),
        Err(RoomError::Move(MoveError::WrongTurn(Mark::Second)))
    );
    assert_eq!(room.play(ConnectionId(9), mv(1, 1, 1, 1)), Err(RoomError::NotSeated));
    assert_eq!(room.game(), &GameState::new());
    assert!(drain(&mut rx1).is_empty());
}

#[test]
fn test_finished_game_is_scored_and_restartable() {
    let (mut room, _rx1, _rx2) = active_room();
    let conn_for = |mark: Mark| match mark {
        Mark::First => ConnectionId(1),
        Mark::Second => ConnectionId(2),
    };

    while !room.game().status().is_terminal() {
        let next = legal_moves(room.game())[0];
        room.play(conn_for(room.game().current_player()), next).unwrap();
    }
    assert_eq!(room.phase(), RoomPhase::Terminal);

    let scores = room.scores();
    let recorded = match room.game().status() {
        GameStatus::Won(Mark::First) => scores.first,
        GameStatus::Won(Mark::Second) => scores.second,
        GameStatus::Drawn => scores.draws,
        GameStatus::InProgress => unreachable!(),
    };
    assert_eq!(recorded, 1);
    assert_eq!(scores.first + scores.second + scores.draws, 1);

    let mover = conn_for(room.game().current_player());
    assert_eq!(
        room.play(mover, mv(1, 1, 1, 1)),
        Err(RoomError::Move(MoveError::GameOver))
    );

    room.restart(ConnectionId(2)).unwrap();
    assert_eq!(room.phase(), RoomPhase::Active);
    assert_eq!(room.game(), &GameState::new());
    assert_eq!(room.generation(), 1);
    assert_eq!(room.scores(), scores);
}

#[test]
fn test_leaving_notifies_then_closes() {
    let (mut room, _rx1, mut rx2) = active_room();
    drain(&mut rx2);

    assert_eq!(room.leave(ConnectionId(1)), Ok(RoomPhase::Active));
    assert_eq!(
        drain(&mut rx2),
        vec![ServerMessage::PlayerDisconnected(ConnectionId(1))]
    );
    assert!(!room.is_joinable());

    assert_eq!(room.leave(ConnectionId(2)), Ok(RoomPhase::Closed));
    assert_eq!(room.generation(), 1);
    assert_eq!(room.play(ConnectionId(2), mv(0, 0, 0, 0)), Err(RoomError::RoomNotFound));
}

#[test]
fn test_bot_room_answers_and_drops_stale_turns() {
    let mut room = Room::seeded(RoomId(7), RoomKind::Bot, Some(42));
    let (tx, mut rx) = mpsc::unbounded_channel();

    assert_eq!(room.seat_player(ConnectionId(1), tx), Ok(Mark::First));
    assert_eq!(room.phase(), RoomPhase::Active);
    assert_eq!(room.bot_turn(), None);

    room.play(ConnectionId(1), mv(1, 1, 0, 0)).unwrap();
    let generation = room.bot_turn().unwrap();

    let decision = room.play_bot(generation).unwrap();
    assert_eq!(decision.mv.sub(), Coord::at(0, 0));
    assert_eq!(room.game().current_player(), Mark::First);
    assert_eq!(room.bot_turn(), None);

    room.play(ConnectionId(1), legal_moves(room.game())[0]).unwrap();
    let stale = room.bot_turn().unwrap();
    room.restart(ConnectionId(1)).unwrap();
    assert!(room.play_bot(stale).is_none());
    assert_eq!(room.game(), &GameState::new());

    let messages = drain(&mut rx);
    assert_eq!(messages[0], ServerMessage::PlayerRole(Mark::First));
    assert_eq!(last_state(&messages), Some(GameState::new()));

    assert_eq!(room.leave(ConnectionId(1)), Ok(RoomPhase::Closed));
}

/// Plays `plies` human moves (first legal move each time) and collects the
/// bot's replies.
fn bot_replies(room: &mut Room, plies: usize) -> Vec<Move> {
    let mut replies = Vec::new();
    for _ in 0..plies {
        if room.game().status().is_terminal() {
            break;
        }
        let next = legal_moves(room.game())[0];
        room.play(ConnectionId(1), next).unwrap();
        let Some(generation) = room.bot_turn() else {
            break;
        };
        replies.push(room.play_bot(generation).unwrap().mv);
    }
    replies
}

fn seeded_bot_room(id: u64) -> (Room, UnboundedReceiver<ServerMessage>) {
    let mut room = Room::seeded(RoomId(id), RoomKind::Bot, Some(17));
    let (tx, rx) = mpsc::unbounded_channel();
    room.seat_player(ConnectionId(1), tx).unwrap();
    (room, rx)
}

#[test]
fn test_seeded_bot_is_reproducible_per_room() {
    let (mut first, _rx1) = seeded_bot_room(2);
    let (mut second, _rx2) = seeded_bot_room(2);
    assert_eq!(bot_replies(&mut first, 6), bot_replies(&mut second, 6));
}
