//! Tests for the ultimate tic-tac-toe rules engine.

use strictly_ultimate::rules::{apply_move, legal_boards, legal_moves, validate_move};
use strictly_ultimate::{BoardModel, Coord, GameState, GameStatus, Mark, MetaCell, Move, MoveError};

const X: Mark = Mark::First;
const O: Mark = Mark::Second;

/// A full sub-board with no line: X O X / X O O / O X X.
const DRAW_PATTERN: [[Mark; 3]; 3] = [[X, O, X], [X, O, O], [O, X, X]];

fn mv(sub_row: usize, sub_col: usize, cell_row: usize, cell_col: usize) -> Move {
    Move::new(Coord::at(sub_row, sub_col), Coord::at(cell_row, cell_col))
}

fn play(state: &GameState, mv: Move) -> GameState {
    validate_move(state, state.current_player(), mv).unwrap();
    apply_move(state, mv)
}

fn win_sub_board(board: &mut BoardModel, sub: Coord, mark: Mark) {
    for col in 0..3 {
        board.place(Move::new(sub, Coord::at(0, col)), mark).unwrap();
    }
}

fn draw_sub_board(board: &mut BoardModel, sub: Coord, skip: Option<Coord>) {
    for cell in Coord::ALL {
        if Some(cell) != skip {
            board
                .place(Move::new(sub, cell), DRAW_PATTERN[cell.row()][cell.col()])
                .unwrap();
        }
    }
}

#[test]
fn test_first_move_sets_constraint_and_turn() {
    let state = play(&GameState::new(), mv(0, 0, 1, 1));

    assert_eq!(state.constraint(), Some(Coord::at(1, 1)));
    assert_eq!(state.current_player(), Mark::Second);
    assert_eq!(state.status(), GameStatus::InProgress);
    assert_eq!(state.board().meta(Coord::at(0, 0)), MetaCell::Open);
}

#[test]
fn test_turns_alternate() {
    let mut state = GameState::new();
    let moves = [mv(1, 1, 0, 0), mv(0, 0, 2, 2), mv(2, 2, 1, 1), mv(1, 1, 2, 2)];

    for (i, &next) in moves.iter().enumerate() {
        let expected = if i % 2 == 0 { Mark::First } else { Mark::Second };
        assert_eq!(state.current_player(), expected);
        state = play(&state, next);
    }
    assert_eq!(state.current_player(), Mark::First);
}

#[test]
fn test_completing_a_line_wins_the_sub_board() {
    let mut board = BoardModel::new();
    board.place(mv(0, 0, 0, 0), X).unwrap();
    board.place(mv(0, 0, 0, 1), X).unwrap();
    board.place(mv(1, 1, 2, 2), O).unwrap();
    let state = GameState::from_position(board, X, Some(Coord::at(0, 0)));

    let state = play(&state, mv(0, 0, 0, 2));

    assert_eq!(state.board().meta(Coord::at(0, 0)), MetaCell::WonBy(X));
    assert_eq!(state.constraint(), Some(Coord::at(0, 2)));
    assert_eq!(state.status(), GameStatus::InProgress);
}

#[test]
fn test_constraint_freed_when_target_is_closed() {
    let mut board = BoardModel::new();
    win_sub_board(&mut board, Coord::at(2, 2), O);
    let state = GameState::from_position(board, X, None);

    // Cell (2,2) points at the closed sub-board (2,2).
    let state = play(&state, mv(1, 0, 2, 2));

    assert_eq!(state.constraint(), None);
    assert_eq!(legal_boards(&state).len(), 8);
    assert!(legal_moves(&state).iter().all(|m| m.sub() != Coord::at(2, 2)));
}

#[test]
fn test_meta_line_wins_the_game() {
    let mut board = BoardModel::new();
    win_sub_board(&mut board, Coord::at(0, 0), X);
    win_sub_board(&mut board, Coord::at(0, 1), X);
    board.place(mv(0, 2, 1, 0), X).unwrap();
    board.place(mv(0, 2, 1, 1), X).unwrap();
    let state = GameState::from_position(board, X, Some(Coord::at(0, 2)));

    let state = play(&state, mv(0, 2, 1, 2));

    assert_eq!(state.status(), GameStatus::Won(X));
    assert_eq!(state.constraint(), None);
    assert_eq!(state.current_player(), O);
    assert!(legal_moves(&state).is_empty());
    assert_eq!(
        validate_move(&state, O, mv(1, 1, 0, 0)),
        Err(MoveError::GameOver)
    );
}

#[test]
fn test_all_boards_closed_without_meta_line_is_a_draw() {
    let mut board = BoardModel::new();
    for sub in Coord::ALL {
        let skip = (sub == Coord::at(2, 2)).then_some(Coord::at(2, 2));
        draw_sub_board(&mut board, sub, skip);
    }
    let state = GameState::from_position(board, X, Some(Coord::at(2, 2)));
    assert_eq!(state.status(), GameStatus::InProgress);
    assert_eq!(legal_moves(&state), vec![mv(2, 2, 2, 2)]);

    let state = play(&state, mv(2, 2, 2, 2));

    assert_eq!(state.status(), GameStatus::Drawn);
    assert_eq!(state.board().meta(Coord::at(2, 2)), MetaCell::Drawn);
    for candidate in [mv(0, 0, 0, 0), mv(2, 2, 2, 2)] {
        assert_eq!(
            validate_move(&state, state.current_player(), candidate),
            Err(MoveError::GameOver)
        );
    }
}

#[test]
fn test_wrong_turn_is_rejected() {
    let state = GameState::new();
    assert_eq!(
        validate_move(&state, O, mv(1, 1, 1, 1)),
        Err(MoveError::WrongTurn(O))
    );
}

#[test]
fn test_closed_board_is_rejected() {
    let mut board = BoardModel::new();
    win_sub_board(&mut board, Coord::at(0, 0), O);
    let state = GameState::from_position(board, X, None);

    assert_eq!(
        validate_move(&state, X, mv(0, 0, 2, 2)),
        Err(MoveError::BoardClosed(Coord::at(0, 0)))
    );
}

#[test]
fn test_constraint_violation_is_rejected() {
    let state = play(&GameState::new(), mv(0, 0, 1, 1));
    assert_eq!(
        validate_move(&state, O, mv(0, 0, 0, 0)),
        Err(MoveError::ConstraintViolation {
            required: Coord::at(1, 1),
            attempted: Coord::at(0, 0),
        })
    );
}

#[test]
fn test_occupied_cell_is_rejected() {
    let state = play(&GameState::new(), mv(1, 1, 1, 1));
    let err = validate_move(&state, O, mv(1, 1, 1, 1)).unwrap_err();
    assert_eq!(err, MoveError::CellOccupied(mv(1, 1, 1, 1)));
    assert!(err.to_string().contains("occupied"));
}

#[test]
fn test_out_of_range_indices_are_rejected() {
    assert_eq!(Move::from_indices(0, 0, 3, 0), Err(MoveError::OutOfBounds));
    assert_eq!(Move::from_indices(0, 0, 2, 2), Ok(mv(0, 0, 2, 2)));
}

#[test]
fn test_apply_move_leaves_input_untouched() {
    let state = GameState::new();
    let next = apply_move(&state, mv(0, 0, 0, 0));
    assert_eq!(state, GameState::new());
    assert_ne!(next, state);
}

#[test]
fn test_first_legal_move_game_terminates() {
    let mut state = GameState::new();
    let mut plies = 0;

    while !state.status().is_terminal() {
        let moves = legal_moves(&state);
        assert!(!moves.is_empty(), "an ongoing game always has a legal move");
        if let Some(required) = state.constraint() {
            assert!(moves.iter().all(|m| m.sub() == required));
        }
        state = play(&state, moves[0]);
        plies += 1;
        assert!(plies <= 81);
    }
    assert_eq!(state.constraint(), None);
}
