//! Heuristic bot for ultimate tic-tac-toe.
//!
//! Selection runs in tiers over the legal moves:
//!
//! 1. **Block** a cell where the opponent would win a sub-board.
//! 2. **Win** a sub-board outright.
//! 3. **Safe** random move.
//! 4. **Fallback** random move when nothing is safe.
//!
//! A move is *unsafe* when, after playing it, the opponent has a legal move
//! that wins a sub-board. Every what-if runs on a cloned state, so the
//! heuristic never touches the room it is advising.

use crate::games::ultimate::rules::{apply_move, legal_moves, sub_board_outcome};
use crate::games::ultimate::{BoardModel, GameState, Mark, MetaCell, Move};
use derive_new::new;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// Heuristic tier that produced a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Tier {
    /// Denied an opponent sub-board win.
    Block,
    /// Won a sub-board.
    Win,
    /// Random move that gives the opponent no sub-board win.
    Safe,
    /// Random legal move.
    Fallback,
}

/// A move chosen by the bot and the tier that chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct BotDecision {
    /// The selected move.
    pub mv: Move,
    /// The tier that selected it.
    pub tier: Tier,
}

/// Checks whether `mark` playing `mv` would win the targeted sub-board.
///
/// Only the targeted sub-board is copied; the board itself is untouched.
pub fn wins_sub_board(board: &BoardModel, mv: Move, mark: Mark) -> bool {
    if !board.meta(mv.sub()).is_open() || !board.sub_board(mv.sub()).is_empty(mv.cell()) {
        return false;
    }
    let mut hypothetical = *board.sub_board(mv.sub());
    hypothetical.set(mv.cell(), mark);
    sub_board_outcome(&hypothetical) == Some(MetaCell::WonBy(mark))
}

/// Checks whether playing `mv` hands the opponent an immediate sub-board win.
///
/// Looks exactly one ply ahead: the opponent's replies are not themselves
/// checked for safety. A move that ends the game is never unsafe.
#[instrument(skip(state), fields(mv = %mv))]
pub fn is_unsafe(state: &GameState, mv: Move) -> bool {
    let after = apply_move(state, mv);
    if after.status().is_terminal() {
        return false;
    }
    let opponent = after.current_player();
    legal_moves(&after)
        .into_iter()
        .any(|reply| wins_sub_board(after.board(), reply, opponent))
}

/// Selects a move for `bot`, or `None` if it is not the bot's turn or no
/// legal move exists.
///
/// Uniform choices draw from `rng`; pass a seeded RNG for reproducible play.
#[instrument(skip(state, rng), fields(current = %state.current_player()))]
pub fn select_move<R: Rng + ?Sized>(
    state: &GameState,
    bot: Mark,
    rng: &mut R,
) -> Option<BotDecision> {
    if state.status().is_terminal() || state.current_player() != bot {
        debug!("Not the bot's turn");
        return None;
    }

    let legal = legal_moves(state);
    if legal.is_empty() {
        return None;
    }

    let board = state.board();
    let opponent = bot.opponent();
    let safe: Vec<Move> = legal.iter().copied().filter(|&mv| !is_unsafe(state, mv)).collect();

    let blocks: Vec<Move> = legal
        .iter()
        .copied()
        .filter(|&mv| wins_sub_board(board, mv, opponent))
        .collect();
    if !blocks.is_empty() {
        let safe_blocks: Vec<Move> = blocks
            .iter()
            .copied()
            .filter(|mv| safe.contains(mv))
            .collect();
        if let Some(&mv) = safe_blocks.choose(rng) {
            debug!(%mv, threats = blocks.len(), "Blocking opponent");
            return Some(BotDecision::new(mv, Tier::Block));
        }
        debug!(threats = blocks.len(), "No safe block available");
    }

    let wins: Vec<Move> = safe
        .iter()
        .copied()
        .filter(|&mv| wins_sub_board(board, mv, bot))
        .collect();
    if let Some(&mv) = wins.choose(rng) {
        debug!(%mv, "Winning sub-board");
        return Some(BotDecision::new(mv, Tier::Win));
    }

    if let Some(&mv) = safe.choose(rng) {
        debug!(%mv, candidates = safe.len(), "Playing safe move");
        return Some(BotDecision::new(mv, Tier::Safe));
    }

    let mv = *legal.choose(rng)?;
    debug!(%mv, candidates = legal.len(), "Every move is unsafe");
    Some(BotDecision::new(mv, Tier::Fallback))
}
