use crate::prelude::*;
use crate::search::alpha_beta::Worker;
use crate::search::tree::SearchTree;

/// Keeps queen promotions ahead of the under-promotions with the same capture
const UNDERPROMOTION_PENALTY: i32 = 50;
const PREVIOUS_BEST_BONUS: i32 = 1_000_000;
/// Iterations a fail-high move stays protected from root splits
const BM_AGE: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMove {
    pub mv: Move,
    pub score: i32,
    pub status: u8,
    pub bm_age: u8,
    pub pv: Vec<Move>,
}

impl RootMove {
    pub const FAILED_LOW: u8 = 1;
    pub const FAILED_HIGH: u8 = 2;
    /// Recently best. No root split before this move has been searched.
    pub const BEST_RECENTLY: u8 = 4;
    /// Claimed by some thread in the current attempt
    pub const SEARCHED: u8 = 8;

    pub fn new(mv: Move, score: i32) -> Self {
        Self {
            mv,
            score,
            status: 0,
            bm_age: 0,
            pv: vec![mv],
        }
    }

    #[inline(always)]
    pub fn has(&self, flag: u8) -> bool {
        self.status & flag != 0
    }
}

/// Legal root moves, best first. Shared by every thread searching the root
/// behind the root lock.
#[derive(Debug, Clone, Default)]
pub struct RootMoveList {
    moves: Vec<RootMove>,
    /// Best value recorded in the current attempt
    best_score: i32,
}

impl RootMoveList {
    pub fn new(moves: Vec<RootMove>) -> Self {
        Self {
            moves,
            best_score: -MATE_SCORE - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[RootMove] {
        &self.moves
    }

    /// Front of the list, the move to play
    pub fn best(&self) -> Option<&RootMove> {
        self.moves.first()
    }

    fn position(&self, mv: Move) -> Option<usize> {
        self.moves.iter().position(|m| m.mv == mv)
    }

    fn move_to_front(&mut self, idx: usize) {
        if idx > 0 {
            let m = self.moves.remove(idx);
            self.moves.insert(0, m);
        }
    }

    pub fn begin_iteration(&mut self) {
        for m in &mut self.moves {
            m.status &= RootMove::BEST_RECENTLY;
        }
    }

    pub fn begin_attempt(&mut self) {
        self.best_score = -MATE_SCORE - 1;
    }

    pub fn end_iteration(&mut self) {
        for m in &mut self.moves {
            m.bm_age = m.bm_age.saturating_sub(1);
            if m.bm_age > 0 {
                m.status |= RootMove::BEST_RECENTLY;
            } else {
                m.status &= !RootMove::BEST_RECENTLY;
            }
        }
    }

    /// Hands out the first move not yet claimed in this attempt
    pub fn claim_next(&mut self) -> Option<Move> {
        let m = self.moves.iter_mut().find(|m| !m.has(RootMove::SEARCHED))?;
        m.status |= RootMove::SEARCHED;
        Some(m.mv)
    }

    pub fn next_unclaimed(&self) -> Option<&RootMove> {
        self.moves.iter().find(|m| !m.has(RootMove::SEARCHED))
    }

    /// Gives an abandoned move back so the next attempt searches it again
    pub fn clear_searched(&mut self, mv: Move) {
        if let Some(idx) = self.position(mv) {
            self.moves[idx].status &= !RootMove::SEARCHED;
        }
    }

    /// `mv` beat the window. It goes first and is searched first in the
    /// re-search.
    pub fn fail_high(&mut self, mv: Move, value: i32, pv: &[Move]) {
        let Some(idx) = self.position(mv) else {
            return;
        };
        let m = &mut self.moves[idx];
        m.status &= !RootMove::SEARCHED;
        m.status |= RootMove::FAILED_HIGH | RootMove::BEST_RECENTLY;
        m.bm_age = BM_AGE;
        m.score = value;
        if !pv.is_empty() {
            m.pv = pv.to_vec();
        }
        self.best_score = self.best_score.max(value);
        self.move_to_front(idx);
    }

    /// Nothing beat alpha. Every move is searched again with the wider window.
    pub fn fail_low(&mut self) {
        for m in &mut self.moves {
            m.status &= !RootMove::SEARCHED;
        }
        if let Some(front) = self.moves.first_mut() {
            front.status |= RootMove::FAILED_LOW;
        }
    }

    /// Returns whether `mv` became the new best move
    pub fn record_best(&mut self, mv: Move, value: i32, pv: &[Move]) -> bool {
        if value <= self.best_score {
            return false;
        }
        let Some(idx) = self.position(mv) else {
            return false;
        };
        self.best_score = value;
        let m = &mut self.moves[idx];
        m.score = value;
        if !pv.is_empty() {
            m.pv = pv.to_vec();
        }
        self.move_to_front(idx);
        true
    }
}

impl Worker<'_> {
    /// Legal root moves, sorted by a full-window quiescence score
    pub(crate) fn order_root_moves(&mut self, root: &mut SearchTree) -> RootMoveList {
        let hint = self
            .shared
            .tt
            .probe(root.board.hash)
            .map_or(Move::NULL, |entry| entry.best_move);

        let mut pseudo = MoveBuffer::new();
        root.board.generate_moves(&mut pseudo);

        let us = root.board.stm;
        let mut moves = Vec::with_capacity(pseudo.len());
        for &mv in pseudo.iter() {
            let undo = root.board.make_move(mv);
            if root.board.is_in_check(us) {
                root.board.unmake_move(mv, undo);
                continue;
            }
            root.push_position();
            let mut score = -self.quiesce(root, 1, 0, -MATE_SCORE, MATE_SCORE);
            root.pop_position();
            root.board.unmake_move(mv, undo);

            if mv.promotion_piece().is_some_and(|piece| piece != Piece::Queen) {
                score -= UNDERPROMOTION_PENALTY;
            }
            if mv == hint {
                score += PREVIOUS_BEST_BONUS;
            }
            moves.push(RootMove::new(mv, score));
        }

        moves.sort_by(|a, b| b.score.cmp(&a.score));
        trace!(
            "Root moves: [{}]",
            moves
                .iter()
                .map(|m| format!("{}:{}", m.mv, m.score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        RootMoveList::new(moves)
    }

    /// Publishes an improving root move found by any thread
    pub(crate) fn record_root(&self, tree: &SearchTree, mv: Move, value: i32, beta: i32) {
        let mut root_moves = self.shared.root_moves.lock();
        if value >= beta {
            root_moves.fail_high(mv, value, tree.pv.line(0));
        } else {
            root_moves.record_best(mv, value, tree.pv.line(0));
        }
    }
}
