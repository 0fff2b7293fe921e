//! Negamax with alpha-beta pruning, run by every search thread.
//! Also implements various standard techniques like:
//! - Principal Variation Search
//! - Late Move Reduction
//! - Null Move Pruning (with verification)
//! - Check extensions
//! - Quiescence search with delta pruning

use std::sync::atomic::Ordering;

use crate::prelude::*;
use crate::search::common::adjust_score_from_ply;
use crate::search::move_picker::MovePicker;
use crate::search::smp::{MoveSource, Shared, SplitPoint};
use crate::search::tree::{SearchTree, TreePool};
use crate::search::tt::ScoreTypes;

const DELTA_MARGIN: i32 = 200;

/// One search thread. Owns its pool of working trees for the duration of a
/// search and shares everything else.
pub(crate) struct Worker<'a> {
    pub id: usize,
    pub shared: &'a Shared<'a>,
    pub pool: &'a mut TreePool,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, shared: &'a Shared<'a>, pool: &'a mut TreePool) -> Self {
        Self { id, shared, pool }
    }

    #[inline(always)]
    fn evaluate(&self, tree: &SearchTree) -> i32 {
        self.shared.evaluator.evaluate(&tree.board)
    }

    #[inline(always)]
    fn count_node(&self, tree: &mut SearchTree) {
        tree.stats.nodes_searched += 1;
        tree.unflushed_nodes += 1;
        if tree.unflushed_nodes >= self.shared.config.poll_interval {
            self.poll(tree);
        }
    }

    /// Publishes the local node count and checks every reason to stop
    pub(crate) fn poll(&self, tree: &mut SearchTree) {
        let total = self.flush_nodes(tree);
        if self.shared.abort.load(Ordering::Relaxed) {
            return;
        }
        let limits = &self.shared.limits;
        let stop_requested = self.shared.external_stop.load(Ordering::Acquire);
        let out_of_time = limits
            .max_time
            .is_some_and(|max| self.shared.elapsed() >= max);
        let out_of_nodes = limits.max_nodes.is_some_and(|max| total >= max);

        if stop_requested || out_of_time || out_of_nodes {
            debug!(
                thread = self.id,
                stop_requested, out_of_time, out_of_nodes, "Aborting search"
            );
            self.shared.abort.store(true, Ordering::Release);
        }
    }

    pub(crate) fn flush_nodes(&self, tree: &mut SearchTree) -> u64 {
        let delta = std::mem::take(&mut tree.unflushed_nodes);
        self.shared.nodes.fetch_add(delta, Ordering::Relaxed) + delta
    }

    #[inline(always)]
    fn is_draw(&self, tree: &SearchTree) -> bool {
        tree.board.halfmove_clock >= 100 || tree.is_repetition()
    }

    /// Skipped at the root and near the fifty-move horizon, where the bound
    /// would depend on the path
    fn store(&self, tree: &SearchTree, ply: usize, depth: i32, score: i32, mv: Move, bound: ScoreTypes) {
        if ply == 0 || tree.board.halfmove_clock as i32 + depth >= 100 {
            return;
        }
        self.shared.tt.store(
            tree.board.hash,
            mv,
            adjust_score_from_ply(score, ply),
            depth,
            bound,
        );
    }

    /// Interior node. The move leading here is already made on `tree.board`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search(
        &mut self,
        tree: &mut SearchTree,
        ply: usize,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        in_check: bool,
        do_null: bool,
    ) -> i32 {
        self.count_node(tree);
        if self.stopped(tree) {
            return alpha;
        }

        if ply > 0 && self.is_draw(tree) {
            tree.stats.draw_returns += 1;
            return DRAW_SCORE;
        }

        // Mate distance pruning
        alpha = alpha.max(-MATE_SCORE + ply as i32);
        beta = beta.min(MATE_SCORE - ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }

        if ply >= MAX_PLY - 1 {
            return self.evaluate(tree);
        }

        if depth <= 0 {
            return self.quiesce(tree, ply, 0, alpha, beta);
        }

        tree.stats.main_search_nodes += 1;

        let mut hash_move = Move::NULL;
        if ply > 0 {
            tree.stats.tt_probes += 1;
            if let Some(entry) = self.shared.tt.probe(tree.board.hash) {
                tree.stats.tt_hits += 1;
                hash_move = entry.best_move;
                if let Some(hit) = entry.validate(depth, alpha, beta, ply) {
                    tree.stats.tt_cutoffs += 1;
                    return hit.score;
                }
            }
        }

        let shared = self.shared;
        let config = &shared.config;
        if do_null
            && config.enable_nmp
            && !in_check
            && beta - alpha == 1
            && ply > 0
            && depth >= config.null_min_depth
            && tree.board.has_non_pawn_material(tree.board.stm)
            && let Some(score) = self.null_move(tree, ply, depth, beta)
        {
            return score;
        }

        let original_alpha = alpha;
        let mut best_move = Move::NULL;
        let mut moves_done = 0;
        let mut moves = MoveSource::Picker(MovePicker::new(hash_move, ply));
        tree.pv.clear(ply);

        while let Some(mv) = moves.next(&tree.board, &tree.tables, &self.shared.root_moves) {
            tree.current_move[ply] = mv;
            let Some(value) =
                self.search_move(tree, ply, depth, alpha, beta, in_check, mv, moves_done)
            else {
                continue;
            };
            moves_done += 1;
            if self.stopped(tree) {
                return alpha;
            }

            if value > alpha {
                best_move = mv;
                tree.pv.update(ply, mv);
                if value >= beta {
                    self.fail_high(tree, ply, depth, beta, mv, moves_done - 1);
                    return beta;
                }
                alpha = value;
            }

            if self.should_split(depth, moves_done) {
                let point = SplitPoint {
                    ply,
                    depth,
                    alpha,
                    beta,
                    in_check,
                    best_move,
                    moves_done,
                };
                if let Some(frame) = self.try_split(tree, point, &mut moves) {
                    let frame = *frame;
                    tree.stats += frame.stats;
                    tree.tables = frame.tables;
                    if self.stopped(tree) {
                        return alpha;
                    }
                    if frame.value > alpha {
                        alpha = frame.value;
                        best_move = frame.best_move;
                        tree.pv.set_line(ply, &frame.pv);
                    }
                    if alpha >= beta {
                        self.fail_high(tree, ply, depth, beta, best_move, frame.searched);
                        return beta;
                    }
                    break;
                }
            }
        }

        if moves_done == 0 {
            tree.stats.mate_returns += 1;
            return if in_check {
                -MATE_SCORE + ply as i32
            } else {
                DRAW_SCORE
            };
        }

        let bound = if alpha > original_alpha {
            tree.stats.exact_scores += 1;
            ScoreTypes::Exact
        } else {
            tree.stats.fail_lows += 1;
            ScoreTypes::UpperBound
        };
        self.store(tree, ply, depth, alpha, best_move, bound);
        alpha
    }

    /// Beta cutoff bookkeeping: quiet moves become killers and gain history
    fn fail_high(&self, tree: &mut SearchTree, ply: usize, depth: i32, beta: i32, mv: Move, index: usize) {
        tree.stats.record_cutoff(index);
        if !mv.is_null() && !mv.is_tactical() {
            tree.tables.update_killers(ply, mv);
            tree.tables.update_history(mv, depth);
        }
        self.store(tree, ply, depth, beta, mv, ScoreTypes::LowerBound);
    }

    /// Makes `mv`, searches it and takes it back.
    /// Returns `None` when the move leaves its own king in check.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search_move(
        &mut self,
        tree: &mut SearchTree,
        ply: usize,
        depth: i32,
        alpha: i32,
        beta: i32,
        in_check: bool,
        mv: Move,
        moves_done: usize,
    ) -> Option<i32> {
        let us = tree.board.stm;
        let undo = tree.board.make_move(mv);
        if tree.board.is_in_check(us) {
            tree.board.unmake_move(mv, undo);
            return None;
        }
        tree.push_position();

        let gives_check = tree.board.in_check();
        let extension = i32::from(self.shared.config.enable_extensions && gives_check);
        let new_depth = depth - 1 + extension;

        let value = if moves_done == 0 {
            -self.search(tree, ply + 1, new_depth, -beta, -alpha, gives_check, true)
        } else {
            let reduction = if self.should_reduce(depth, moves_done, mv, in_check, gives_check) {
                tree.stats.lmr_attempts += 1;
                lmr_reduction(depth, moves_done).clamp(1, (new_depth - 1).max(1))
            } else {
                0
            };

            let mut value = -self.search(
                tree,
                ply + 1,
                new_depth - reduction,
                -alpha - 1,
                -alpha,
                gives_check,
                true,
            );
            if reduction > 0 && value > alpha && !self.stopped(tree) {
                tree.stats.lmr_research += 1;
                value = -self.search(tree, ply + 1, new_depth, -alpha - 1, -alpha, gives_check, true);
            }
            if value > alpha && value < beta && !self.stopped(tree) {
                value = -self.search(tree, ply + 1, new_depth, -beta, -alpha, gives_check, true);
            }
            value
        };

        tree.pop_position();
        tree.board.unmake_move(mv, undo);
        Some(value)
    }

    /// Null move pruning. A fail-high deep enough is verified by a reduced
    /// search without the null move before it is trusted.
    fn null_move(&mut self, tree: &mut SearchTree, ply: usize, depth: i32, beta: i32) -> Option<i32> {
        let config = self.shared.config;
        let reduction = config.null_base + depth / config.null_divisor;
        tree.stats.null_move_attempts += 1;

        let undo = tree.board.make_null_move();
        tree.push_position();
        let value = -self.search(tree, ply + 1, depth - 1 - reduction, -beta, -beta + 1, false, false);
        tree.pop_position();
        tree.board.unmake_null_move(undo);

        if self.stopped(tree) || value < beta {
            return None;
        }

        if depth >= config.null_verify_depth {
            tree.stats.null_move_verifications += 1;
            let verified = self.search(tree, ply, depth - reduction, beta - 1, beta, false, false);
            if verified < beta || self.stopped(tree) {
                return None;
            }
        }

        tree.stats.null_move_cutoffs += 1;
        Some(beta)
    }

    #[inline]
    fn should_reduce(&self, depth: i32, moves_done: usize, mv: Move, in_check: bool, gives_check: bool) -> bool {
        let config = &self.shared.config;
        config.enable_lmr
            && depth >= config.lmr_min_depth
            && moves_done > config.lmr_min_moves
            && !mv.is_tactical()
            && !in_check
            && !gives_check
    }

    /// Captures until the position is quiet. `qply` counts plies below the
    /// horizon; quiet checks are only tried at the first one.
    pub(crate) fn quiesce(&mut self, tree: &mut SearchTree, ply: usize, qply: usize, mut alpha: i32, beta: i32) -> i32 {
        self.count_node(tree);
        if self.stopped(tree) {
            return alpha;
        }
        if ply >= MAX_PLY - 1 {
            return self.evaluate(tree);
        }
        tree.stats.qsearch_nodes += 1;

        if tree.board.in_check() {
            return self.quiesce_evasions(tree, ply, qply, alpha, beta);
        }

        let stand_pat = self.evaluate(tree);
        if stand_pat >= beta {
            tree.stats.standpat_returns += 1;
            return beta;
        }
        alpha = alpha.max(stand_pat);

        let enable_delta = self.shared.config.enable_delta;
        let mut picker = MovePicker::captures(ply);
        while let Some(mv) = picker.next(&tree.board, &tree.tables) {
            if enable_delta && !mv.is_promotion() {
                let gain = tree.board.victim(mv).map_or(0, |piece| piece.value());
                if stand_pat + gain + DELTA_MARGIN < alpha {
                    tree.stats.delta_pruning_cutoffs += 1;
                    continue;
                }
            }

            let Some(value) = self.quiesce_move(tree, ply, qply, mv, alpha, beta, false) else {
                continue;
            };
            if self.stopped(tree) {
                return alpha;
            }
            if value >= beta {
                tree.stats.beta_cutoffs_qs += 1;
                return beta;
            }
            alpha = alpha.max(value);
        }

        if qply == 0 && self.shared.config.qsearch_checks {
            let mut quiets = MoveBuffer::new();
            tree.board.generate_quiets(&mut quiets);
            for &mv in quiets.iter() {
                let Some(value) = self.quiesce_move(tree, ply, qply, mv, alpha, beta, true) else {
                    continue;
                };
                if self.stopped(tree) {
                    return alpha;
                }
                if value >= beta {
                    tree.stats.beta_cutoffs_qs += 1;
                    return beta;
                }
                alpha = alpha.max(value);
            }
        }

        alpha
    }

    /// Every legal reply to a check. None means mate.
    fn quiesce_evasions(&mut self, tree: &mut SearchTree, ply: usize, qply: usize, mut alpha: i32, beta: i32) -> i32 {
        let mut picker = MovePicker::new(Move::NULL, ply);
        let mut legal = 0;
        while let Some(mv) = picker.next(&tree.board, &tree.tables) {
            let Some(value) = self.quiesce_move(tree, ply, qply, mv, alpha, beta, false) else {
                continue;
            };
            legal += 1;
            if self.stopped(tree) {
                return alpha;
            }
            if value >= beta {
                tree.stats.beta_cutoffs_qs += 1;
                return beta;
            }
            alpha = alpha.max(value);
        }

        if legal == 0 {
            tree.stats.mate_returns += 1;
            return (-MATE_SCORE + ply as i32).max(alpha).min(beta);
        }
        alpha
    }

    /// `None` for illegal moves, and for non-checking moves when `checks_only`
    #[allow(clippy::too_many_arguments)]
    fn quiesce_move(
        &mut self,
        tree: &mut SearchTree,
        ply: usize,
        qply: usize,
        mv: Move,
        alpha: i32,
        beta: i32,
        checks_only: bool,
    ) -> Option<i32> {
        let us = tree.board.stm;
        let undo = tree.board.make_move(mv);
        if tree.board.is_in_check(us) || (checks_only && !tree.board.in_check()) {
            tree.board.unmake_move(mv, undo);
            return None;
        }
        tree.push_position();
        let value = -self.quiesce(tree, ply + 1, qply + 1, -beta, -alpha);
        tree.pop_position();
        tree.board.unmake_move(mv, undo);
        Some(value)
    }
}

/// Late Move Reduction
#[inline]
pub(crate) fn lmr_reduction(depth: i32, moves_done: usize) -> i32 {
    let base = 0.20 + ((depth as f32).ln() * (moves_done as f32).ln()) / 3.35;
    base as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_grow_with_depth_and_move_count() {
        assert_eq!(lmr_reduction(3, 1), 0);
        assert!(lmr_reduction(12, 30) > lmr_reduction(4, 4));
        assert!(lmr_reduction(20, 40) >= 3);
    }
}
