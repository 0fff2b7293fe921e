//! Iterative deepening with aspiration windows, run by thread 0.

use std::sync::atomic::Ordering;

use crate::prelude::*;
use crate::search::alpha_beta::Worker;
use crate::search::common::mate_in;
use crate::search::root::RootMove;
use crate::search::smp::{MoveSource, SplitPoint};
use crate::search::tree::SearchTree;

/// Half-width of the window around the previous iteration's value
const ASP_WINDOW: i32 = 16;

impl Worker<'_> {
    pub(crate) fn iterate(&mut self, root: &mut SearchTree) -> SearchResult {
        let list = self.order_root_moves(root);
        if list.is_empty() {
            return self.no_legal_moves(root);
        }
        *self.shared.root_moves.lock() = list;

        let max_depth = self.shared.limits.depth_cap();
        let mut completed = 0;
        let mut score = 0;

        for depth in 1..=max_depth {
            self.shared.split_requested.store(true, Ordering::Relaxed);
            self.shared.root_moves.lock().begin_iteration();

            let Some(value) = self.aspiration(root, depth, score) else {
                debug!("Iteration {depth} abandoned");
                break;
            };
            self.shared.root_moves.lock().end_iteration();
            completed = depth;
            score = value;

            if self.shared.config.emit_info {
                self.emit_info(root, depth, value);
            }
            if self.iteration_limit_reached(depth, value) {
                break;
            }
        }

        self.finish(root, completed, score)
    }

    /// Re-searches with a growing window until the value lands inside it.
    /// `None` when the search was stopped first.
    fn aspiration(&mut self, root: &mut SearchTree, depth: i32, previous: i32) -> Option<i32> {
        let (mut alpha, mut beta) = if depth == 1 || !self.shared.config.enable_asp {
            (-MATE_SCORE, MATE_SCORE)
        } else {
            (
                (previous - ASP_WINDOW).max(-MATE_SCORE),
                (previous + ASP_WINDOW).min(MATE_SCORE),
            )
        };
        let mut delta = ASP_WINDOW;

        loop {
            self.shared.root_moves.lock().begin_attempt();
            let value = self.search_root(root, depth, alpha, beta);
            if self.stopped(root) {
                return None;
            }

            if value >= beta && beta < MATE_SCORE {
                root.stats.asp_fail_high += 1;
                root.stats.asp_research += 1;
                debug!("Depth {depth}: fail high {value} >= {beta}");
                beta = if delta > 10 * PAWN_VALUE {
                    MATE_SCORE
                } else {
                    (beta + delta).min(MATE_SCORE)
                };
                delta *= 2;
            } else if value <= alpha && alpha > -MATE_SCORE {
                root.stats.asp_fail_low += 1;
                root.stats.asp_research += 1;
                debug!("Depth {depth}: fail low {value} <= {alpha}");
                self.shared.root_moves.lock().fail_low();
                alpha = if delta > 10 * PAWN_VALUE {
                    -MATE_SCORE
                } else {
                    (alpha - delta).max(-MATE_SCORE)
                };
                delta *= 2;
            } else {
                return Some(value);
            }
        }
    }

    /// One pass over the root moves within `(alpha, beta)`
    pub(crate) fn search_root(&mut self, root: &mut SearchTree, depth: i32, mut alpha: i32, beta: i32) -> i32 {
        let original_alpha = alpha;
        let in_check = root.board.in_check();
        let mut best_move = Move::NULL;
        let mut moves_done = 0;
        let mut moves = MoveSource::Root;
        root.pv.clear(0);

        while let Some(mv) = moves.next(&root.board, &root.tables, &self.shared.root_moves) {
            root.current_move[0] = mv;
            let Some(value) = self.search_move(root, 0, depth, alpha, beta, in_check, mv, moves_done) else {
                continue;
            };
            moves_done += 1;
            if self.stopped(root) {
                return alpha;
            }

            if value > alpha {
                best_move = mv;
                root.pv.update(0, mv);
                self.record_root(root, mv, value, beta);
                if value >= beta {
                    return beta;
                }
                alpha = value;
            }

            // First move failed low, widen before looking at the rest
            if moves_done == 1 && alpha == original_alpha {
                break;
            }

            if self.should_split_root(depth, moves_done, alpha != original_alpha) {
                let point = SplitPoint {
                    ply: 0,
                    depth,
                    alpha,
                    beta,
                    in_check,
                    best_move,
                    moves_done,
                };
                if let Some(frame) = self.try_split(root, point, &mut moves) {
                    let frame = *frame;
                    root.stats += frame.stats;
                    root.tables = frame.tables;
                    if frame.value > alpha && !self.stopped(root) {
                        alpha = frame.value.min(beta);
                        root.pv.set_line(0, &frame.pv);
                    }
                    break;
                }
            }
        }
        alpha
    }

    fn should_split_root(&self, depth: i32, moves_done: usize, alpha_raised: bool) -> bool {
        if !self.shared.config.split_at_root || !alpha_raised {
            return false;
        }
        let next_is_recent_best = self
            .shared
            .root_moves
            .lock()
            .next_unclaimed()
            .is_some_and(|m| m.has(RootMove::BEST_RECENTLY));
        !next_is_recent_best && self.should_split(depth, moves_done)
    }

    fn iteration_limit_reached(&self, depth: i32, value: i32) -> bool {
        if depth > 3 && value.abs() >= MATE_SCORE - depth + 3 {
            debug!("Mate found at depth {depth}");
            return true;
        }
        let soft_limit = self
            .shared
            .limits
            .max_time
            .is_some_and(|max| self.shared.elapsed() >= max / 2);
        if soft_limit {
            debug!("Half of the time budget spent after depth {depth}");
        }
        soft_limit
    }

    fn emit_info(&self, root: &SearchTree, depth: i32, value: i32) {
        let elapsed = self.shared.elapsed();
        let nodes = self.shared.nodes.load(Ordering::Relaxed) + root.unflushed_nodes;
        let nps = nodes * 1000 / elapsed.as_millis().max(1) as u64;
        let score = match mate_in(value) {
            Some(moves) => format!("mate {moves}"),
            None => format!("cp {value}"),
        };
        let pv = self
            .shared
            .root_moves
            .lock()
            .best()
            .map(|m| m.pv.iter().map(Move::uci).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        info!(
            "info depth {depth} score {score} nodes {nodes} nps {nps} time {} pv {pv}",
            elapsed.as_millis()
        );
    }

    fn no_legal_moves(&self, root: &mut SearchTree) -> SearchResult {
        let in_check = root.board.in_check();
        debug!("No legal moves, in check: {in_check}");
        SearchResult {
            best_move: None,
            score: if in_check { -MATE_SCORE } else { DRAW_SCORE },
            depth: 0,
            nodes_searched: root.stats.nodes_searched,
            time_taken: self.shared.elapsed(),
            pv: Vec::new(),
            is_mate: in_check,
            mate_in: in_check.then_some(0),
            stats: root.stats,
        }
    }

    fn finish(&self, root: &mut SearchTree, depth: i32, score: i32) -> SearchResult {
        self.flush_nodes(root);
        let (best_move, pv, fallback) = {
            let root_moves = self.shared.root_moves.lock();
            match root_moves.best() {
                Some(best) => (Some(best.mv), best.pv.clone(), best.score),
                None => (None, Vec::new(), 0),
            }
        };
        // Nothing finished, the ordering score is all there is
        let score = if depth == 0 { fallback } else { score };

        let mut stats = root.stats;
        stats.depth_reached = depth as u8;
        stats.time_elapsed = self.shared.elapsed();
        stats.hash_full = self.shared.tt.hash_full();
        stats.calculate_nps();
        if self.shared.config.collect_stats {
            stats.log_summary();
        }

        SearchResult {
            best_move,
            score,
            depth: depth as u8,
            nodes_searched: stats.nodes_searched,
            time_taken: stats.time_elapsed,
            pv,
            is_mate: mate_in(score).is_some(),
            mate_in: mate_in(score),
            stats,
        }
    }
}
