//! Young-brothers-wait parallel search.
//!
//! Any thread may turn the node it is searching into a split point once at
//! least one move has been searched there. Idle threads scan the arena for
//! joinable split points, copy the position into a tree from their own pool
//! and claim the remaining moves one at a time under the node lock. The
//! splitting thread keeps working: it attaches a child of its own, then helps
//! elsewhere until the last helper has detached.
//!
//! Lock order is global coordination lock, then parent node, then child
//! node, then the root move list.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;
use parking_lot::Mutex;

use crate::prelude::*;
use crate::search::alpha_beta::Worker;
use crate::search::move_ordering::SearchTables;
use crate::search::move_picker::MovePicker;
use crate::search::root::RootMoveList;
use crate::search::tree::{NodeId, SearchTree, SplitParams};
use crate::search::tt::TranspositionTable;

/// Where the moves of a node come from
#[derive(Debug)]
pub(crate) enum MoveSource {
    Picker(MovePicker),
    /// The shared root move list
    Root,
    /// Handed over to a split point
    Done,
}

impl MoveSource {
    pub(crate) fn next(
        &mut self,
        board: &Board,
        tables: &SearchTables,
        root_moves: &Mutex<RootMoveList>,
    ) -> Option<Move> {
        match self {
            MoveSource::Picker(picker) => picker.next(board, tables),
            MoveSource::Root => root_moves.lock().claim_next(),
            MoveSource::Done => None,
        }
    }
}

/// Snapshot of a node published at split time, plus the results merged
/// back by finished children.
#[derive(Debug)]
pub(crate) struct SplitFrame {
    pub board: Board,
    pub repetition: Vec<u64>,
    pub tables: Box<SearchTables>,
    pub ply: usize,
    pub depth: i32,
    pub alpha: i32,
    pub beta: i32,
    pub in_check: bool,
    /// Best value so far, only ever raised
    pub value: i32,
    pub best_move: Move,
    pub pv: Vec<Move>,
    pub moves: MoveSource,
    /// Moves handed out, counting those searched before the split
    pub searched: usize,
    pub stats: SearchStats,
}

/// State of the node at the moment its owner decides to split
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitPoint {
    pub ply: usize,
    pub depth: i32,
    pub alpha: i32,
    pub beta: i32,
    pub in_check: bool,
    pub best_move: Move,
    pub moves_done: usize,
}

#[derive(Debug)]
pub(crate) struct SplitState {
    /// Child attached by each thread, indexed by thread id
    pub siblings: Vec<Option<NodeId>>,
    pub frame: Option<Box<SplitFrame>>,
}

/// The shared half of a working tree. Flags are read without the lock by
/// threads looking for work.
#[derive(Debug)]
pub(crate) struct SearchNode {
    pub joinable: AtomicBool,
    pub joined: AtomicBool,
    pub stop: AtomicBool,
    pub nprocs: AtomicUsize,
    pub ply: AtomicUsize,
    pub depth: AtomicI32,
    pub searched: AtomicUsize,
    pub state: Mutex<SplitState>,
}

impl SearchNode {
    fn new(threads: usize) -> Self {
        Self {
            joinable: AtomicBool::new(false),
            joined: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            nprocs: AtomicUsize::new(0),
            ply: AtomicUsize::new(0),
            depth: AtomicI32::new(0),
            searched: AtomicUsize::new(0),
            state: Mutex::new(SplitState {
                siblings: vec![None; threads],
                frame: None,
            }),
        }
    }

    /// Back to private. Only called by the owner while nobody can reach the node.
    fn reset(&self) {
        self.joinable.store(false, Ordering::Relaxed);
        self.joined.store(false, Ordering::Relaxed);
        self.stop.store(false, Ordering::Relaxed);
        self.nprocs.store(0, Ordering::Relaxed);
        self.searched.store(0, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.siblings.fill(None);
        state.frame = None;
    }
}

/// Every split block of every thread, indexed by [`NodeId`]
#[derive(Debug)]
pub struct SplitArena {
    nodes: Vec<SearchNode>,
    threads: usize,
    slots_per_thread: usize,
}

impl SplitArena {
    pub fn new(threads: usize, slots_per_thread: usize) -> Self {
        let threads = threads.max(1);
        let slots_per_thread = slots_per_thread.clamp(1, 64);
        Self {
            nodes: (0..threads * slots_per_thread)
                .map(|_| SearchNode::new(threads))
                .collect(),
            threads,
            slots_per_thread,
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn slots_per_thread(&self) -> usize {
        self.slots_per_thread
    }

    #[inline(always)]
    pub(crate) fn node(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }

    #[inline(always)]
    pub fn owner(&self, id: NodeId) -> usize {
        id / self.slots_per_thread
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeId, &SearchNode)> {
        self.nodes.iter().enumerate()
    }

    pub(crate) fn thread_nodes(&self, thread: usize) -> &[SearchNode] {
        let start = thread * self.slots_per_thread;
        &self.nodes[start..start + self.slots_per_thread]
    }

    pub(crate) fn reset(&self) {
        self.nodes.iter().for_each(SearchNode::reset);
    }

    /// Stops `id` and everything working below it. Caller holds the
    /// coordination lock.
    pub(crate) fn stop_subtree(&self, id: NodeId) {
        let node = self.node(id);
        node.stop.store(true, Ordering::Release);
        node.joinable.store(false, Ordering::Release);
        let state = node.state.lock();
        for &sibling in state.siblings.iter().flatten() {
            self.stop_subtree(sibling);
        }
    }
}

/// Everything the threads of one search share
pub(crate) struct Shared<'a> {
    pub config: SearchConfig,
    pub limits: SearchLimits,
    pub tt: &'a TranspositionTable,
    pub arena: &'a SplitArena,
    pub evaluator: &'a dyn Evaluator,
    pub external_stop: &'a AtomicBool,
    pub root_moves: Mutex<RootMoveList>,
    /// Taken before any traversal that spans several nodes
    pub smp_lock: Mutex<()>,
    pub abort: AtomicBool,
    pub terminate: AtomicBool,
    /// An idle thread found nothing to join
    pub split_requested: AtomicBool,
    pub nodes: AtomicU64,
    pub start: Instant,
    pub threads: usize,
}

impl<'a> Shared<'a> {
    pub fn new(
        config: SearchConfig,
        limits: SearchLimits,
        tt: &'a TranspositionTable,
        arena: &'a SplitArena,
        evaluator: &'a dyn Evaluator,
        external_stop: &'a AtomicBool,
    ) -> Self {
        Self {
            threads: config.threads.clamp(1, arena.threads()),
            config,
            limits,
            tt,
            arena,
            evaluator,
            external_stop,
            root_moves: Mutex::new(RootMoveList::default()),
            smp_lock: Mutex::new(()),
            abort: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
            split_requested: AtomicBool::new(false),
            nodes: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Sets `terminate` when the coordinating thread leaves the search, even
/// by unwinding, so the helpers always drain out of the scope.
pub(crate) struct TerminateOnDrop<'a>(pub &'a AtomicBool);

impl Drop for TerminateOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A move handed out by a split point
struct Claim {
    mv: Move,
    /// Best value of the split point at claim time
    floor: i32,
    index: usize,
}

impl Worker<'_> {
    /// Whether the tree must unwind: global abort, or its own node was stopped
    #[inline(always)]
    pub(crate) fn stopped(&self, tree: &SearchTree) -> bool {
        self.shared.abort.load(Ordering::Relaxed)
            || self.shared.arena.node(tree.id).stop.load(Ordering::Relaxed)
    }

    pub(crate) fn should_split(&self, depth: i32, moves_done: usize) -> bool {
        let config = &self.shared.config;
        if self.shared.threads < 2
            || depth < config.min_split_depth
            || moves_done == 0
            || !self.pool.has_free()
        {
            return false;
        }
        if self.unjoined_splits() > config.gratuitous_limit {
            return false;
        }
        self.shared.split_requested.load(Ordering::Relaxed)
            || (depth >= config.gratuitous_depth && moves_done <= 1)
    }

    fn unjoined_splits(&self) -> usize {
        self.shared
            .arena
            .thread_nodes(self.id)
            .iter()
            .filter(|node| {
                node.joinable.load(Ordering::Relaxed) && !node.joined.load(Ordering::Relaxed)
            })
            .count()
    }

    /// Publishes the node as a split point and works on it until every
    /// attached thread has finished. Returns the merged frame, or `None` when
    /// the split could not happen and `moves` is untouched.
    pub(crate) fn try_split(
        &mut self,
        tree: &mut SearchTree,
        point: SplitPoint,
        moves: &mut MoveSource,
    ) -> Option<Box<SplitFrame>> {
        let Some(mut child) = self.pool.acquire() else {
            tree.stats.slot_exhaustions += 1;
            trace!(thread = self.id, "No free slot, split abandoned");
            return None;
        };

        let shared = self.shared;
        let block = shared.arena.node(tree.id);
        {
            let _smp = shared.smp_lock.lock();
            if self.stopped(tree) {
                self.pool.release(child);
                return None;
            }

            let frame = SplitFrame {
                board: tree.board,
                repetition: tree.repetition.clone(),
                tables: tree.tables.clone(),
                ply: point.ply,
                depth: point.depth,
                alpha: point.alpha,
                beta: point.beta,
                in_check: point.in_check,
                value: point.alpha,
                best_move: point.best_move,
                pv: tree.pv.line(point.ply).to_vec(),
                moves: std::mem::replace(moves, MoveSource::Done),
                searched: point.moves_done,
                stats: SearchStats::default(),
            };

            block.ply.store(point.ply, Ordering::Relaxed);
            block.depth.store(point.depth, Ordering::Relaxed);
            block.searched.store(point.moves_done, Ordering::Relaxed);
            block.joined.store(false, Ordering::Relaxed);
            {
                let mut state = block.state.lock();
                state.siblings.fill(None);
                state.frame = Some(Box::new(frame));
                self.attach_locked(tree.id, &mut state, &mut child);
            }
            block.joinable.store(true, Ordering::Release);
        }

        self.shared.split_requested.store(false, Ordering::Relaxed);
        tree.stats.splits += 1;
        trace!(
            thread = self.id,
            node = tree.id,
            ply = point.ply,
            depth = point.depth,
            "Split point published"
        );

        self.wait_for_work(Some(tree.id), Some(child));

        block.joinable.store(false, Ordering::Release);
        if !block.joined.load(Ordering::Acquire) {
            tree.stats.wasted_splits += 1;
        }
        block.state.lock().frame.take()
    }

    /// Copies the split point into `child` and attaches it. The node lock is held.
    fn attach_locked(&self, id: NodeId, state: &mut SplitState, child: &mut SearchTree) -> bool {
        let Some(frame) = state.frame.as_deref() else {
            return false;
        };
        child.board = frame.board;
        child.repetition.clone_from(&frame.repetition);
        child.tables.clone_from(&frame.tables);
        child.parent = Some(id);
        child.split = SplitParams {
            ply: frame.ply,
            depth: frame.depth,
            alpha: frame.alpha,
            beta: frame.beta,
            in_check: frame.in_check,
        };
        child.stats = SearchStats::default();
        child.current_move = [Move::NULL; MAX_PLY];

        self.shared.arena.node(child.id).reset();
        state.siblings[self.id] = Some(child.id);
        self.shared
            .arena
            .node(id)
            .nprocs
            .fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Picks the most interesting joinable split point of another thread and
    /// attaches a fresh tree to it
    pub(crate) fn join(&mut self) -> Option<Box<SearchTree>> {
        if !self.pool.has_free() {
            return None;
        }
        let arena = self.shared.arena;
        let split_group = self.shared.config.split_group;

        let mut best: Option<(NodeId, i32)> = None;
        for (id, node) in arena.iter() {
            if arena.owner(id) == self.id
                || !node.joinable.load(Ordering::Acquire)
                || node.stop.load(Ordering::Relaxed)
            {
                continue;
            }
            let ply = node.ply.load(Ordering::Relaxed) as i32;
            let depth = node.depth.load(Ordering::Relaxed);
            let nprocs = node.nprocs.load(Ordering::Relaxed);
            if !(ply <= depth / 2 || nprocs < split_group) {
                continue;
            }
            let interest = depth * 2 - node.searched.load(Ordering::Relaxed) as i32;
            if best.is_none_or(|(_, top)| interest > top) {
                best = Some((id, interest));
            }
        }

        let Some((id, _)) = best else {
            self.shared.split_requested.store(true, Ordering::Relaxed);
            return None;
        };

        let mut child = self.pool.acquire()?;
        let block = arena.node(id);
        let attached = {
            let mut state = block.state.lock();
            block.joinable.load(Ordering::Acquire)
                && !block.stop.load(Ordering::Acquire)
                && state.siblings[self.id].is_none()
                && self.attach_locked(id, &mut state, &mut child)
        };
        if !attached {
            self.pool.release(child);
            self.shared.split_requested.store(true, Ordering::Relaxed);
            return None;
        }

        block.joined.store(true, Ordering::Release);
        child.stats.joins += 1;
        trace!(thread = self.id, node = id, "Joined split point");
        Some(child)
    }

    /// Idle loop. Helpers run it with no node until the search terminates;
    /// a splitting thread runs it on its own node, starting with its own
    /// child, and returns once the last child has detached.
    pub(crate) fn wait_for_work(&mut self, waiting: Option<NodeId>, mut work: Option<Box<SearchTree>>) {
        let backoff = Backoff::new();
        loop {
            if let Some(child) = work.take() {
                self.work_on(child);
                backoff.reset();
            }

            match waiting {
                Some(id) if self.shared.arena.node(id).nprocs.load(Ordering::Acquire) == 0 => return,
                None if self.shared.terminate.load(Ordering::Acquire) => return,
                _ => {}
            }

            work = self.join();
            if work.is_none() {
                backoff.snooze();
            }
        }
    }

    /// Searches one attached child to completion, hands its result to the
    /// parent and gives the slot back
    fn work_on(&mut self, mut child: Box<SearchTree>) {
        let value = self.search_parallel(&mut child);
        self.flush_nodes(&mut child);

        if let Some(parent) = child.parent.take() {
            let block = self.shared.arena.node(parent);
            let mut state = block.state.lock();
            block.joinable.store(false, Ordering::Release);
            self.copy_to_parent(&mut state, &mut child, value);
            state.siblings[self.id] = None;
            block.nprocs.fetch_sub(1, Ordering::AcqRel);
        }
        self.pool.release(child);
    }

    /// Merges a finished child into its split point. The parent lock is held.
    pub(crate) fn copy_to_parent(&self, state: &mut SplitState, child: &mut SearchTree, value: i32) {
        let Some(frame) = state.frame.as_deref_mut() else {
            return;
        };
        let searched = child.stats.nodes_searched > 0;
        frame.stats += std::mem::take(&mut child.stats);

        let stopped = self.shared.arena.node(child.id).stop.load(Ordering::Acquire);
        if searched
            && !stopped
            && value > frame.value
            && !self.shared.abort.load(Ordering::Acquire)
        {
            frame.value = value;
            frame.pv.clear();
            frame.pv.extend_from_slice(child.pv.line(frame.ply));
            if let Some(&mv) = frame.pv.first() {
                frame.best_move = mv;
            }
            frame.tables.history = child.tables.history;
        }

        if stopped && frame.ply == 0 && !child.current_move[0].is_null() {
            self.shared
                .root_moves
                .lock()
                .clear_searched(child.current_move[0]);
        }
    }

    /// Parallel fail-high: every other thread at this split point stops
    fn abort_siblings(&self, tree: &mut SearchTree, parent: NodeId) {
        let _smp = self.shared.smp_lock.lock();
        let block = self.shared.arena.node(parent);
        block.joinable.store(false, Ordering::Release);
        let state = block.state.lock();
        for &sibling in state.siblings.iter().flatten() {
            if sibling != tree.id {
                self.shared.arena.stop_subtree(sibling);
            }
        }
        tree.stats.parallel_aborts += 1;
    }

    /// Hands out the next move of the split point, or closes it
    fn claim(&self, tree: &SearchTree, parent: NodeId) -> Option<Claim> {
        let block = self.shared.arena.node(parent);
        let mut state = block.state.lock();
        if self.stopped(tree) {
            return None;
        }
        let frame = state.frame.as_deref_mut()?;
        let SplitFrame {
            moves,
            board,
            tables,
            searched,
            value,
            alpha,
            ..
        } = frame;

        match moves.next(board, tables, &self.shared.root_moves) {
            Some(mv) => {
                *searched += 1;
                block.searched.store(*searched, Ordering::Relaxed);
                Some(Claim {
                    mv,
                    floor: (*value).max(*alpha),
                    index: *searched - 1,
                })
            }
            None => {
                block.joinable.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Search of an attached child: claims moves from the split point until
    /// none are left, a sibling cuts off, or the subtree is stopped
    pub(crate) fn search_parallel(&mut self, tree: &mut SearchTree) -> i32 {
        let Some(parent) = tree.parent else {
            return 0;
        };
        let SplitParams {
            ply,
            depth,
            mut alpha,
            beta,
            in_check,
        } = tree.split;
        tree.pv.clear(ply);

        while let Some(claim) = self.claim(tree, parent) {
            tree.current_move[ply] = claim.mv;
            alpha = alpha.max(claim.floor);
            if alpha >= beta {
                break;
            }

            let Some(value) = self.search_move(
                tree,
                ply,
                depth,
                alpha,
                beta,
                in_check,
                claim.mv,
                claim.index.max(1),
            ) else {
                continue;
            };
            if self.stopped(tree) {
                return alpha;
            }

            if value > alpha {
                tree.pv.update(ply, claim.mv);
                if ply == 0 {
                    self.record_root(tree, claim.mv, value, beta);
                }
                if value >= beta {
                    tree.stats.record_cutoff(claim.index);
                    if !claim.mv.is_tactical() {
                        tree.tables.update_killers(ply, claim.mv);
                        tree.tables.update_history(claim.mv, depth);
                    }
                    self.abort_siblings(tree, parent);
                    return beta;
                }
                alpha = value;
            }
        }
        alpha
    }
}
