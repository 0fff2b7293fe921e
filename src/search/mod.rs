use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::prelude::*;

pub mod alpha_beta;
pub mod common;
pub mod iterate;
pub mod move_ordering;
pub mod move_picker;
pub mod root;
pub mod smp;
pub mod tree;
pub mod tt;

#[cfg(test)]
mod tests;

pub use common::{SearchConfig, SearchLimits, SearchResult, SearchStats};
pub use root::{RootMove, RootMoveList};
pub use tt::TranspositionTable;

use alpha_beta::Worker;
use smp::{Shared, SplitArena, TerminateOnDrop};
use tree::TreePool;

/// Deep recursion with nested split points needs more than the default 2MB
const HELPER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Multi-threaded search engine.
///
/// Owns everything that outlives a single search: the transposition table,
/// the split arena and one pool of working trees per thread. The caller's
/// thread runs the root as thread 0, helpers are scoped to each search.
#[derive(Debug)]
pub struct Engine {
    /// Search params
    config: SearchConfig,
    /// External deps
    evaluator: Box<dyn Evaluator>,
    stop: Arc<AtomicBool>,
    /// Shared between threads
    tt: TranspositionTable,
    arena: SplitArena,
    /// Per thread, index is the thread id
    pools: Vec<TreePool>,
    /// Hashes of the positions played before the root, oldest first
    game_history: Vec<u64>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::build(SearchConfig::default(), Box::new(CompositeEvaluator::balanced()))
    }
}

impl Engine {
    pub fn new(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(CompositeEvaluator::balanced())))
    }

    pub fn with_evaluator(config: SearchConfig, evaluator: Box<dyn Evaluator>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, evaluator))
    }

    fn build(config: SearchConfig, evaluator: Box<dyn Evaluator>) -> Self {
        debug!(
            "Engine: {} threads, {} slots each, {}MB hash, eval {}",
            config.threads,
            config.slots_per_thread,
            config.hash_size_mb,
            evaluator.name()
        );
        Self {
            tt: TranspositionTable::new(config.hash_size_mb),
            arena: SplitArena::new(config.threads, config.slots_per_thread),
            pools: Self::make_pools(&config),
            config,
            evaluator,
            stop: Arc::new(AtomicBool::new(false)),
            game_history: Vec::new(),
        }
    }

    fn make_pools(config: &SearchConfig) -> Vec<TreePool> {
        (0..config.threads.max(1))
            .map(|thread| TreePool::new(thread, config.slots_per_thread))
            .collect()
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }

    /// Applies a new configuration. Hash and thread layout are only rebuilt
    /// when they change.
    pub fn set_config(&mut self, config: SearchConfig) -> Result<()> {
        config.validate()?;
        if config.hash_size_mb != self.config.hash_size_mb {
            self.tt.resize(config.hash_size_mb);
        }
        if config.threads != self.config.threads
            || config.slots_per_thread != self.config.slots_per_thread
        {
            self.arena = SplitArena::new(config.threads, config.slots_per_thread);
            self.pools = Self::make_pools(&config);
            debug!(
                "Rebuilt thread layout: {} threads x {} slots",
                config.threads, config.slots_per_thread
            );
        }
        self.config = config;
        Ok(())
    }

    pub fn set_evaluator(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    /// Flag checked by every thread. Setting it ends the current search with
    /// the best move found so far.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Forgets everything learned: hash entries, killers and history
    pub fn clear(&mut self) {
        self.tt.clear();
        self.pools = Self::make_pools(&self.config);
        self.game_history.clear();
    }

    /// Positions played before the root, used for repetition detection
    pub fn set_game_history(&mut self, hashes: &[u64]) {
        self.game_history.clear();
        self.game_history.extend_from_slice(hashes);
    }

    pub fn hash_full(&self) -> u16 {
        self.tt.hash_full()
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    #[instrument(skip_all, fields(threads = self.config.threads))]
    pub fn search(&mut self, board: &Board, limits: SearchLimits) -> SearchResult {
        debug!(
            "Searching '{}' with max_depth: {:?}, max_time: {:?}, max_nodes: {:?}",
            board.to_fen(),
            limits.max_depth,
            limits.max_time,
            limits.max_nodes
        );
        self.stop.store(false, Ordering::Release);
        self.tt.new_search();
        self.arena.reset();

        let Self {
            config,
            evaluator,
            stop,
            tt,
            arena,
            pools,
            game_history,
        } = self;

        let shared = Shared::new(*config, limits, tt, arena, &**evaluator, stop);
        let helpers = shared.threads - 1;
        let Some((main_pool, helper_pools)) = pools.split_first_mut() else {
            error!("Engine has no thread pools");
            return SearchResult::default();
        };
        let Some(mut root) = main_pool.acquire() else {
            error!("No free tree for the root");
            return SearchResult::default();
        };
        root.reset_for_search(board, game_history);

        let result = thread::scope(|scope| {
            for (offset, pool) in helper_pools.iter_mut().take(helpers).enumerate() {
                let id = offset + 1;
                let shared = &shared;
                let spawned = thread::Builder::new()
                    .name(format!("search-{id}"))
                    .stack_size(HELPER_STACK_SIZE)
                    .spawn_scoped(scope, move || {
                        Worker::new(id, shared, pool).wait_for_work(None, None);
                    });
                if let Err(e) = spawned {
                    warn!("Could not start search thread {id}: {e}");
                }
            }

            let _terminate = TerminateOnDrop(&shared.terminate);
            Worker::new(0, &shared, &mut *main_pool).iterate(&mut root)
        });
        main_pool.release(root);

        info!(
            "Search finished: depth {}, score {}, nodes {}, {:?}",
            result.depth, result.score, result.nodes_searched, result.time_taken
        );
        result
    }
}
