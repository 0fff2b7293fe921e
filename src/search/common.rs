use std::{
    ops::AddAssign,
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::prelude::*;

/// Length of the cutoff-at-move histogram
pub const CUTOFF_SLOTS: usize = 32;

/// Counters collected by every working tree and merged upward
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    // Basic stats
    pub nodes_searched: u64, // Total nodes including qsearch
    pub depth_reached: u8,
    pub time_elapsed: Duration,
    pub nps: u64,
    pub hash_full: u16, // per-mille

    // Node type
    pub main_search_nodes: u64,
    pub qsearch_nodes: u64,

    // Early exits
    pub draw_returns: u64,
    pub mate_returns: u64,
    pub standpat_returns: u64,

    // Transposition table
    pub tt_probes: u64,
    pub tt_hits: u64,
    pub tt_cutoffs: u64,

    // Pruning techniques
    pub null_move_attempts: u64,
    pub null_move_cutoffs: u64,
    pub null_move_verifications: u64,
    pub lmr_attempts: u64,
    pub lmr_research: u64,
    pub delta_pruning_cutoffs: u64,

    // Aspiration windows
    pub asp_fail_high: u64,
    pub asp_fail_low: u64,
    pub asp_research: u64,

    // Alpha-Beta window
    pub beta_cutoffs_main: u64,
    pub beta_cutoffs_qs: u64,
    pub exact_scores: u64,
    pub fail_lows: u64,

    // Move ordering
    pub cutoff_at_move: [u64; CUTOFF_SLOTS],

    // Scheduler
    pub splits: u64,        // Split points published
    pub wasted_splits: u64, // Split points nobody joined
    pub joins: u64,         // Helper attachments
    pub parallel_aborts: u64,
    pub slot_exhaustions: u64,
}

impl AddAssign for SearchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes_searched += rhs.nodes_searched;
        self.depth_reached = self.depth_reached.max(rhs.depth_reached);

        self.main_search_nodes += rhs.main_search_nodes;
        self.qsearch_nodes += rhs.qsearch_nodes;

        self.draw_returns += rhs.draw_returns;
        self.mate_returns += rhs.mate_returns;
        self.standpat_returns += rhs.standpat_returns;

        self.tt_probes += rhs.tt_probes;
        self.tt_hits += rhs.tt_hits;
        self.tt_cutoffs += rhs.tt_cutoffs;

        self.null_move_attempts += rhs.null_move_attempts;
        self.null_move_cutoffs += rhs.null_move_cutoffs;
        self.null_move_verifications += rhs.null_move_verifications;
        self.lmr_attempts += rhs.lmr_attempts;
        self.lmr_research += rhs.lmr_research;
        self.delta_pruning_cutoffs += rhs.delta_pruning_cutoffs;

        self.asp_fail_high += rhs.asp_fail_high;
        self.asp_fail_low += rhs.asp_fail_low;
        self.asp_research += rhs.asp_research;

        self.beta_cutoffs_main += rhs.beta_cutoffs_main;
        self.beta_cutoffs_qs += rhs.beta_cutoffs_qs;
        self.exact_scores += rhs.exact_scores;
        self.fail_lows += rhs.fail_lows;

        for (total, count) in self.cutoff_at_move.iter_mut().zip(rhs.cutoff_at_move) {
            *total += count;
        }

        self.splits += rhs.splits;
        self.wasted_splits += rhs.wasted_splits;
        self.joins += rhs.joins;
        self.parallel_aborts += rhs.parallel_aborts;
        self.slot_exhaustions += rhs.slot_exhaustions;
    }
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn percent(numerator: u64, denominator: u64) -> f64 {
        if denominator == 0 {
            0.0
        } else {
            100.0 * numerator as f64 / denominator as f64
        }
    }

    pub fn calculate_nps(&mut self) {
        let time_ms = self.time_elapsed.as_millis().max(1) as u64;
        self.nps = (self.nodes_searched * 1000) / time_ms;
    }

    #[inline]
    pub fn record_cutoff(&mut self, move_index: usize) {
        self.beta_cutoffs_main += 1;
        if let Some(slot) = self.cutoff_at_move.get_mut(move_index) {
            *slot += 1;
        }
    }

    pub fn avg_cutoff_index(&self) -> f64 {
        let total_cutoffs: u64 = self.cutoff_at_move.iter().sum();
        if total_cutoffs == 0 {
            return 0.0;
        }
        let weighted_sum: u64 = self
            .cutoff_at_move
            .iter()
            .enumerate()
            .map(|(i, &count)| i as u64 * count)
            .sum();
        weighted_sum as f64 / total_cutoffs as f64
    }

    pub fn log_summary(&self) {
        let _span = debug_span!("search_stats").entered();
        debug!("=> SEARCH STATISTICS (depth {})", self.depth_reached);
        debug!(
            "NODES total={} time={:?} nps={}",
            self.nodes_searched, self.time_elapsed, self.nps
        );

        debug!("");
        debug!("==> Main Search ({} nodes)", self.main_search_nodes);
        debug!(
            "  - Beta Cutoffs:     {:>9} ({:>6.2}%)",
            self.beta_cutoffs_main,
            Self::percent(self.beta_cutoffs_main, self.main_search_nodes)
        );
        debug!("  - Exact Scores:     {:>9}", self.exact_scores);
        debug!("  - Fail Lows:        {:>9}", self.fail_lows);
        debug!("  - Draws:            {:>9}", self.draw_returns);
        debug!("  - Mates:            {:>9}", self.mate_returns);

        debug!("");
        debug!("==> QSearch ({} nodes)", self.qsearch_nodes);
        debug!(
            "  - Beta Cutoffs:      {:>9} ({:>6.2}%)",
            self.beta_cutoffs_qs,
            Self::percent(self.beta_cutoffs_qs, self.qsearch_nodes)
        );
        debug!("  - Stand Pat:         {:>9}", self.standpat_returns);
        debug!("  - Delta Pruned:      {:>9}", self.delta_pruning_cutoffs);

        debug!("");
        debug!("==> Pruning & TT");
        debug!(
            "  - TT Hits:          {:>9} ({:>6.2}% of probes), hash_full: {}/1000",
            self.tt_hits,
            Self::percent(self.tt_hits, self.tt_probes),
            self.hash_full
        );
        debug!(
            "    - TT Cutoffs:     {:>9} ({:>6.2}% of hits)",
            self.tt_cutoffs,
            Self::percent(self.tt_cutoffs, self.tt_hits)
        );
        debug!("  - NMP Attempts:     {:>9}", self.null_move_attempts);
        debug!(
            "    - NMP Cutoffs:    {:>9} ({:>6.2}% success rate, {} verified)",
            self.null_move_cutoffs,
            Self::percent(self.null_move_cutoffs, self.null_move_attempts),
            self.null_move_verifications
        );
        debug!("  - LMR Attempts:     {:>9}", self.lmr_attempts);
        debug!(
            "    - LMR Researches: {:>9} ({:>6.2}% research rate)",
            self.lmr_research,
            Self::percent(self.lmr_research, self.lmr_attempts)
        );
        if self.asp_research > 0 {
            debug!(
                "  - ASP Researches:   {:>9} (high: {}, low: {})",
                self.asp_research, self.asp_fail_high, self.asp_fail_low
            );
        }

        if self.splits > 0 || self.joins > 0 {
            debug!("");
            debug!("==> Parallel");
            debug!(
                "  - Splits:           {:>9} ({} never joined)",
                self.splits, self.wasted_splits
            );
            debug!("  - Joins:            {:>9}", self.joins);
            debug!("  - Parallel Aborts:  {:>9}", self.parallel_aborts);
            debug!("  - Slot Exhaustion:  {:>9}", self.slot_exhaustions);
        }

        let total_cutoffs: u64 = self.cutoff_at_move.iter().sum();
        if total_cutoffs > 0 {
            debug!("");
            debug!("==> Move Ordering");
            debug!("  - Avg. Cutoff Index:  {:.2}", self.avg_cutoff_index());

            let histogram: Vec<String> = self
                .cutoff_at_move
                .iter()
                .take(10)
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(i, count)| format!("{i}:{count}"))
                .collect();
            debug!(
                "  - Cutoff Histogram (move index:count): [{}]",
                histogram.join(", ")
            );
        }
    }
}

/// Configuration for search behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enable_nmp: bool,
    pub enable_lmr: bool,
    pub enable_asp: bool,
    pub enable_delta: bool,
    pub enable_extensions: bool,
    /// Try quiet checking moves at the first quiescence ply
    pub qsearch_checks: bool,
    pub emit_info: bool,
    /// Log the statistics summary after every search
    pub collect_stats: bool,
    pub hash_size_mb: usize,
    pub threads: usize,

    // Scheduler
    pub min_split_depth: i32,
    pub gratuitous_depth: i32,
    pub gratuitous_limit: usize,
    pub split_group: usize,
    pub split_at_root: bool,
    pub slots_per_thread: usize,

    // Null move: R = null_base + depth / null_divisor
    pub null_min_depth: i32,
    pub null_base: i32,
    pub null_divisor: i32,
    pub null_verify_depth: i32,

    // Late move reductions
    pub lmr_min_depth: i32,
    pub lmr_min_moves: usize,

    /// Nodes between time and stop checks
    pub poll_interval: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable_nmp: true,
            enable_lmr: true,
            enable_asp: true,
            enable_delta: true,
            enable_extensions: true,
            qsearch_checks: true,
            emit_info: true,
            collect_stats: true,
            hash_size_mb: 16,
            threads: 1,

            min_split_depth: 5,
            gratuitous_depth: 10,
            gratuitous_limit: 6,
            split_group: 8,
            split_at_root: true,
            slots_per_thread: 32,

            null_min_depth: 3,
            null_base: 3,
            null_divisor: 6,
            null_verify_depth: 8,

            lmr_min_depth: 3,
            lmr_min_moves: 3,

            poll_interval: 2048,
        }
    }
}

impl SearchConfig {
    /// Everything that changes the searched tree switched off
    pub fn exact() -> Self {
        Self {
            enable_nmp: false,
            enable_lmr: false,
            enable_delta: false,
            enable_extensions: false,
            qsearch_checks: false,
            ..Self::default()
        }
    }

    pub fn with_threads(self, threads: usize) -> Self {
        Self { threads, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_THREADS).contains(&self.threads),
            "threads must be in 1..={MAX_THREADS}, got {}",
            self.threads
        );
        ensure!(
            (1..=MAX_HASH).contains(&self.hash_size_mb),
            "hash_size_mb must be in 1..={MAX_HASH}, got {}",
            self.hash_size_mb
        );
        ensure!(
            (1..=64).contains(&self.slots_per_thread),
            "slots_per_thread must be in 1..=64, got {}",
            self.slots_per_thread
        );
        ensure!(
            self.split_group >= 2,
            "split_group must be at least 2, got {}",
            self.split_group
        );
        ensure!(self.min_split_depth >= 1, "min_split_depth must be positive");
        ensure!(self.null_divisor > 0, "null_divisor must be positive");
        ensure!(self.poll_interval > 0, "poll_interval must be positive");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Reading search config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("Parsing search config {}", path.display()))?;
        config
            .validate()
            .wrap_err_with(|| format!("Invalid search config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self).into_diagnostic()?;
        std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("Writing search config {}", path.display()))
    }
}

/// Search limits (time, depth, nodes)
#[derive(Default, Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: Option<u8>,
    pub max_time: Option<Duration>,
    pub max_nodes: Option<u64>,
}

impl SearchLimits {
    pub fn depth(depth: u8) -> Self {
        Self {
            max_depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn time(time_ms: u64) -> Self {
        Self {
            max_time: Some(Duration::from_millis(time_ms)),
            ..Default::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self {
            max_nodes: Some(nodes),
            ..Default::default()
        }
    }

    pub fn infinite() -> Self {
        Self::default()
    }

    /// Deepest iteration allowed
    pub fn depth_cap(&self) -> i32 {
        self.max_depth
            .map_or(MAX_PLY as i32 - 1, |d| (d as i32).clamp(1, MAX_PLY as i32 - 1))
    }
}

/// Result of a search
#[derive(Debug, Default, Clone)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: u8,
    pub nodes_searched: u64,
    pub time_taken: Duration,
    pub pv: Vec<Move>,
    pub is_mate: bool,
    /// Moves to mate, negative when getting mated
    pub mate_in: Option<i32>,
    pub stats: SearchStats,
}

impl SearchResult {
    pub fn nps(&self) -> u64 {
        let time_ms = self.time_taken.as_millis().max(1) as u64;
        (self.nodes_searched * 1000) / time_ms
    }
}

/// Converts a root-relative mate score into one relative to `ply`.
/// Applied when reading a score back from the TranspositionTable.
#[inline(always)]
pub fn adjust_score_for_ply(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

/// Converts a mate score found at `ply` into a ply-independent one.
/// To be called before an entry is stored in the TranspositionTable.
#[inline(always)]
pub fn adjust_score_from_ply(score: i32, ply: usize) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Full moves until mate for a mate score, negative when the side to move is mated
pub fn mate_in(score: i32) -> Option<i32> {
    if score > MATE_THRESHOLD {
        Some((MATE_SCORE - score + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        Some(-(MATE_SCORE + score) / 2)
    } else {
        None
    }
}
