use crate::prelude::*;
use crate::search::move_ordering::SearchTables;

/// Index of a split block in the shared arena: `thread * slots_per_thread + slot`
pub type NodeId = usize;

/// Position and window of the split point a tree was attached to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitParams {
    pub ply: usize,
    pub depth: i32,
    pub alpha: i32,
    pub beta: i32,
    pub in_check: bool,
}

/// Triangular principal variation table
#[derive(Debug, Clone)]
pub struct PvTable {
    lines: [[Move; MAX_PLY]; MAX_PLY],
    lens: [usize; MAX_PLY],
}

impl Default for PvTable {
    fn default() -> Self {
        Self {
            lines: [[Move::NULL; MAX_PLY]; MAX_PLY],
            lens: [0; MAX_PLY],
        }
    }
}

impl PvTable {
    #[inline(always)]
    pub fn clear(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.lens[ply] = 0;
        }
    }

    /// `mv` followed by the line found one ply deeper
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        self.lines[ply][0] = mv;
        let child_len = if ply + 1 < MAX_PLY {
            self.lens[ply + 1].min(MAX_PLY - 1)
        } else {
            0
        };
        if child_len > 0 {
            let (head, tail) = self.lines.split_at_mut(ply + 1);
            head[ply][1..=child_len].copy_from_slice(&tail[0][..child_len]);
        }
        self.lens[ply] = child_len + 1;
    }

    pub fn set_line(&mut self, ply: usize, line: &[Move]) {
        if ply >= MAX_PLY {
            return;
        }
        let len = line.len().min(MAX_PLY);
        self.lines[ply][..len].copy_from_slice(&line[..len]);
        self.lens[ply] = len;
    }

    pub fn line(&self, ply: usize) -> &[Move] {
        if ply >= MAX_PLY {
            return &[];
        }
        &self.lines[ply][..self.lens[ply]]
    }
}

/// Private working memory of one thread attached to one node of the tree.
///
/// A tree lives in its owner's [`TreePool`] and is only ever touched by the
/// owning thread. The split block with the same [`NodeId`] in the arena is
/// the part other threads may see.
#[derive(Debug)]
pub struct SearchTree {
    pub id: NodeId,
    pub board: Board,
    pub tables: Box<SearchTables>,
    pub pv: PvTable,
    /// Hashes of every position from the start of the game up to the current one
    pub repetition: Vec<u64>,
    pub stats: SearchStats,
    /// Move currently being searched at each ply
    pub current_move: [Move; MAX_PLY],
    /// Split point this tree is working for, if any
    pub parent: Option<NodeId>,
    pub split: SplitParams,
    /// Nodes not yet published to the shared counter
    pub(crate) unflushed_nodes: u64,
}

impl SearchTree {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            board: Board::new(),
            tables: Box::default(),
            pv: PvTable::default(),
            repetition: Vec::with_capacity(256),
            stats: SearchStats::default(),
            current_move: [Move::NULL; MAX_PLY],
            parent: None,
            split: SplitParams::default(),
            unflushed_nodes: 0,
        }
    }

    /// Resets per-search state, keeping history
    pub fn reset_for_search(&mut self, board: &Board, game_history: &[u64]) {
        self.board = *board;
        self.repetition.clear();
        self.repetition.extend_from_slice(game_history);
        self.repetition.push(board.hash);
        self.tables.clear_killers();
        self.tables.decay_history();
        self.stats = SearchStats::default();
        self.current_move = [Move::NULL; MAX_PLY];
        self.parent = None;
        self.split = SplitParams::default();
        self.unflushed_nodes = 0;
    }

    /// True when the current position occurred before with the same side to
    /// move since the last irreversible move
    pub fn is_repetition(&self) -> bool {
        let hash = self.board.hash;
        let reversible = self.board.halfmove_clock as usize;
        self.repetition
            .iter()
            .rev()
            .skip(2)
            .step_by(2)
            .take(reversible / 2)
            .any(|&h| h == hash)
    }

    #[inline(always)]
    pub fn push_position(&mut self) {
        self.repetition.push(self.board.hash);
    }

    #[inline(always)]
    pub fn pop_position(&mut self) {
        self.repetition.pop();
    }
}

/// Fixed number of working trees per thread, allocated lazily on first use
/// by the owning thread.
#[derive(Debug)]
pub struct TreePool {
    thread: usize,
    capacity: usize,
    slots: Vec<Option<Box<SearchTree>>>,
    free: u64,
}

impl TreePool {
    pub fn new(thread: usize, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, 64);
        Self {
            thread,
            capacity,
            slots: (0..capacity).map(|_| None).collect(),
            free: Self::full_mask(capacity),
        }
    }

    fn full_mask(capacity: usize) -> u64 {
        if capacity >= 64 {
            u64::MAX
        } else {
            (1u64 << capacity) - 1
        }
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn has_free(&self) -> bool {
        self.free != 0
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.free.count_ones() as usize
    }

    /// Takes the lowest free slot out of the pool
    pub fn acquire(&mut self) -> Option<Box<SearchTree>> {
        if self.free == 0 {
            return None;
        }
        let slot = self.free.trailing_zeros() as usize;
        self.free &= !(1 << slot);
        let id = self.thread * self.capacity + slot;
        Some(
            self.slots[slot]
                .take()
                .unwrap_or_else(|| Box::new(SearchTree::new(id))),
        )
    }

    pub fn release(&mut self, tree: Box<SearchTree>) {
        let slot = tree.id - self.thread * self.capacity;
        debug_assert!(slot < self.capacity, "tree {} released to pool {}", tree.id, self.thread);
        debug_assert!(self.free & (1 << slot) == 0, "slot {slot} released twice");
        self.free |= 1 << slot;
        self.slots[slot] = Some(tree);
    }
}
