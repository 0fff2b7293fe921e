//! Shared, lock-free transposition table.
//!
//! Every slot is a pair of atomics holding `key ^ data` and `data`. A reader
//! recomputes the key from both words, so a slot torn by two racing writers
//! fails validation and reads as a miss. Writers never lock.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::prelude::*;
use crate::search::common::adjust_score_for_ply;

const AGE_MASK: u8 = 0x3F;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreTypes {
    /// Score is the exact evaluation [alpha < score < beta]
    Exact,
    /// Score is at least this value, i.e, beta cutoff [score >= beta]
    LowerBound,
    /// Score is at most this value, i.e, alpha not improved [score <= alpha]
    UpperBound,
}

impl ScoreTypes {
    const fn bits(self) -> u64 {
        match self {
            ScoreTypes::Exact => 1,
            ScoreTypes::LowerBound => 2,
            ScoreTypes::UpperBound => 3,
        }
    }

    const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            1 => Some(ScoreTypes::Exact),
            2 => Some(ScoreTypes::LowerBound),
            3 => Some(ScoreTypes::UpperBound),
            _ => None,
        }
    }
}

/// A key-validated entry. Scores are stored ply-independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TranspositionEntry {
    pub key: u64,
    pub best_move: Move,
    pub score: i32,
    pub depth: u8,
    pub score_type: ScoreTypes,
    pub age: u8,
}

/// An entry deep enough and with a bound tight enough to end the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// Score relative to the probing ply, already clamped to the window for bounds
    pub score: i32,
    pub score_type: ScoreTypes,
    pub best_move: Move,
}

impl TranspositionEntry {
    // Layout of the data word:
    // [Age:6][Bound:2][Depth:8][Score:16][Move:16]
    fn pack(&self) -> u64 {
        (self.best_move.0 as u64)
            | ((self.score as i16 as u16 as u64) << 16)
            | ((self.depth as u64) << 32)
            | (self.score_type.bits() << 40)
            | (((self.age & AGE_MASK) as u64) << 42)
    }

    fn unpack(key: u64, data: u64) -> Option<Self> {
        Some(Self {
            key,
            best_move: Move(data as u16),
            score: (data >> 16) as u16 as i16 as i32,
            depth: (data >> 32) as u8,
            score_type: ScoreTypes::from_bits((data >> 40) & 0b11)?,
            age: ((data >> 42) as u8) & AGE_MASK,
        })
    }

    /// Checks stored depth and bound against the current node.
    ///
    /// Returns `None` when the entry can only serve as a move hint.
    pub fn validate(&self, depth: i32, alpha: i32, beta: i32, ply: usize) -> Option<ValidatedEntry> {
        if (self.depth as i32) < depth {
            return None;
        }
        let score = adjust_score_for_ply(self.score, ply);
        let score = match self.score_type {
            ScoreTypes::Exact => score,
            ScoreTypes::LowerBound if score >= beta => beta,
            ScoreTypes::UpperBound if score <= alpha => alpha,
            _ => return None,
        };
        Some(ValidatedEntry {
            score,
            score_type: self.score_type,
            best_move: self.best_move,
        })
    }
}

#[derive(Debug, Default)]
struct Slot {
    key: AtomicU64,
    data: AtomicU64,
}

impl Slot {
    #[inline(always)]
    fn load(&self, key: u64) -> Option<TranspositionEntry> {
        let data = self.data.load(Ordering::Relaxed);
        let stored = self.key.load(Ordering::Relaxed);
        if data == 0 || stored ^ data != key {
            return None;
        }
        TranspositionEntry::unpack(key, data)
    }

    #[inline(always)]
    fn raw(&self) -> Option<TranspositionEntry> {
        let data = self.data.load(Ordering::Relaxed);
        let key = self.key.load(Ordering::Relaxed) ^ data;
        TranspositionEntry::unpack(key, data)
    }

    #[inline(always)]
    fn write(&self, entry: &TranspositionEntry) {
        let data = entry.pack();
        self.key.store(entry.key ^ data, Ordering::Relaxed);
        self.data.store(data, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.key.store(0, Ordering::Relaxed);
        self.data.store(0, Ordering::Relaxed);
    }
}

/// Slot 0 keeps the deepest recent entry, slot 1 always takes the newest
#[derive(Debug, Default)]
struct Bucket {
    slots: [Slot; 2],
}

#[derive(Debug)]
pub struct TranspositionTable {
    buckets: Vec<Bucket>,
    mask: usize,
    age: AtomicU8,
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(16)
    }
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let buckets = Self::bucket_count(size_mb);
        Self {
            buckets: (0..buckets).map(|_| Bucket::default()).collect(),
            mask: buckets - 1,
            age: AtomicU8::new(0),
        }
    }

    fn bucket_count(size_mb: usize) -> usize {
        let bucket_size = std::mem::size_of::<Bucket>();
        let wanted = (size_mb.max(1) * 1024 * 1024) / bucket_size;
        // Largest power of two that fits in the budget
        1 << (usize::BITS - 1 - wanted.max(1).leading_zeros())
    }

    pub fn resize(&mut self, size_mb: usize) {
        *self = Self::new(size_mb);
        debug!("TT resized to {size_mb}MB, {} buckets", self.buckets.len());
    }

    pub fn len(&self) -> usize {
        self.buckets.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            bucket.slots.iter().for_each(Slot::reset);
        }
        self.age.store(0, Ordering::Relaxed);
    }

    /// Bumps the 6-bit age once per search
    pub fn new_search(&self) {
        let next = (self.age.load(Ordering::Relaxed) + 1) & AGE_MASK;
        self.age.store(next, Ordering::Relaxed);
    }

    #[inline(always)]
    fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn bucket(&self, key: u64) -> &Bucket {
        &self.buckets[key as usize & self.mask]
    }

    /// Key-validated lookup. Depth and bound are checked by [`TranspositionEntry::validate`].
    pub fn probe(&self, key: u64) -> Option<TranspositionEntry> {
        let bucket = self.bucket(key);
        bucket.slots.iter().find_map(|slot| slot.load(key))
    }

    /// Stores a ply-independent score. Racing stores may interleave, the
    /// loser is simply lost.
    pub fn store(&self, key: u64, best_move: Move, score: i32, depth: i32, score_type: ScoreTypes) {
        let bucket = self.bucket(key);
        let age = self.age();
        let mut entry = TranspositionEntry {
            key,
            best_move,
            score: score.clamp(-MATE_SCORE, MATE_SCORE),
            depth: depth.clamp(0, u8::MAX as i32) as u8,
            score_type,
            age,
        };

        let [preferred, always] = &bucket.slots;
        let existing = preferred.raw();
        let same_key = existing.is_some_and(|e| e.key == key);
        if best_move.is_null()
            && let Some(old) = existing.filter(|_| same_key).or_else(|| always.load(key))
        {
            entry.best_move = old.best_move;
        }

        let replace_preferred = match existing {
            None => true,
            Some(old) => same_key || old.age != age || entry.depth >= old.depth,
        };
        if replace_preferred {
            preferred.write(&entry);
        } else {
            always.write(&entry);
        }
    }

    /// Per-mille of sampled slots written during the current search
    pub fn hash_full(&self) -> u16 {
        let age = self.age();
        let sample = self.buckets.len().min(500);
        if sample == 0 {
            return 0;
        }
        let used = self.buckets[..sample]
            .iter()
            .flat_map(|bucket| bucket.slots.iter())
            .filter(|slot| slot.raw().is_some_and(|e| e.age == age))
            .count();
        (used * 1000 / (sample * 2)) as u16
    }

    /// Overwrites slots with noise, simulating torn or stale writes
    #[cfg(test)]
    pub(crate) fn scramble(&self, seed: u64) {
        use rand::{Rng, SeedableRng, rngs::StdRng};
        let mut rng = StdRng::seed_from_u64(seed);
        for bucket in &self.buckets {
            for slot in &bucket.slots {
                if rng.random_bool(0.5) {
                    slot.key.store(rng.random(), Ordering::Relaxed);
                    slot.data.store(rng.random(), Ordering::Relaxed);
                } else if rng.random_bool(0.5) {
                    slot.data.store(rng.random(), Ordering::Relaxed);
                }
            }
        }
    }

    /// Writes an entry for `key` straight into slot 0, bypassing replacement
    #[cfg(test)]
    pub(crate) fn plant(&self, entry: TranspositionEntry) {
        self.bucket(entry.key).slots[0].write(&entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Move {
        Move::new(12, 28, Move::DOUBLE_PAWN)
    }

    #[test]
    fn size_is_power_of_two() {
        let tt = TranspositionTable::new(1);
        assert!(tt.buckets.len().is_power_of_two());
        assert!(tt.buckets.len() * std::mem::size_of::<Bucket>() <= 1024 * 1024);
        assert_eq!(tt.len(), tt.buckets.len() * 2);
    }

    #[test]
    fn store_and_probe() {
        let tt = TranspositionTable::new(1);
        let key = 0xDEAD_BEEF_1234_5678;
        assert!(tt.probe(key).is_none());

        tt.store(key, quiet(), -250, 7, ScoreTypes::LowerBound);
        let entry = tt.probe(key).unwrap();
        assert_eq!(entry.best_move, quiet());
        assert_eq!(entry.score, -250);
        assert_eq!(entry.depth, 7);
        assert_eq!(entry.score_type, ScoreTypes::LowerBound);

        // Same index, different key
        assert!(tt.probe(key ^ (1 << 60)).is_none());
    }

    #[test]
    fn validate_checks_depth_and_bound() {
        let entry = TranspositionEntry {
            key: 1,
            best_move: quiet(),
            score: 50,
            depth: 4,
            score_type: ScoreTypes::LowerBound,
            age: 0,
        };
        assert!(entry.validate(5, 0, 40, 1).is_none());
        assert_eq!(entry.validate(4, 0, 40, 1).unwrap().score, 40);
        assert!(entry.validate(4, 0, 60, 1).is_none());

        let upper = TranspositionEntry {
            score_type: ScoreTypes::UpperBound,
            ..entry
        };
        assert_eq!(upper.validate(3, 60, 100, 1).unwrap().score, 60);
        assert!(upper.validate(3, 10, 100, 1).is_none());

        let exact = TranspositionEntry {
            score_type: ScoreTypes::Exact,
            score: MATE_SCORE - 3,
            ..entry
        };
        assert_eq!(exact.validate(2, -10, 10, 2).unwrap().score, MATE_SCORE - 5);
    }

    #[test]
    fn torn_slot_reads_as_miss() {
        let tt = TranspositionTable::new(1);
        let key = 0x0123_4567_89AB_CDEF;
        tt.store(key, quiet(), 10, 3, ScoreTypes::Exact);
        let slot = &tt.bucket(key).slots[0];
        // Another writer's data landed without its key
        slot.data
            .store(slot.data.load(Ordering::Relaxed) ^ (1 << 20), Ordering::Relaxed);
        assert!(tt.probe(key).is_none());
    }

    #[test]
    fn replacement_keeps_deep_entries() {
        let tt = TranspositionTable::new(1);
        let stride = (tt.mask as u64) + 1;
        let deep = 5;
        let shallow = deep + stride;
        let newest = deep + 2 * stride;

        tt.store(deep, quiet(), 1, 9, ScoreTypes::Exact);
        tt.store(shallow, quiet(), 2, 2, ScoreTypes::Exact);
        assert_eq!(tt.probe(deep).unwrap().depth, 9);
        assert_eq!(tt.probe(shallow).unwrap().depth, 2);

        // Slot 1 always replaces
        tt.store(newest, quiet(), 3, 1, ScoreTypes::Exact);
        assert!(tt.probe(shallow).is_none());
        assert!(tt.probe(deep).is_some());

        // Entries from an older search lose their protection
        tt.new_search();
        tt.store(shallow, quiet(), 2, 2, ScoreTypes::Exact);
        assert!(tt.probe(deep).is_none());
    }

    #[test]
    fn store_without_move_keeps_old_move() {
        let tt = TranspositionTable::new(1);
        tt.store(77, quiet(), 0, 3, ScoreTypes::LowerBound);
        tt.store(77, Move::NULL, 5, 4, ScoreTypes::UpperBound);
        let entry = tt.probe(77).unwrap();
        assert_eq!(entry.best_move, quiet());
        assert_eq!(entry.score_type, ScoreTypes::UpperBound);
    }

    #[test]
    fn clear_and_hash_full() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.hash_full(), 0);
        for key in 0..2000u64 {
            tt.store(key, quiet(), 0, 1, ScoreTypes::Exact);
        }
        assert!(tt.hash_full() >= 500);
        tt.clear();
        assert_eq!(tt.hash_full(), 0);
        assert!(tt.probe(3).is_none());
    }

    #[test]
    fn concurrent_writers_never_produce_foreign_entries() {
        let tt = TranspositionTable::new(1);
        let keys: Vec<u64> = (0..4u64).map(|i| 42 + i * (tt.mask as u64 + 1)).collect();
        std::thread::scope(|s| {
            for (t, &key) in keys.iter().enumerate() {
                let tt = &tt;
                s.spawn(move || {
                    for i in 0..20_000 {
                        tt.store(key, Move::new(t, 8 + t, 0), (t * 100) as i32, i % 20, ScoreTypes::Exact);
                    }
                });
            }
            for _ in 0..20_000 {
                for (t, &key) in keys.iter().enumerate() {
                    if let Some(entry) = tt.probe(key) {
                        assert_eq!(entry.score, (t * 100) as i32);
                        assert_eq!(entry.best_move, Move::new(t, 8 + t, 0));
                    }
                }
            }
        });
    }
}
