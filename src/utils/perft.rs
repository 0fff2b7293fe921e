use std::time::{Duration, Instant};

use crate::prelude::*;

#[derive(Debug)]
pub struct PerftResult {
    /// Total leaf nodes counted
    pub nodes: u64,
    pub duration: Duration,
    pub nps: u64,
    /// Per root move counts, filled for divide runs
    pub move_counts: Option<Vec<(Move, u64)>>,
}

impl PerftResult {
    pub fn new(nodes: u64, duration: Duration, move_counts: Option<Vec<(Move, u64)>>) -> Self {
        let nanos = duration.as_nanos().max(1);
        Self {
            nodes,
            duration,
            nps: (nodes as u128 * 1_000_000_000 / nanos) as u64,
            move_counts,
        }
    }
}

/// Counts leaf nodes of the legal move tree. Exercises the same pseudo-legal
/// generation plus make/unmake/check path the search uses.
pub fn perft(board: &mut Board, depth: u8, divide: bool) -> PerftResult {
    let start = Instant::now();
    if depth == 0 {
        return PerftResult::new(1, start.elapsed(), None);
    }

    let mut moves = MoveBuffer::new();
    board.generate_moves(&mut moves);
    let us = board.stm;

    let mut counts = divide.then(Vec::new);
    let mut nodes = 0;
    for &m in moves.iter() {
        let undo = board.make_move(m);
        if !board.is_in_check(us) {
            let count = perft_inner(board, depth - 1);
            nodes += count;
            if let Some(counts) = counts.as_mut() {
                counts.push((m, count));
            }
        }
        board.unmake_move(m, undo);
    }
    PerftResult::new(nodes, start.elapsed(), counts)
}

fn perft_inner(board: &mut Board, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut moves = MoveBuffer::new();
    board.generate_moves(&mut moves);
    let us = board.stm;

    let mut nodes = 0;
    for &m in moves.iter() {
        let undo = board.make_move(m);
        if !board.is_in_check(us) {
            nodes += perft_inner(board, depth - 1);
        }
        board.unmake_move(m, undo);
    }
    nodes
}

pub fn perft_divide(board: &mut Board, depth: u8) -> PerftResult {
    let result = perft(board, depth, true);
    if let Some(counts) = &result.move_counts {
        let mut sorted = counts.clone();
        sorted.sort_by_key(|(m, _)| m.uci());
        for (m, count) in sorted {
            println!("{m}: {count}");
        }
    }
    println!(
        "\nNodes searched: {} in {:?} ({} nps)",
        result.nodes, result.duration, result.nps
    );
    result
}
