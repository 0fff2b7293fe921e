use std::time::{Duration, Instant};

use clap::Parser;
use tandem::prelude::*;
use tandem::utils::cli::{Cli, Commands};

const BENCH_POSITIONS: [&str; 6] = [
    START_FEN,
    KIWIPETE,
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
];

fn main() -> miette::Result<()> {
    init();

    let span = span!(Level::DEBUG, "main");
    let _guard = span.enter();
    match Cli::parse().command {
        Commands::Search {
            fen,
            depth,
            time,
            nodes,
            threads,
            hash,
            config,
            verbose,
        } => {
            if verbose {
                set_log_level(Level::DEBUG)?;
            }
            let mut search_config = match config {
                Some(path) => SearchConfig::load(path)?,
                None => SearchConfig::default(),
            };
            if let Some(threads) = threads {
                search_config.threads = threads;
            }
            if let Some(hash) = hash {
                search_config.hash_size_mb = hash;
            }
            let limits = SearchLimits {
                max_depth: depth,
                max_time: time.map(Duration::from_millis),
                max_nodes: nodes,
            };
            let limits = if limits.max_depth.is_none()
                && limits.max_time.is_none()
                && limits.max_nodes.is_none()
            {
                SearchLimits::depth(8)
            } else {
                limits
            };
            run_search(&fen, search_config, limits)?;
        }
        Commands::Perft { fen, depth, divide } => {
            trace!("Running perft with fen: {fen:?}, depth: {depth}, divide: {divide}");
            let mut board = Board::from_fen(&fen)?;
            println!("{board}");
            if divide {
                perft_divide(&mut board, depth);
            } else {
                let result = perft(&mut board, depth, false);
                println!(
                    "Depth {depth}: {} nodes in {:?} ({} nps)",
                    result.nodes, result.duration, result.nps
                );
            }
        }
        Commands::Bench {
            depth,
            threads,
            hash,
        } => bench(depth, threads, hash)?,
    }
    Ok(())
}

fn run_search(fen: &str, config: SearchConfig, limits: SearchLimits) -> miette::Result<()> {
    let board = Board::from_fen(fen).wrap_err("Invalid position")?;
    let mut engine = Engine::new(config)?;
    println!("{board}");

    let result = engine.search(&board, limits);
    let pv = result
        .pv
        .iter()
        .map(Move::uci)
        .collect::<Vec<_>>()
        .join(" ");
    let score = match result.mate_in {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {}", result.score),
    };
    println!(
        "depth {} score {score} nodes {} nps {} time {}ms pv {pv}",
        result.depth,
        result.nodes_searched,
        result.nps(),
        result.time_taken.as_millis()
    );
    match result.best_move {
        Some(mv) => println!("bestmove {mv}"),
        None => println!("bestmove (none)"),
    }
    Ok(())
}

fn bench(depth: u8, threads: usize, hash: usize) -> miette::Result<()> {
    let config = SearchConfig {
        threads,
        hash_size_mb: hash,
        emit_info: false,
        collect_stats: false,
        ..SearchConfig::default()
    };
    let mut engine = Engine::new(config)?;
    let start = Instant::now();
    let mut total_nodes = 0;

    for (i, fen) in BENCH_POSITIONS.iter().enumerate() {
        let board = Board::from_fen(fen).wrap_err_with(|| format!("Bench position {i}"))?;
        engine.clear();
        let result = engine.search(&board, SearchLimits::depth(depth));
        total_nodes += result.nodes_searched;
        println!(
            "{:>2}: {:>10} nodes {:>9} nps  best {}",
            i + 1,
            result.nodes_searched,
            result.nps(),
            result.best_move.map_or_else(|| "none".to_string(), |m| m.uci())
        );
    }

    let elapsed = start.elapsed();
    let nps = total_nodes * 1000 / elapsed.as_millis().max(1) as u64;
    println!("{total_nodes} nodes {nps} nps ({threads} threads, depth {depth}, {elapsed:?})");
    Ok(())
}
