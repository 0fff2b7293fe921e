use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tandem::prelude::*;
use tandem::search::tt::{ScoreTypes, TranspositionTable};

fn quiet_config(threads: usize) -> SearchConfig {
    SearchConfig {
        emit_info: false,
        collect_stats: false,
        ..SearchConfig::default().with_threads(threads)
    }
}

/// Fixed depth search on a busy middlegame, serial and with helpers.
/// The table is cleared between runs so every iteration does the same work.
fn bench_search(c: &mut Criterion) {
    let board = Board::from_fen(KIWIPETE).unwrap();
    let depth = 6;
    let mut group = c.benchmark_group(format!("search_depth_{depth}"));
    group.sample_size(10);

    for threads in [1, 4] {
        let mut engine = Engine::new(quiet_config(threads)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                engine.clear();
                black_box(engine.search(black_box(&board), SearchLimits::depth(depth)));
            })
        });
    }
    group.finish();
}

/// Raw speed of move generation plus make/unmake
fn bench_perft(c: &mut Criterion) {
    let mut board = Board::from_fen(KIWIPETE).unwrap();
    c.bench_function("perft_3_kiwipete", |b| {
        b.iter(|| black_box(perft(&mut board, black_box(3), false).nodes))
    });
}

fn bench_tt(c: &mut Criterion) {
    let tt = TranspositionTable::new(16);
    let mv = Move::new(12, 28, Move::DOUBLE_PAWN);
    let keys: Vec<u64> = (0..4096u64)
        .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .collect();

    c.bench_function("tt_store", |b| {
        b.iter(|| {
            for (i, &key) in keys.iter().enumerate() {
                tt.store(key, mv, i as i32, (i % 12) as i32, ScoreTypes::Exact);
            }
        })
    });

    c.bench_function("tt_probe", |b| {
        b.iter(|| {
            let hits = keys.iter().filter(|&&key| tt.probe(key).is_some()).count();
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_search, bench_perft, bench_tt);
criterion_main!(benches);
