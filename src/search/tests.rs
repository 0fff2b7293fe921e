use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::search::move_picker::MovePicker;
use crate::search::smp::{MoveSource, SplitFrame, SplitPoint};
use crate::search::tree::SearchTree;

const HANGING_QUEEN: &str = "n3k3/8/8/3q4/8/4N3/8/4K2Q w - - 0 1";
/// Square index of d5
const D5: usize = 35;
const OPEN_GAME: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";

/// Everything a worker borrows, built outside the engine
struct Fixture {
    tt: TranspositionTable,
    arena: SplitArena,
    evaluator: PositionalEvaluator,
    stop: AtomicBool,
    config: SearchConfig,
}

impl Fixture {
    fn new(config: SearchConfig) -> Self {
        Self {
            tt: TranspositionTable::new(1),
            arena: SplitArena::new(config.threads, config.slots_per_thread),
            evaluator: PositionalEvaluator::new(),
            stop: AtomicBool::new(false),
            config,
        }
    }

    fn shared(&self) -> Shared<'_> {
        Shared::new(
            self.config,
            SearchLimits::default(),
            &self.tt,
            &self.arena,
            &self.evaluator,
            &self.stop,
        )
    }

    fn pools(&self) -> Vec<TreePool> {
        (0..self.config.threads)
            .map(|t| TreePool::new(t, self.config.slots_per_thread))
            .collect()
    }
}

fn tree_at(pool: &mut TreePool, fen: &str) -> Box<SearchTree> {
    let board = Board::from_fen(fen).unwrap();
    let mut tree = pool.acquire().unwrap();
    tree.reset_for_search(&board, &[]);
    tree
}

/// Plain minimax over legal moves with the engine's own quiescence at the leaves
fn minimax(worker: &mut Worker, tree: &mut SearchTree, ply: usize, depth: i32) -> i32 {
    if depth == 0 {
        return worker.quiesce(tree, ply, 0, -MATE_SCORE, MATE_SCORE);
    }
    let moves = tree.board.legal_moves();
    if moves.is_empty() {
        return if tree.board.in_check() {
            -MATE_SCORE + ply as i32
        } else {
            DRAW_SCORE
        };
    }
    let mut best = -MATE_SCORE;
    for &mv in moves.iter() {
        let undo = tree.board.make_move(mv);
        tree.push_position();
        best = best.max(-minimax(worker, tree, ply + 1, depth - 1));
        tree.pop_position();
        tree.board.unmake_move(mv, undo);
    }
    best
}

fn brute_force(fen: &str, depth: i32) -> i32 {
    let fixture = Fixture::new(SearchConfig::exact());
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut tree = tree_at(&mut pools[0], fen);
    let mut worker = Worker::new(0, &shared, &mut pools[0]);
    minimax(&mut worker, &mut tree, 0, depth)
}

#[test]
fn matches_brute_force_minimax() {
    for (fen, depth) in [(START_FEN, 3), (OPEN_GAME, 3), (HANGING_QUEEN, 3), (KIWIPETE, 2)] {
        let expected = brute_force(fen, depth);
        let mut engine =
            Engine::with_evaluator(SearchConfig::exact(), Box::new(PositionalEvaluator::new()))
                .unwrap();
        let board = Board::from_fen(fen).unwrap();
        let result = engine.search(&board, SearchLimits::depth(depth as u8));
        assert_eq!(result.score, expected, "{fen} at depth {depth}");
        assert_eq!(result.depth, depth as u8);
    }
}

#[test]
fn scrambled_table_keeps_the_move() {
    let board = Board::from_fen(HANGING_QUEEN).unwrap();
    let config = SearchConfig {
        hash_size_mb: 1,
        ..SearchConfig::default()
    };

    let mut clean = Engine::new(config).unwrap();
    let expected = clean.search(&board, SearchLimits::depth(5)).best_move;

    for seed in [1, 7, 42] {
        let mut engine = Engine::new(config).unwrap();
        engine.tt.scramble(seed);
        let result = engine.search(&board, SearchLimits::depth(5));
        assert_eq!(result.best_move, expected, "seed {seed}");
    }
    assert_eq!(expected.map(|m| m.to_sq()), Some(D5));
}

#[test]
fn cleared_table_forgets_entries() {
    let mut engine = Engine::new(SearchConfig {
        hash_size_mb: 1,
        ..SearchConfig::default()
    })
    .unwrap();
    let board = Board::from_fen(OPEN_GAME).unwrap();
    engine.search(&board, SearchLimits::depth(5));
    assert!(engine.hash_full() > 0);
    engine.clear();
    assert_eq!(engine.hash_full(), 0);
}

#[test]
fn join_attaches_a_copy_of_the_split_point() {
    let config = SearchConfig {
        slots_per_thread: 4,
        ..SearchConfig::exact().with_threads(2)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let (first, rest) = pools.split_at_mut(1);
    let owner_tree = tree_at(&mut first[0], OPEN_GAME);

    let block = fixture.arena.node(owner_tree.id);
    block.ply.store(1, Ordering::Relaxed);
    block.depth.store(6, Ordering::Relaxed);
    block.state.lock().frame = Some(Box::new(SplitFrame {
        board: owner_tree.board,
        repetition: owner_tree.repetition.clone(),
        tables: owner_tree.tables.clone(),
        ply: 1,
        depth: 6,
        alpha: -20,
        beta: 35,
        in_check: false,
        value: -20,
        best_move: Move::NULL,
        pv: Vec::new(),
        moves: MoveSource::Picker(MovePicker::new(Move::NULL, 1)),
        searched: 1,
        stats: SearchStats::default(),
    }));

    // Nothing published yet
    let mut owner = Worker::new(0, &shared, &mut first[0]);
    assert!(owner.join().is_none());
    block.joinable.store(true, Ordering::Release);
    // Never joins its own split point
    assert!(owner.join().is_none());
    assert!(shared.split_requested.load(Ordering::Relaxed));

    let mut helper = Worker::new(1, &shared, &mut rest[0]);
    let child = helper.join().expect("joinable split point");
    assert_eq!(fixture.arena.owner(child.id), 1);
    assert_eq!(child.parent, Some(owner_tree.id));
    assert_eq!(child.board, owner_tree.board);
    assert_eq!(child.repetition, owner_tree.repetition);
    assert_eq!((child.split.alpha, child.split.beta, child.split.depth), (-20, 35, 6));
    assert_eq!(child.stats.joins, 1);
    assert_eq!(block.nprocs.load(Ordering::Relaxed), 1);
    assert!(block.joined.load(Ordering::Relaxed));
    assert_eq!(block.state.lock().siblings[1], Some(child.id));

    // Already attached here, a second join finds nothing new
    assert!(helper.join().is_none());
}

#[test]
fn join_skips_deep_crowded_split_points() {
    let config = SearchConfig {
        slots_per_thread: 2,
        split_group: 2,
        ..SearchConfig::exact().with_threads(3)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();

    // Deep in the tree and already crowded
    let block = fixture.arena.node(0);
    block.ply.store(5, Ordering::Relaxed);
    block.depth.store(4, Ordering::Relaxed);
    block.nprocs.store(2, Ordering::Relaxed);
    block.joinable.store(true, Ordering::Release);
    block.state.lock().frame = Some(Box::new(SplitFrame {
        board: Board::new(),
        repetition: Vec::new(),
        tables: Box::default(),
        ply: 5,
        depth: 4,
        alpha: 0,
        beta: 1,
        in_check: false,
        value: 0,
        best_move: Move::NULL,
        pv: Vec::new(),
        moves: MoveSource::Done,
        searched: 1,
        stats: SearchStats::default(),
    }));

    let mut helper = Worker::new(2, &shared, &mut pools[2]);
    assert!(helper.join().is_none());

    block.nprocs.store(1, Ordering::Relaxed);
    let child = helper.join().expect("group has room");
    assert_eq!(child.parent, Some(0));
}

#[test]
fn copy_to_parent_merges_only_live_improvements() {
    let config = SearchConfig {
        slots_per_thread: 2,
        ..SearchConfig::exact().with_threads(2)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut child = tree_at(&mut pools[1], START_FEN);
    let worker = Worker::new(1, &shared, &mut pools[0]);

    let mv = Move::from_uci(&child.board, "e2e4").unwrap();
    let reply = Move::new(52, 36, Move::DOUBLE_PAWN);
    let mut state = smp::SplitState {
        siblings: vec![None; 2],
        frame: Some(Box::new(SplitFrame {
            board: child.board,
            repetition: Vec::new(),
            tables: Box::default(),
            ply: 2,
            depth: 5,
            alpha: 0,
            beta: 100,
            in_check: false,
            value: 10,
            best_move: Move::NULL,
            pv: Vec::new(),
            moves: MoveSource::Done,
            searched: 3,
            stats: SearchStats::default(),
        })),
    };

    // Searched nothing
    worker.copy_to_parent(&mut state, &mut child, 50);
    assert_eq!(state.frame.as_ref().unwrap().value, 10);

    child.stats.nodes_searched = 120;
    child.stats.splits = 1;
    child.tables.history[12][28] = 77;
    child.pv.set_line(2, &[mv, reply]);
    worker.copy_to_parent(&mut state, &mut child, 50);
    {
        let frame = state.frame.as_ref().unwrap();
        assert_eq!(frame.value, 50);
        assert_eq!(frame.best_move, mv);
        assert_eq!(frame.pv, vec![mv, reply]);
        assert_eq!(frame.tables.history[12][28], 77);
        assert_eq!(frame.stats.nodes_searched, 120);
    }
    assert_eq!(child.stats, SearchStats::default());

    // Not an improvement, stats still count
    child.stats.nodes_searched = 30;
    worker.copy_to_parent(&mut state, &mut child, 40);
    let frame = state.frame.as_ref().unwrap();
    assert_eq!((frame.value, frame.stats.nodes_searched), (50, 150));

    // A stopped child's value means nothing
    fixture.arena.node(child.id).stop.store(true, Ordering::Relaxed);
    child.stats.nodes_searched = 5;
    worker.copy_to_parent(&mut state, &mut child, 90);
    let frame = state.frame.as_ref().unwrap();
    assert_eq!((frame.value, frame.stats.nodes_searched), (50, 155));
    assert_eq!(frame.stats.splits, 1);
}

#[test]
fn stopped_root_child_gives_its_move_back() {
    let config = SearchConfig {
        slots_per_thread: 2,
        ..SearchConfig::exact().with_threads(2)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut child = tree_at(&mut pools[1], START_FEN);
    let worker = Worker::new(1, &shared, &mut pools[0]);

    let e4 = Move::from_uci(&child.board, "e2e4").unwrap();
    let d4 = Move::from_uci(&child.board, "d2d4").unwrap();
    *shared.root_moves.lock() = RootMoveList::new(vec![RootMove::new(e4, 0), RootMove::new(d4, 0)]);
    {
        let mut list = shared.root_moves.lock();
        assert_eq!(list.claim_next(), Some(e4));
        assert_eq!(list.claim_next(), Some(d4));
        assert_eq!(list.claim_next(), None);
    }

    let mut state = smp::SplitState {
        siblings: vec![None; 2],
        frame: Some(Box::new(SplitFrame {
            board: child.board,
            repetition: Vec::new(),
            tables: Box::default(),
            ply: 0,
            depth: 6,
            alpha: -MATE_SCORE,
            beta: MATE_SCORE,
            in_check: false,
            value: -MATE_SCORE,
            best_move: Move::NULL,
            pv: Vec::new(),
            moves: MoveSource::Done,
            searched: 2,
            stats: SearchStats::default(),
        })),
    };

    child.current_move[0] = d4;
    child.stats.nodes_searched = 40;
    fixture.arena.node(child.id).stop.store(true, Ordering::Relaxed);
    worker.copy_to_parent(&mut state, &mut child, 25);

    let frame = state.frame.as_ref().unwrap();
    assert_eq!(frame.value, -MATE_SCORE);
    assert_eq!(frame.stats.nodes_searched, 40);
    let mut list = shared.root_moves.lock();
    assert_eq!(list.claim_next(), Some(d4));
    assert_eq!(list.claim_next(), None);
}

#[test]
fn lone_split_searches_every_move_itself() {
    let config = SearchConfig {
        slots_per_thread: 4,
        ..SearchConfig::exact().with_threads(2)
    };

    let serial = {
        let fixture = Fixture::new(config);
        let shared = fixture.shared();
        let mut pools = fixture.pools();
        let mut tree = tree_at(&mut pools[0], HANGING_QUEEN);
        let mut worker = Worker::new(0, &shared, &mut pools[0]);
        worker.search(&mut tree, 1, 3, -MATE_SCORE, MATE_SCORE, false, false)
    };

    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut tree = tree_at(&mut pools[0], HANGING_QUEEN);
    let mut worker = Worker::new(0, &shared, &mut pools[0]);

    let mut moves = MoveSource::Picker(MovePicker::new(Move::NULL, 1));
    let point = SplitPoint {
        ply: 1,
        depth: 3,
        alpha: -MATE_SCORE,
        beta: MATE_SCORE,
        in_check: false,
        best_move: Move::NULL,
        moves_done: 0,
    };
    let frame = worker.try_split(&mut tree, point, &mut moves).expect("free slot");

    assert!(matches!(moves, MoveSource::Done));
    assert_eq!(frame.value, serial);
    assert_eq!(frame.best_move.to_sq(), D5);
    assert!(frame.stats.nodes_searched > 0);
    assert_eq!((tree.stats.splits, tree.stats.wasted_splits), (1, 1));
    assert_eq!(worker.pool.in_use(), 1);
    let block = fixture.arena.node(tree.id);
    assert_eq!(block.nprocs.load(Ordering::Relaxed), 0);
    assert!(!block.joinable.load(Ordering::Relaxed));
}

#[test]
fn split_without_free_slot_is_abandoned() {
    let config = SearchConfig {
        slots_per_thread: 1,
        ..SearchConfig::exact().with_threads(2)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut tree = tree_at(&mut pools[0], START_FEN);
    let mut worker = Worker::new(0, &shared, &mut pools[0]);
    assert!(!worker.should_split(20, 3));

    let mut moves = MoveSource::Picker(MovePicker::new(Move::NULL, 1));
    let point = SplitPoint {
        ply: 1,
        depth: 8,
        alpha: 0,
        beta: 1,
        in_check: false,
        best_move: Move::NULL,
        moves_done: 1,
    };
    assert!(worker.try_split(&mut tree, point, &mut moves).is_none());
    assert!(matches!(moves, MoveSource::Picker(_)));
    assert_eq!(tree.stats.slot_exhaustions, 1);
}

#[test]
fn split_policy() {
    let config = SearchConfig {
        min_split_depth: 4,
        gratuitous_depth: 9,
        gratuitous_limit: 0,
        slots_per_thread: 4,
        ..SearchConfig::exact().with_threads(2)
    };
    let fixture = Fixture::new(config);
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let worker = Worker::new(0, &shared, &mut pools[0]);

    // Nobody asked for help
    assert!(!worker.should_split(5, 1));
    assert!(worker.should_split(9, 1));
    assert!(!worker.should_split(9, 2));

    shared.split_requested.store(true, Ordering::Relaxed);
    assert!(worker.should_split(4, 3));
    assert!(!worker.should_split(3, 3));
    assert!(!worker.should_split(6, 0));

    // An unjoined split point of our own is over the limit
    let block = fixture.arena.node(1);
    block.joinable.store(true, Ordering::Relaxed);
    assert!(!worker.should_split(6, 3));
    block.joined.store(true, Ordering::Relaxed);
    assert!(worker.should_split(6, 3));

    let single = Fixture::new(SearchConfig::exact());
    let shared = single.shared();
    shared.split_requested.store(true, Ordering::Relaxed);
    let mut pools = single.pools();
    let worker = Worker::new(0, &shared, &mut pools[0]);
    assert!(!worker.should_split(12, 1));
}

#[test]
fn abort_reaches_the_worker() {
    let fixture = Fixture::new(SearchConfig {
        poll_interval: 1,
        ..SearchConfig::exact()
    });
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut tree = tree_at(&mut pools[0], KIWIPETE);
    let mut worker = Worker::new(0, &shared, &mut pools[0]);

    fixture.stop.store(true, Ordering::Release);
    worker.search(&mut tree, 1, 6, -MATE_SCORE, MATE_SCORE, false, true);
    assert!(shared.abort.load(Ordering::Relaxed));
    assert!(worker.stopped(&tree));
    assert!(tree.stats.nodes_searched <= 2);
}

#[test]
fn stopped_search_returns_alpha() {
    let fixture = Fixture::new(SearchConfig::exact());
    let shared = fixture.shared();
    let mut pools = fixture.pools();
    let mut tree = tree_at(&mut pools[0], HANGING_QUEEN);
    let mut worker = Worker::new(0, &shared, &mut pools[0]);

    shared.abort.store(true, Ordering::Release);
    assert_eq!(worker.search(&mut tree, 1, 4, -37, 50, false, true), -37);
    assert_eq!(worker.search(&mut tree, 3, 0, 12, 80, false, false), 12);
    assert_eq!(worker.quiesce(&mut tree, 2, 0, 30, 60), 30);
}
