pub mod board;
pub mod evaluation;
pub mod moves;
pub mod prelude;
pub mod search;
pub mod utils;

pub mod consts {
    use crate::prelude::*;

    pub const NUM_SIDES: usize = Side::SIDES.len();
    pub const NUM_PIECES: usize = Piece::PIECES.len();
    pub const NUM_SQUARES: usize = 64;
    pub const NUM_CASTLING_RIGHTS: usize = 16;
    pub const NUM_FILES: usize = 8;

    pub const MAX_PLY: usize = 64;
    pub const MAX_MOVES: usize = 256;
    pub const MAX_HASH: usize = 1024;
    pub const MAX_THREADS: usize = 64;

    pub const TOTAL_PHASE: i32 = 24;

    pub const PAWN_VALUE: i32 = 100;
    pub const DRAW_SCORE: i32 = 0;
    pub const MATE_SCORE: i32 = 20_000;
    pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

    pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    pub const KIWIPETE: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
}
