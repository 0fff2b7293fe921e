use std::sync::LazyLock;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::prelude::*;

pub static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

#[derive(Debug)]
pub struct ZobristKeys {
    /// For each piece type, on each square, for each side
    pub pieces: [[[u64; NUM_SQUARES]; NUM_PIECES]; NUM_SIDES],
    /// For each of the 16 possible castling rights states
    pub castling: [u64; NUM_CASTLING_RIGHTS],
    /// Hashed only while an en passant capture is actually available
    pub en_passant_file: [u64; NUM_FILES],
    /// Single key to flip when stm changes
    pub black_to_move: u64,
}

impl ZobristKeys {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(0x7A4D_E11A_5EED_2024);
        let black_to_move = rng.random();

        let mut pieces = [[[0; NUM_SQUARES]; NUM_PIECES]; NUM_SIDES];
        for side_keys in pieces.iter_mut() {
            for piece_keys in side_keys.iter_mut() {
                piece_keys.iter_mut().for_each(|key| *key = rng.random());
            }
        }

        let mut castling = [0; NUM_CASTLING_RIGHTS];
        castling.iter_mut().for_each(|key| *key = rng.random());

        let mut en_passant_file = [0; NUM_FILES];
        en_passant_file.iter_mut().for_each(|key| *key = rng.random());

        Self {
            pieces,
            castling,
            en_passant_file,
            black_to_move,
        }
    }

    #[inline(always)]
    pub fn piece(&self, side: Side, piece: Piece, square: usize) -> u64 {
        self.pieces[side.index()][piece.index()][square]
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// Full recomputation, used when loading a position and to verify incremental updates
pub fn calculate_hash(board: &Board) -> u64 {
    let mut hash = 0;

    for side in Side::SIDES {
        for piece in Piece::PIECES {
            for sq in board.positions.get_piece_bb(side, piece).iter_bits() {
                hash ^= ZOBRIST.piece(side, piece, sq);
            }
        }
    }

    hash ^= ZOBRIST.castling[board.castling_rights.index()];
    hash ^= board.en_passant_key();

    if board.stm == Side::Black {
        hash ^= ZOBRIST.black_to_move;
    }

    hash
}
