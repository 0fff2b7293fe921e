use super::material::material_balance;
use crate::prelude::*;

// Tables are laid out as seen from white, rank 8 first.
// Source: https://www.chessprogramming.org/Simplified_Evaluation_Function

// Just advance
#[rustfmt::skip]
const PAWN_TABLE: [i32; NUM_SQUARES] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 25, 25, 10,  5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-20,-20, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

// Go towards the center
#[rustfmt::skip]
const KNIGHT_TABLE: [i32; NUM_SQUARES] = [
    -50,-40,-30,-30,-30,-30,-40,-50,
    -40,-20,  0,  0,  0,  0,-20,-40,
    -30,  0, 10, 15, 15, 10,  0,-30,
    -30,  5, 15, 20, 20, 15,  5,-30,
    -30,  0, 15, 20, 20, 15,  0,-30,
    -30,  5, 10, 15, 15, 10,  5,-30,
    -40,-20,  0,  5,  5,  0,-20,-40,
    -50,-40,-30,-30,-30,-30,-40,-50,
];

// Avoid corners and borders
#[rustfmt::skip]
const BISHOP_TABLE: [i32; NUM_SQUARES] = [
    -20,-10,-10,-10,-10,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5, 10, 10,  5,  0,-10,
    -10,  5,  5, 10, 10,  5,  5,-10,
    -10,  0, 10, 10, 10, 10,  0,-10,
    -10, 10, 10, 10, 10, 10, 10,-10,
    -10,  5,  0,  0,  0,  0,  5,-10,
    -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const ROOK_TABLE: [i32; NUM_SQUARES] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_TABLE: [i32; NUM_SQUARES] = [
    -20,-10,-10, -5, -5,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5,  5,  5,  5,  0,-10,
     -5,  0,  5,  5,  5,  5,  0, -5,
      0,  0,  5,  5,  5,  5,  0, -5,
    -10,  5,  5,  5,  5,  5,  0,-10,
    -10,  0,  5,  0,  0,  0,  0,-10,
    -20,-10,-10, -5, -5,-10,-10,-20,
];

// Stay behind the pawns
#[rustfmt::skip]
const KING_MIDGAME_TABLE: [i32; NUM_SQUARES] = [
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -20,-30,-30,-40,-40,-30,-30,-20,
    -10,-20,-20,-20,-20,-20,-20,-10,
     20, 20,  0,  0,  0,  0, 20, 20,
     20, 30, 10,  0,  0, 10, 30, 20,
];

// Centralize once the queens are gone
#[rustfmt::skip]
const KING_ENDGAME_TABLE: [i32; NUM_SQUARES] = [
    -50,-40,-30,-20,-20,-30,-40,-50,
    -30,-20,-10,  0,  0,-10,-20,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-30,  0,  0,  0,  0,-30,-30,
    -50,-30,-30,-30,-30,-30,-30,-50,
];

/// Phase contribution of each piece, pawns and kings count nothing
const PHASE_WEIGHTS: [i32; NUM_PIECES] = [0, 1, 1, 2, 4, 0];

/// Material plus piece-square tables, king table tapered by game phase
#[derive(Debug)]
pub struct PositionalEvaluator {
    name: String,
    piece_square_tables: [[i32; NUM_SQUARES]; NUM_PIECES],
}

impl Default for PositionalEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionalEvaluator {
    pub fn new() -> Self {
        Self {
            name: "Positional".to_string(),
            piece_square_tables: [
                PAWN_TABLE,
                KNIGHT_TABLE,
                BISHOP_TABLE,
                ROOK_TABLE,
                QUEEN_TABLE,
                KING_MIDGAME_TABLE,
            ],
        }
    }

    /// 0 for a bare endgame up to `TOTAL_PHASE` with all pieces on the board
    pub fn phase(board: &Board) -> i32 {
        let phase: i32 = Piece::PIECES
            .iter()
            .map(|&piece| {
                let count = board.positions.get_piece_bb(Side::White, piece).pop_count()
                    + board.positions.get_piece_bb(Side::Black, piece).pop_count();
                PHASE_WEIGHTS[piece.index()] * count as i32
            })
            .sum();
        phase.min(TOTAL_PHASE)
    }

    /// Table index for a piece of `side` standing on `square`
    #[inline(always)]
    fn table_index(side: Side, square: usize) -> usize {
        match side {
            Side::White => square ^ 56,
            Side::Black => square,
        }
    }

    /// White-relative piece-square score
    fn placement(&self, board: &Board, phase: i32) -> i32 {
        let mut score = 0;
        for side in Side::SIDES {
            let sign = if side == Side::White { 1 } else { -1 };
            for piece in Piece::PIECES {
                let table = &self.piece_square_tables[piece.index()];
                for square in board.positions.get_piece_bb(side, piece).iter_bits() {
                    let idx = Self::table_index(side, square);
                    let value = if piece == Piece::King {
                        (table[idx] * phase + KING_ENDGAME_TABLE[idx] * (TOTAL_PHASE - phase))
                            / TOTAL_PHASE
                    } else {
                        table[idx]
                    };
                    score += sign * value;
                }
            }
        }
        score
    }
}

impl Evaluator for PositionalEvaluator {
    fn evaluate(&self, board: &Board) -> i32 {
        let phase = Self::phase(board);
        let score = material_balance(board) + self.placement(board, phase);
        match board.stm {
            Side::White => score,
            Side::Black => -score,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
