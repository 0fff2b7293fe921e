use crate::prelude::*;

/// Plain material count: P 100, N 320, B 330, R 500, Q 900
#[derive(Debug)]
pub struct MaterialEvaluator {
    name: String,
}

impl Default for MaterialEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialEvaluator {
    pub fn new() -> Self {
        Self {
            name: "Material".to_string(),
        }
    }
}

/// White material minus black material
pub fn material_balance(board: &Board) -> i32 {
    let mut score = 0;
    for piece in Piece::PIECES {
        let white = board.positions.get_piece_bb(Side::White, piece).pop_count() as i32;
        let black = board.positions.get_piece_bb(Side::Black, piece).pop_count() as i32;
        score += (white - black) * piece.value();
    }
    score
}

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, board: &Board) -> i32 {
        let score = material_balance(board);
        // Convert to side-to-move perspective
        match board.stm {
            Side::White => score,
            Side::Black => -score,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
