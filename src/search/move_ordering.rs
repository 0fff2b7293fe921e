use crate::prelude::*;

/// Victim values for MVV-LVA, king included for completeness
const VICTIM_SCORES: [i32; NUM_PIECES] = [100, 320, 330, 500, 900, 20_000];

pub const MVV_LVA_OFFSET: i32 = 2_000_000;
pub const KILLER_MOVE_SCORE: i32 = 1_000_000;

/// Killer moves and the history table. Owned by each working tree,
/// copied down on join and handed back up on an improving merge.
#[derive(Debug, Clone)]
pub struct SearchTables {
    pub killer_moves: [[Move; 2]; MAX_PLY],
    pub history: [[i32; NUM_SQUARES]; NUM_SQUARES],
}

impl Default for SearchTables {
    fn default() -> Self {
        Self {
            killer_moves: [[Move::NULL; 2]; MAX_PLY],
            history: [[0; NUM_SQUARES]; NUM_SQUARES],
        }
    }
}

impl SearchTables {
    /// Clears `killer_moves`.
    /// `history` is not cleared as it persists across searches
    pub fn clear_killers(&mut self) {
        self.killer_moves = [[Move::NULL; 2]; MAX_PLY];
    }

    /// Stores `mv` in `killer_moves[ply][0]`, backing up the previous occupant
    pub fn update_killers(&mut self, ply: usize, mv: Move) {
        if ply < MAX_PLY && self.killer_moves[ply][0] != mv {
            self.killer_moves[ply][1] = self.killer_moves[ply][0];
            self.killer_moves[ply][0] = mv;
        }
    }

    /// Indexes as `history[mv.from][mv.to]`, rewards are `depth ^ 2`
    pub fn update_history(&mut self, mv: Move, depth: i32) {
        let entry = &mut self.history[mv.from_sq()][mv.to_sq()];
        *entry = entry.saturating_add(depth * depth);
    }

    /// Halves every history score
    pub fn decay_history(&mut self) {
        self.history
            .iter_mut()
            .flatten()
            .for_each(|score| *score /= 2);
    }

    #[inline(always)]
    pub fn killers(&self, ply: usize) -> [Move; 2] {
        self.killer_moves.get(ply).copied().unwrap_or([Move::NULL; 2])
    }

    #[inline(always)]
    pub fn history_score(&self, mv: Move) -> i32 {
        self.history[mv.from_sq()][mv.to_sq()]
    }
}

/// Most Valuable Victim - Least Valuable Attacker
pub fn mvv_lva(board: &Board, mv: Move) -> i32 {
    let attacker = board
        .piece_at(mv.from_sq())
        .map_or(0, |info| info.piece.value());
    let victim = board.victim(mv).map_or(0, |piece| VICTIM_SCORES[piece.index()]);
    let promotion = mv.promotion_piece().map_or(0, |piece| piece.value());
    MVV_LVA_OFFSET + victim * 10 + promotion - attacker
}

/// Killers first, then history
pub fn quiet_score(tables: &SearchTables, ply: usize, mv: Move) -> i32 {
    let killers = tables.killers(ply);
    if mv == killers[0] {
        KILLER_MOVE_SCORE + 1
    } else if mv == killers[1] {
        KILLER_MOVE_SCORE
    } else {
        tables.history_score(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mvv_lva_prefers_valuable_victims() {
        let board = Board::from_fen("4k3/8/2q1r3/3P4/8/8/8/K7 w - - 0 1").unwrap();
        let takes_queen = Move::from_uci(&board, "d5c6").unwrap();
        let takes_rook = Move::from_uci(&board, "d5e6").unwrap();
        assert!(mvv_lva(&board, takes_queen) > mvv_lva(&board, takes_rook));
    }

    #[test]
    fn killers_shift() {
        let mut tables = SearchTables::default();
        let a = Move::new(1, 18, Move::QUIET);
        let b = Move::new(6, 21, Move::QUIET);
        tables.update_killers(3, a);
        tables.update_killers(3, a);
        assert_eq!(tables.killers(3), [a, Move::NULL]);
        tables.update_killers(3, b);
        assert_eq!(tables.killers(3), [b, a]);
        assert!(quiet_score(&tables, 3, b) > quiet_score(&tables, 3, a));
        assert_eq!(tables.killers(MAX_PLY + 3), [Move::NULL; 2]);
    }

    #[test]
    fn history_decays() {
        let mut tables = SearchTables::default();
        let mv = Move::new(1, 18, Move::QUIET);
        tables.update_history(mv, 6);
        assert_eq!(tables.history_score(mv), 36);
        tables.decay_history();
        assert_eq!(tables.history_score(mv), 18);
    }
}
