use crate::{
    prelude::*,
    search::move_ordering::{SearchTables, mvv_lva, quiet_score},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    HashMove,
    GenCaptures,
    Captures,
    GenQuiets,
    Quiets,
    Done,
}

/// MovePicker: hands out moves one at a time, generating lazily in stages.
///
/// Order is hash move, captures by MVV-LVA, then quiets by killers and
/// history. Each stage is only generated once the previous one runs dry,
/// so an early beta cutoff skips quiet generation entirely.
///
/// The picker owns its buffer, which lets a split point take it over and
/// keep handing out the remaining moves to every attached thread.
///
/// # Usage
/// ```ignore
/// let mut picker = MovePicker::new(tt_move, ply);
/// while let Some(mv) = picker.next(&board, &tables) {
///     // Try move...
/// }
/// ```
#[derive(Clone, Debug)]
pub struct MovePicker {
    moves: MoveBuffer,
    scores: [i32; MAX_MOVES],
    current: usize,
    stage: Stage,
    hash_move: Move,
    ply: usize,
    captures_only: bool,
}

impl MovePicker {
    /// Full picker for the main search
    pub fn new(hash_move: Move, ply: usize) -> Self {
        Self {
            moves: MoveBuffer::new(),
            scores: [0; MAX_MOVES],
            current: 0,
            stage: Stage::HashMove,
            hash_move,
            ply,
            captures_only: false,
        }
    }

    /// Captures and queen promotions only, for quiescence
    pub fn captures(ply: usize) -> Self {
        Self {
            stage: Stage::GenCaptures,
            captures_only: true,
            ..Self::new(Move::NULL, ply)
        }
    }

    /// Number of moves generated so far
    pub fn generated(&self) -> usize {
        self.moves.len()
    }

    pub fn next(&mut self, board: &Board, tables: &SearchTables) -> Option<Move> {
        loop {
            match self.stage {
                Stage::HashMove => {
                    self.stage = Stage::GenCaptures;
                    // A colliding entry may hand us a move from another position
                    if board.is_pseudo_legal(self.hash_move) {
                        return Some(self.hash_move);
                    }
                    self.hash_move = Move::NULL;
                }
                Stage::GenCaptures => {
                    let start = self.moves.len();
                    board.generate_captures(&mut self.moves);
                    for i in start..self.moves.len() {
                        self.scores[i] = mvv_lva(board, self.moves.as_slice()[i]);
                    }
                    self.stage = Stage::Captures;
                }
                Stage::Captures => {
                    if let Some(mv) = self.pick() {
                        return Some(mv);
                    }
                    self.stage = if self.captures_only {
                        Stage::Done
                    } else {
                        Stage::GenQuiets
                    };
                }
                Stage::GenQuiets => {
                    let start = self.moves.len();
                    board.generate_quiets(&mut self.moves);
                    for i in start..self.moves.len() {
                        self.scores[i] = quiet_score(tables, self.ply, self.moves.as_slice()[i]);
                    }
                    self.stage = Stage::Quiets;
                }
                Stage::Quiets => {
                    if let Some(mv) = self.pick() {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    /// Selects the best remaining move of the current stage, skipping the hash move
    #[inline]
    fn pick(&mut self) -> Option<Move> {
        while self.current < self.moves.len() {
            let mut best_idx = self.current;
            for i in (self.current + 1)..self.moves.len() {
                if self.scores[i] > self.scores[best_idx] {
                    best_idx = i;
                }
            }
            self.moves.swap(self.current, best_idx);
            self.scores.swap(self.current, best_idx);

            let mv = self.moves.as_slice()[self.current];
            self.current += 1;
            if mv != self.hash_move {
                return Some(mv);
            }
        }
        None
    }

    #[cfg(test)]
    fn score_of(&self, mv: Move) -> Option<i32> {
        let idx = self.moves.iter().position(|&m| m == mv)?;
        Some(self.scores[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(picker: &mut MovePicker, board: &Board, tables: &SearchTables) -> Vec<Move> {
        std::iter::from_fn(|| picker.next(board, tables)).collect()
    }

    #[test]
    fn yields_every_move_once() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let tables = SearchTables::default();
        let mut all = MoveBuffer::new();
        board.generate_moves(&mut all);

        let hash_move = Move::from_uci(&board, "e2a6").unwrap();
        let mut picker = MovePicker::new(hash_move, 0);
        let picked = drain(&mut picker, &board, &tables);

        assert_eq!(picked[0], hash_move);
        assert_eq!(picked.len(), all.len());
        for mv in all.iter() {
            assert_eq!(picked.iter().filter(|&&m| m == *mv).count(), 1, "{mv}");
        }
    }

    #[test]
    fn captures_before_quiets_in_mvv_lva_order() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let tables = SearchTables::default();
        let mut picker = MovePicker::new(Move::NULL, 0);
        let picked = drain(&mut picker, &board, &tables);

        let first_quiet = picked.iter().position(|m| !m.is_noisy()).unwrap();
        assert!(picked[..first_quiet].iter().all(|m| m.is_noisy()));
        assert!(picked[first_quiet..].iter().all(|m| !m.is_noisy()));

        let scores: Vec<i32> = picked[..first_quiet]
            .iter()
            .map(|&m| picker.score_of(m).unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn killers_lead_the_quiets() {
        let board = Board::new();
        let mut tables = SearchTables::default();
        let killer = Move::from_uci(&board, "b1c3").unwrap();
        tables.update_killers(2, killer);
        let mut picker = MovePicker::new(Move::NULL, 2);
        assert_eq!(picker.next(&board, &tables), Some(killer));
    }

    #[test]
    fn foreign_hash_move_is_skipped() {
        let board = Board::new();
        let tables = SearchTables::default();
        // Black's e7e5 is not playable for white
        let mut picker = MovePicker::new(Move::new(52, 36, Move::DOUBLE_PAWN), 0);
        let picked = drain(&mut picker, &board, &tables);
        assert_eq!(picked.len(), 20);
        assert!(!picked.contains(&Move::new(52, 36, Move::DOUBLE_PAWN)));
    }

    #[test]
    fn quiescence_picker_stops_after_captures() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let tables = SearchTables::default();
        let mut picker = MovePicker::captures(0);
        let picked = drain(&mut picker, &board, &tables);
        assert!(!picked.is_empty());
        assert!(picked.iter().all(|m| m.is_noisy()));
        assert_eq!(picker.generated(), picked.len());
    }
}
