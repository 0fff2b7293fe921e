pub mod components;
pub mod fen;
pub mod zobrist;

#[cfg(test)]
mod tests;

use std::fmt::Display;

use crate::board::zobrist::{ZOBRIST, calculate_hash};
use crate::moves::attacks::ATTACKS;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub positions: BoardState,
    pub stm: Side,
    pub castling_rights: CastlingRights,
    pub enpassant_square: Option<Square>,
    pub halfmove_clock: u8,
    pub fullmove_number: u16,
    pub hash: u64,
}

/// Irreversible state saved by [`Board::make_move`], consumed by [`Board::unmake_move`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undo {
    moved: Option<Piece>,
    captured: Option<Piece>,
    castling_rights: CastlingRights,
    enpassant_square: Option<Square>,
    halfmove_clock: u8,
    hash: u64,
}

impl Undo {
    pub fn captured(&self) -> Option<Piece> {
        self.captured
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard starting position
    pub fn new() -> Self {
        const BACK_RANK: [Piece; 8] = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];

        let mut board = Self::empty();
        for (file, piece) in BACK_RANK.into_iter().enumerate() {
            board.positions.set(file, PieceInfo::new(piece, Side::White));
            board.positions.set(8 + file, PieceInfo::new(Piece::Pawn, Side::White));
            board.positions.set(48 + file, PieceInfo::new(Piece::Pawn, Side::Black));
            board.positions.set(56 + file, PieceInfo::new(piece, Side::Black));
        }
        board.castling_rights = CastlingRights::ALL;
        board.hash = calculate_hash(&board);
        board
    }

    pub(crate) fn empty() -> Self {
        Self {
            positions: BoardState::default(),
            stm: Side::White,
            castling_rights: CastlingRights::NONE,
            enpassant_square: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        fen::parse_fen(fen)
    }

    pub fn to_fen(&self) -> String {
        fen::to_fen(self)
    }

    #[inline(always)]
    pub fn piece_at(&self, square: usize) -> Option<PieceInfo> {
        self.positions.piece_at(square)
    }

    /// Piece taken by `m`, if any
    #[inline(always)]
    pub fn victim(&self, m: Move) -> Option<Piece> {
        if m.is_en_passant() {
            Some(Piece::Pawn)
        } else if m.is_capture() {
            self.positions.piece_at(m.to_sq()).map(|info| info.piece)
        } else {
            None
        }
    }

    /// Zobrist key of the en passant file, or 0 when the side to move cannot capture there
    #[inline(always)]
    pub fn en_passant_key(&self) -> u64 {
        match self.enpassant_square {
            Some(ep)
                if (ATTACKS.pawn_attacks(!self.stm, ep.index())
                    & self.positions.get_piece_bb(self.stm, Piece::Pawn))
                .any() =>
            {
                ZOBRIST.en_passant_file[ep.col()]
            }
            _ => 0,
        }
    }

    pub fn has_non_pawn_material(&self, side: Side) -> bool {
        let pieces = self.positions.get_side_bb(side);
        let pawns = self.positions.get_piece_bb(side, Piece::Pawn);
        let king = self.positions.get_piece_bb(side, Piece::King);
        (pieces & !(pawns | king)).any()
    }

    /// Applies a pseudo-legal move. Legality is the caller's job: check
    /// `is_in_check(moved_side)` afterwards and unmake if needed.
    pub fn make_move(&mut self, m: Move) -> Undo {
        let mut undo = Undo {
            moved: None,
            captured: None,
            castling_rights: self.castling_rights,
            enpassant_square: self.enpassant_square,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        };
        let (from, to) = (m.from_sq(), m.to_sq());
        let us = self.stm;
        let them = !us;
        // Keyed on the pawns in place before the move
        let old_ep = self.en_passant_key();

        let Some(info) = self.positions.remove(from) else {
            debug_assert!(false, "make_move {m} with empty from square");
            return undo;
        };
        undo.moved = Some(info.piece);

        let mut hash = self.hash ^ old_ep ^ ZOBRIST.castling[self.castling_rights.index()];
        hash ^= ZOBRIST.piece(us, info.piece, from);

        let captured_on = if m.is_en_passant() {
            (to as isize - us.forward()) as usize
        } else {
            to
        };
        if let Some(victim) = self.positions.remove(captured_on) {
            hash ^= ZOBRIST.piece(them, victim.piece, captured_on);
            undo.captured = Some(victim.piece);
        }

        let placed = m.promotion_piece().unwrap_or(info.piece);
        self.positions.set(to, PieceInfo::new(placed, us));
        hash ^= ZOBRIST.piece(us, placed, to);

        if m.is_castle() {
            let (rook_from, rook_to) = castle_rook_squares(m);
            if let Some(rook) = self.positions.remove(rook_from) {
                self.positions.set(rook_to, rook);
                hash ^= ZOBRIST.piece(us, Piece::Rook, rook_from);
                hash ^= ZOBRIST.piece(us, Piece::Rook, rook_to);
            }
        }

        self.castling_rights.update(from, to);
        self.enpassant_square = if m.is_double_push() {
            Square::new((from as isize + us.forward()) as usize)
        } else {
            None
        };
        self.halfmove_clock = if info.piece == Piece::Pawn || undo.captured.is_some() {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };
        if us == Side::Black {
            self.fullmove_number += 1;
        }
        self.stm = them;

        hash ^= ZOBRIST.black_to_move;
        hash ^= ZOBRIST.castling[self.castling_rights.index()];
        self.hash = hash ^ self.en_passant_key();
        undo
    }

    pub fn unmake_move(&mut self, m: Move, undo: Undo) {
        self.stm = !self.stm;
        let us = self.stm;
        if us == Side::Black {
            self.fullmove_number = self.fullmove_number.saturating_sub(1);
        }

        if let Some(moved) = undo.moved {
            let (from, to) = (m.from_sq(), m.to_sq());
            if m.is_castle() {
                let (rook_from, rook_to) = castle_rook_squares(m);
                if let Some(rook) = self.positions.remove(rook_to) {
                    self.positions.set(rook_from, rook);
                }
            }
            self.positions.remove(to);
            self.positions.set(from, PieceInfo::new(moved, us));
            if let Some(captured) = undo.captured {
                let captured_on = if m.is_en_passant() {
                    (to as isize - us.forward()) as usize
                } else {
                    to
                };
                self.positions.set(captured_on, PieceInfo::new(captured, !us));
            }
        }

        self.castling_rights = undo.castling_rights;
        self.enpassant_square = undo.enpassant_square;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    /// Passes the turn
    pub fn make_null_move(&mut self) -> Undo {
        let undo = Undo {
            moved: None,
            captured: None,
            castling_rights: self.castling_rights,
            enpassant_square: self.enpassant_square,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        };
        self.hash ^= self.en_passant_key() ^ ZOBRIST.black_to_move;
        self.enpassant_square = None;
        self.stm = !self.stm;
        self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        undo
    }

    pub fn unmake_null_move(&mut self, undo: Undo) {
        self.stm = !self.stm;
        self.enpassant_square = undo.enpassant_square;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }
}

#[inline(always)]
fn castle_rook_squares(m: Move) -> (usize, usize) {
    let base = m.to_sq() & !7;
    if m.flags() == Move::KING_CASTLE {
        (base + 7, base + 5)
    } else {
        (base, base + 3)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let c = self
                    .positions
                    .piece_at(rank * 8 + file)
                    .map_or('.', |info| info.piece.to_char(info.side));
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "\n   a b c d e f g h")?;
        write!(f, "\n{} | hash {:016x}", self.to_fen(), self.hash)
    }
}
