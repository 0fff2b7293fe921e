pub mod attacks;
pub mod move_buffer;
pub mod move_gen;

use std::fmt::Display;

use crate::prelude::*;

/// A move packed into 16 bits: from (6), to (6), flags (4).
///
/// `Move(0)` (a1a1, quiet) can never be generated and doubles as the null move.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Move(pub u16);

impl Move {
    pub const NULL: Move = Move(0);

    pub const QUIET: u16 = 0b0000;
    pub const DOUBLE_PAWN: u16 = 0b0001;
    pub const KING_CASTLE: u16 = 0b0010;
    pub const QUEEN_CASTLE: u16 = 0b0011;
    pub const CAPTURE: u16 = 0b0100;
    pub const EN_PASSANT: u16 = 0b0101;
    pub const PROMO_N: u16 = 0b1000;
    pub const PROMO_B: u16 = 0b1001;
    pub const PROMO_R: u16 = 0b1010;
    pub const PROMO_Q: u16 = 0b1011;
    pub const PROMO_CAPTURE_N: u16 = 0b1100;
    pub const PROMO_CAPTURE_B: u16 = 0b1101;
    pub const PROMO_CAPTURE_R: u16 = 0b1110;
    pub const PROMO_CAPTURE_Q: u16 = 0b1111;

    const PROMOTION_BIT: u16 = 0b1000;

    #[inline(always)]
    pub const fn new(from: usize, to: usize, flags: u16) -> Self {
        Self((from as u16) | ((to as u16) << 6) | (flags << 12))
    }

    #[inline(always)]
    pub const fn from_sq(&self) -> usize {
        (self.0 & 0x3F) as usize
    }

    #[inline(always)]
    pub const fn to_sq(&self) -> usize {
        ((self.0 >> 6) & 0x3F) as usize
    }

    #[inline(always)]
    pub const fn flags(&self) -> u16 {
        self.0 >> 12
    }

    #[inline(always)]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn is_capture(&self) -> bool {
        self.flags() & Self::CAPTURE != 0
    }

    #[inline(always)]
    pub const fn is_en_passant(&self) -> bool {
        self.flags() == Self::EN_PASSANT
    }

    #[inline(always)]
    pub const fn is_double_push(&self) -> bool {
        self.flags() == Self::DOUBLE_PAWN
    }

    #[inline(always)]
    pub const fn is_castle(&self) -> bool {
        matches!(self.flags(), Self::KING_CASTLE | Self::QUEEN_CASTLE)
    }

    #[inline(always)]
    pub const fn is_promotion(&self) -> bool {
        self.flags() & Self::PROMOTION_BIT != 0
    }

    /// Captures and promotions
    #[inline(always)]
    pub const fn is_tactical(&self) -> bool {
        self.is_capture() || self.is_promotion()
    }

    /// Moves produced by `generate_captures`: captures and queen promotions
    #[inline(always)]
    pub const fn is_noisy(&self) -> bool {
        match self.promotion_piece() {
            Some(Piece::Queen) => true,
            Some(_) => false,
            None => self.is_capture(),
        }
    }

    pub const fn promotion_piece(&self) -> Option<Piece> {
        if !self.is_promotion() {
            return None;
        }
        Some(match self.flags() & 0b11 {
            0 => Piece::Knight,
            1 => Piece::Bishop,
            2 => Piece::Rook,
            _ => Piece::Queen,
        })
    }

    pub fn uci(&self) -> String {
        let mut s = format!(
            "{}{}",
            Square::from_index(self.from_sq()),
            Square::from_index(self.to_sq())
        );
        if let Some(piece) = self.promotion_piece() {
            s.push(piece.to_char(Side::Black));
        }
        s
    }

    /// Resolves a UCI string against the legal moves of `board`
    pub fn from_uci(board: &Board, uci: &str) -> Result<Move> {
        board
            .legal_moves()
            .into_iter()
            .find(|m| m.uci() == uci)
            .ok_or_else(|| miette!("'{uci}' is not a legal move in {}", board.to_fen()))
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            return write!(f, "0000");
        }
        write!(f, "{}", self.uci())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing() {
        let m = Move::new(12, 28, Move::DOUBLE_PAWN);
        assert_eq!(m.from_sq(), 12);
        assert_eq!(m.to_sq(), 28);
        assert!(m.is_double_push());
        assert!(!m.is_capture());
        assert_eq!(m.uci(), "e2e4");

        let promo = Move::new(52, 61, Move::PROMO_CAPTURE_N);
        assert!(promo.is_capture());
        assert!(promo.is_promotion());
        assert_eq!(promo.promotion_piece(), Some(Piece::Knight));
        assert_eq!(promo.uci(), "e7f8n");
    }

    #[test]
    fn from_uci_requires_legal_move() {
        let board = Board::new();
        assert_eq!(Move::from_uci(&board, "g1f3").unwrap().to_sq(), 21);
        assert!(Move::from_uci(&board, "e2e5").is_err());
    }
}
