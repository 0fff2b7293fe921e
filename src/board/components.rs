use std::{
    fmt::Display,
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not},
    str::FromStr,
};

use crate::prelude::*;

#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Clone, Copy)]
#[repr(transparent)]
pub struct BitBoard(pub u64);

impl BitAndAssign for BitBoard {
    #[inline(always)]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0
    }
}

impl BitOrAssign for BitBoard {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0
    }
}

impl BitOr for BitBoard {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for BitBoard {
    type Output = Self;

    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitXor for BitBoard {
    type Output = Self;

    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl Not for BitBoard {
    type Output = Self;

    #[inline(always)]
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl BitBoard {
    pub const EMPTY: BitBoard = BitBoard(0);

    #[inline(always)]
    pub const fn from_square(index: usize) -> Self {
        Self(1 << index)
    }

    #[inline(always)]
    pub const fn set(&mut self, pos: usize) {
        self.0 |= 1 << pos;
    }

    #[inline(always)]
    pub const fn capture(&mut self, index: usize) {
        self.0 &= !(1 << index);
    }

    #[inline(always)]
    pub const fn pop_count(&self) -> u32 {
        self.0.count_ones()
    }

    #[inline(always)]
    pub const fn lsb(&self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        Some(self.0.trailing_zeros() as usize)
    }

    #[inline(always)]
    pub fn try_pop_lsb(&mut self) -> Option<usize> {
        let idx = self.lsb()?;
        self.0 &= self.0 - 1;
        Some(idx)
    }

    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn any(&self) -> bool {
        self.0 != 0
    }

    #[inline(always)]
    pub const fn contains_square(&self, index: usize) -> bool {
        (self.0 & (1 << index)) != 0
    }

    #[inline(always)]
    pub const fn iter_bits(&self) -> BitBoardIterator {
        BitBoardIterator { remaining: self.0 }
    }
}

/// Iterator that yields each set bit position in a BitBoard
pub struct BitBoardIterator {
    remaining: u64,
}

impl Iterator for BitBoardIterator {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.remaining.trailing_zeros() as usize;
        self.remaining &= self.remaining - 1;
        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let exact = self.remaining.count_ones() as usize;
        (exact, Some(exact))
    }
}

impl ExactSizeIterator for BitBoardIterator {}

#[derive(Default, Debug, Hash, PartialEq, Eq, PartialOrd, Clone, Copy)]
pub enum Side {
    #[default]
    White,
    Black,
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Side::White => write!(f, "White"),
            Side::Black => write!(f, "Black"),
        }
    }
}

impl Not for Side {
    type Output = Side;

    fn not(self) -> Self::Output {
        self.flip()
    }
}

impl Side {
    pub const SIDES: [Side; 2] = [Side::White, Side::Black];

    pub const fn flip(&self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            Side::White => 0,
            Side::Black => 1,
        }
    }

    /// Square offset of a single pawn push
    pub const fn forward(&self) -> isize {
        match self {
            Side::White => 8,
            Side::Black => -8,
        }
    }
}

#[derive(Default, PartialEq, Eq, Debug, PartialOrd, Clone, Copy, Hash)]
pub enum Piece {
    #[default]
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Piece::Pawn => write!(f, "Pawn"),
            Piece::Knight => write!(f, "Knight"),
            Piece::Bishop => write!(f, "Bishop"),
            Piece::Rook => write!(f, "Rook"),
            Piece::Queen => write!(f, "Queen"),
            Piece::King => write!(f, "King"),
        }
    }
}

impl Piece {
    pub const PIECES: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    pub const PIECE_CHARS: [[char; 6]; 2] = [
        ['P', 'N', 'B', 'R', 'Q', 'K'], // White
        ['p', 'n', 'b', 'r', 'q', 'k'], // Black
    ];

    pub const fn index(&self) -> usize {
        *self as usize
    }

    pub const fn to_char(&self, side: Side) -> char {
        Self::PIECE_CHARS[side.index()][self.index()]
    }

    pub fn from_char(c: char) -> Option<(Piece, Side)> {
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        let piece = match c.to_ascii_lowercase() {
            'p' => Piece::Pawn,
            'n' => Piece::Knight,
            'b' => Piece::Bishop,
            'r' => Piece::Rook,
            'q' => Piece::Queen,
            'k' => Piece::King,
            _ => return None,
        };
        Some((piece, side))
    }

    /// Material value in centipawns, used for MVV-LVA and delta pruning
    pub const fn value(&self) -> i32 {
        match self {
            Piece::Pawn => 100,
            Piece::Knight => 320,
            Piece::Bishop => 330,
            Piece::Rook => 500,
            Piece::Queen => 900,
            Piece::King => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceInfo {
    pub piece: Piece,
    pub side: Side,
}

impl PieceInfo {
    pub const fn new(piece: Piece, side: Side) -> Self {
        Self { piece, side }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights(pub u8);

impl CastlingRights {
    pub const WHITE_00: u8 = 0b0001;
    pub const WHITE_000: u8 = 0b0010;
    pub const BLACK_00: u8 = 0b0100;
    pub const BLACK_000: u8 = 0b1000;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    /// Rights that survive a move touching each square
    const MASKS: [u8; NUM_SQUARES] = {
        let mut masks = [0b1111u8; NUM_SQUARES];
        masks[0] = !Self::WHITE_000 & 0b1111;
        masks[4] = !(Self::WHITE_00 | Self::WHITE_000) & 0b1111;
        masks[7] = !Self::WHITE_00 & 0b1111;
        masks[56] = !Self::BLACK_000 & 0b1111;
        masks[60] = !(Self::BLACK_00 | Self::BLACK_000) & 0b1111;
        masks[63] = !Self::BLACK_00 & 0b1111;
        masks
    };

    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    pub const fn allows(&self, right: u8) -> bool {
        self.0 & right != 0
    }

    pub const fn kingside(side: Side) -> u8 {
        match side {
            Side::White => Self::WHITE_00,
            Side::Black => Self::BLACK_00,
        }
    }

    pub const fn queenside(side: Side) -> u8 {
        match side {
            Side::White => Self::WHITE_000,
            Side::Black => Self::BLACK_000,
        }
    }

    #[inline(always)]
    pub fn update(&mut self, from: usize, to: usize) {
        self.0 &= Self::MASKS[from] & Self::MASKS[to];
    }
}

impl Display for CastlingRights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (bit, c) in [
            (Self::WHITE_00, 'K'),
            (Self::WHITE_000, 'Q'),
            (Self::BLACK_00, 'k'),
            (Self::BLACK_000, 'q'),
        ] {
            if self.allows(bit) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for CastlingRights {
    type Err = miette::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "-" {
            return Ok(Self::NONE);
        }
        let mut rights = 0;
        for c in s.chars() {
            rights |= match c {
                'K' => Self::WHITE_00,
                'Q' => Self::WHITE_000,
                'k' => Self::BLACK_00,
                'q' => Self::BLACK_000,
                _ => bail!("Invalid castling character '{c}' in '{s}'"),
            };
        }
        Ok(Self(rights))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(usize);

impl Square {
    pub const fn new(index: usize) -> Option<Self> {
        if index < NUM_SQUARES {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Caller guarantees `index < 64`
    pub const fn from_index(index: usize) -> Self {
        debug_assert!(index < NUM_SQUARES);
        Self(index)
    }

    pub const fn from_coords(rank: usize, file: usize) -> Option<Self> {
        if rank < 8 && file < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    pub const fn index(&self) -> usize {
        self.0
    }

    /// Rank, 0 based
    pub const fn row(&self) -> usize {
        self.0 / 8
    }

    /// File, 0 based
    pub const fn col(&self) -> usize {
        self.0 % 8
    }
}

impl Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'a' + self.col() as u8) as char;
        let rank = (b'1' + self.row() as u8) as char;
        write!(f, "{file}{rank}")
    }
}

impl FromStr for Square {
    type Err = miette::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        ensure!(bytes.len() == 2, "Invalid square '{s}': expected two characters");
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        ensure!(
            (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank),
            "Invalid square '{s}'"
        );
        Square::from_coords((rank - b'1') as usize, (file - b'a') as usize)
            .ok_or_else(|| miette!("Invalid square '{s}'"))
    }
}

/// Piece placement, kept as bitboards plus a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardState {
    pieces: [[BitBoard; NUM_PIECES]; NUM_SIDES],
    sides: [BitBoard; NUM_SIDES],
    mailbox: [Option<PieceInfo>; NUM_SQUARES],
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            pieces: [[BitBoard::EMPTY; NUM_PIECES]; NUM_SIDES],
            sides: [BitBoard::EMPTY; NUM_SIDES],
            mailbox: [None; NUM_SQUARES],
        }
    }
}

impl BoardState {
    #[inline(always)]
    pub fn get_piece_bb(&self, side: Side, piece: Piece) -> BitBoard {
        self.pieces[side.index()][piece.index()]
    }

    #[inline(always)]
    pub fn get_side_bb(&self, side: Side) -> BitBoard {
        self.sides[side.index()]
    }

    #[inline(always)]
    pub fn all_pieces(&self) -> BitBoard {
        self.sides[0] | self.sides[1]
    }

    #[inline(always)]
    pub fn piece_at(&self, square: usize) -> Option<PieceInfo> {
        self.mailbox[square]
    }

    #[inline(always)]
    pub fn king_square(&self, side: Side) -> Option<usize> {
        self.get_piece_bb(side, Piece::King).lsb()
    }

    #[inline(always)]
    pub fn set(&mut self, square: usize, info: PieceInfo) {
        self.pieces[info.side.index()][info.piece.index()].set(square);
        self.sides[info.side.index()].set(square);
        self.mailbox[square] = Some(info);
    }

    #[inline(always)]
    pub fn remove(&mut self, square: usize) -> Option<PieceInfo> {
        let info = self.mailbox[square].take()?;
        self.pieces[info.side.index()][info.piece.index()].capture(square);
        self.sides[info.side.index()].capture(square);
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_parse_and_display() {
        let sq: Square = "e4".parse().unwrap();
        assert_eq!(sq.index(), 28);
        assert_eq!(sq.to_string(), "e4");
        assert!("i9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
    }

    #[test]
    fn castling_rights_roundtrip_and_update() {
        let mut rights: CastlingRights = "KQkq".parse().unwrap();
        assert_eq!(rights, CastlingRights::ALL);
        rights.update(7, 15);
        assert_eq!(rights.to_string(), "Qkq");
        rights.update(60, 59);
        assert_eq!(rights.to_string(), "Q");
        assert!("KX".parse::<CastlingRights>().is_err());
    }

    #[test]
    fn board_state_set_remove() {
        let mut state = BoardState::default();
        state.set(12, PieceInfo::new(Piece::Knight, Side::Black));
        assert!(state.get_piece_bb(Side::Black, Piece::Knight).contains_square(12));
        assert_eq!(state.all_pieces().pop_count(), 1);
        let removed = state.remove(12);
        assert_eq!(removed, Some(PieceInfo::new(Piece::Knight, Side::Black)));
        assert!(state.all_pieces().is_empty());
        assert_eq!(state.remove(12), None);
    }
}
