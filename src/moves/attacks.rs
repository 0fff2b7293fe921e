use crate::prelude::*;

/// Rays indexed by direction; the first four grow towards higher squares
const NORTH: usize = 0;
const EAST: usize = 1;
const NORTHEAST: usize = 2;
const NORTHWEST: usize = 3;
const SOUTH: usize = 4;
const WEST: usize = 5;
const SOUTHEAST: usize = 6;
const SOUTHWEST: usize = 7;

/// (rank step, file step) per direction, same order as the indices above
const STEPS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (1, 1),
    (1, -1),
    (-1, 0),
    (0, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug)]
pub struct AttackTables {
    pub knight: [BitBoard; NUM_SQUARES],
    pub king: [BitBoard; NUM_SQUARES],
    /// Squares attacked by a pawn of the given side standing on the square
    pub pawn: [[BitBoard; NUM_SQUARES]; NUM_SIDES],
    rays: [[BitBoard; NUM_SQUARES]; 8],
}

pub static ATTACKS: AttackTables = AttackTables::new();

const fn step_targets(steps: &[(i32, i32)], square: usize) -> BitBoard {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut bb = BitBoard(0);
    let mut i = 0;
    while i < steps.len() {
        let (dr, df) = steps[i];
        let (r, f) = (rank + dr, file + df);
        if r >= 0 && r < 8 && f >= 0 && f < 8 {
            bb.set((r * 8 + f) as usize);
        }
        i += 1;
    }
    bb
}

impl AttackTables {
    pub const fn new() -> Self {
        const KNIGHT_STEPS: [(i32, i32); 8] = [
            (2, 1),
            (2, -1),
            (-2, 1),
            (-2, -1),
            (1, 2),
            (1, -2),
            (-1, 2),
            (-1, -2),
        ];

        let mut tables = Self {
            knight: [BitBoard(0); NUM_SQUARES],
            king: [BitBoard(0); NUM_SQUARES],
            pawn: [[BitBoard(0); NUM_SQUARES]; NUM_SIDES],
            rays: [[BitBoard(0); NUM_SQUARES]; 8],
        };

        let mut sq = 0;
        while sq < NUM_SQUARES {
            tables.knight[sq] = step_targets(&KNIGHT_STEPS, sq);
            tables.king[sq] = step_targets(&STEPS, sq);
            tables.pawn[0][sq] = step_targets(&[(1, 1), (1, -1)], sq);
            tables.pawn[1][sq] = step_targets(&[(-1, 1), (-1, -1)], sq);

            let mut dir = 0;
            while dir < 8 {
                let (dr, df) = STEPS[dir];
                let mut r = (sq / 8) as i32 + dr;
                let mut f = (sq % 8) as i32 + df;
                let mut ray = BitBoard(0);
                while r >= 0 && r < 8 && f >= 0 && f < 8 {
                    ray.set((r * 8 + f) as usize);
                    r += dr;
                    f += df;
                }
                tables.rays[dir][sq] = ray;
                dir += 1;
            }
            sq += 1;
        }
        tables
    }

    #[inline(always)]
    fn ray_attacks(&self, dir: usize, square: usize, occupied: BitBoard) -> BitBoard {
        let ray = self.rays[dir][square];
        let blockers = (ray & occupied).0;
        if blockers == 0 {
            return ray;
        }
        let first = if dir < SOUTH {
            blockers.trailing_zeros() as usize
        } else {
            63 - blockers.leading_zeros() as usize
        };
        ray ^ self.rays[dir][first]
    }

    #[inline(always)]
    pub fn rook(&self, square: usize, occupied: BitBoard) -> BitBoard {
        self.ray_attacks(NORTH, square, occupied)
            | self.ray_attacks(SOUTH, square, occupied)
            | self.ray_attacks(EAST, square, occupied)
            | self.ray_attacks(WEST, square, occupied)
    }

    #[inline(always)]
    pub fn bishop(&self, square: usize, occupied: BitBoard) -> BitBoard {
        self.ray_attacks(NORTHEAST, square, occupied)
            | self.ray_attacks(NORTHWEST, square, occupied)
            | self.ray_attacks(SOUTHEAST, square, occupied)
            | self.ray_attacks(SOUTHWEST, square, occupied)
    }

    #[inline(always)]
    pub fn queen(&self, square: usize, occupied: BitBoard) -> BitBoard {
        self.rook(square, occupied) | self.bishop(square, occupied)
    }

    #[inline(always)]
    pub fn pawn_attacks(&self, side: Side, square: usize) -> BitBoard {
        self.pawn[side.index()][square]
    }

    /// Attack set of `piece` from `square`; pawns use the capture pattern
    pub fn piece_attacks(&self, piece: Piece, side: Side, square: usize, occupied: BitBoard) -> BitBoard {
        match piece {
            Piece::Pawn => self.pawn_attacks(side, square),
            Piece::Knight => self.knight[square],
            Piece::Bishop => self.bishop(square, occupied),
            Piece::Rook => self.rook(square, occupied),
            Piece::Queen => self.queen(square, occupied),
            Piece::King => self.king[square],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaper_counts() {
        assert_eq!(ATTACKS.knight[0].pop_count(), 2);
        assert_eq!(ATTACKS.knight[27].pop_count(), 8);
        assert_eq!(ATTACKS.king[0].pop_count(), 3);
        assert_eq!(ATTACKS.king[27].pop_count(), 8);
        assert_eq!(ATTACKS.pawn[0][8].pop_count(), 1);
        assert!(ATTACKS.pawn[1][28].contains_square(19));
    }

    #[test]
    fn sliders_stop_at_blockers() {
        let empty = BitBoard(0);
        assert_eq!(ATTACKS.rook(0, empty).pop_count(), 14);
        assert_eq!(ATTACKS.bishop(27, empty).pop_count(), 13);

        // Rook a1 with a blocker on a4 and d1
        let occupied = BitBoard::from_square(24) | BitBoard::from_square(3);
        let attacks = ATTACKS.rook(0, occupied);
        assert!(attacks.contains_square(24));
        assert!(!attacks.contains_square(32));
        assert!(attacks.contains_square(3));
        assert!(!attacks.contains_square(4));
        assert_eq!(attacks.pop_count(), 6);
    }
}
