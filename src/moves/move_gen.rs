use crate::moves::attacks::ATTACKS;
use crate::prelude::*;

impl Board {
    /// Captures, en passant and queen promotions (capturing or not)
    pub fn generate_captures(&self, buf: &mut MoveBuffer) {
        let us = self.stm;
        let enemies = self.positions.get_side_bb(!us);
        self.generate_pawn_moves(buf, true);
        self.generate_piece_moves(buf, enemies, Move::CAPTURE);
    }

    /// Quiet moves, under-promotions and castling
    pub fn generate_quiets(&self, buf: &mut MoveBuffer) {
        let empty = !self.positions.all_pieces();
        self.generate_pawn_moves(buf, false);
        self.generate_piece_moves(buf, empty, Move::QUIET);
        self.generate_castling(buf);
    }

    /// All pseudo-legal moves, tactical moves first
    pub fn generate_moves(&self, buf: &mut MoveBuffer) {
        self.generate_captures(buf);
        self.generate_quiets(buf);
    }

    /// Pseudo-legal moves filtered through make/unmake
    pub fn legal_moves(&self) -> MoveBuffer {
        let mut pseudo = MoveBuffer::new();
        self.generate_moves(&mut pseudo);

        let mut legal = MoveBuffer::new();
        let mut scratch = *self;
        let us = self.stm;
        for &m in pseudo.iter() {
            let undo = scratch.make_move(m);
            if !scratch.is_in_check(us) {
                legal.push(m);
            }
            scratch.unmake_move(m, undo);
        }
        legal
    }

    /// True when `m` could have been produced by the generators for this position.
    /// Used to vet hash moves, which may come from a colliding entry.
    pub fn is_pseudo_legal(&self, m: Move) -> bool {
        if m.is_null() {
            return false;
        }
        match self.positions.piece_at(m.from_sq()) {
            Some(info) if info.side == self.stm => {}
            _ => return false,
        }
        let mut buf = MoveBuffer::new();
        if m.is_noisy() {
            self.generate_captures(&mut buf);
        } else {
            self.generate_quiets(&mut buf);
        }
        buf.contains(m)
    }

    pub fn is_square_attacked(&self, square: usize, by: Side) -> bool {
        let pos = &self.positions;
        let occupied = pos.all_pieces();

        if (ATTACKS.pawn_attacks(!by, square) & pos.get_piece_bb(by, Piece::Pawn)).any() {
            return true;
        }
        if (ATTACKS.knight[square] & pos.get_piece_bb(by, Piece::Knight)).any() {
            return true;
        }
        if (ATTACKS.king[square] & pos.get_piece_bb(by, Piece::King)).any() {
            return true;
        }
        let queens = pos.get_piece_bb(by, Piece::Queen);
        let diagonal = pos.get_piece_bb(by, Piece::Bishop) | queens;
        if (ATTACKS.bishop(square, occupied) & diagonal).any() {
            return true;
        }
        let straight = pos.get_piece_bb(by, Piece::Rook) | queens;
        (ATTACKS.rook(square, occupied) & straight).any()
    }

    #[inline]
    pub fn is_in_check(&self, side: Side) -> bool {
        match self.positions.king_square(side) {
            Some(king) => self.is_square_attacked(king, !side),
            None => false,
        }
    }

    /// Whether the side to move is in check
    #[inline]
    pub fn in_check(&self) -> bool {
        self.is_in_check(self.stm)
    }

    fn generate_pawn_moves(&self, buf: &mut MoveBuffer, tactical: bool) {
        let us = self.stm;
        let pos = &self.positions;
        let enemies = pos.get_side_bb(!us);
        let occupied = pos.all_pieces();
        let (promo_rank, start_rank) = match us {
            Side::White => (7, 1),
            Side::Black => (0, 6),
        };

        for from in pos.get_piece_bb(us, Piece::Pawn).iter_bits() {
            let attacks = ATTACKS.pawn_attacks(us, from);
            for to in (attacks & enemies).iter_bits() {
                if to / 8 == promo_rank {
                    if tactical {
                        buf.push(Move::new(from, to, Move::PROMO_CAPTURE_Q));
                    } else {
                        for flag in [Move::PROMO_CAPTURE_N, Move::PROMO_CAPTURE_B, Move::PROMO_CAPTURE_R] {
                            buf.push(Move::new(from, to, flag));
                        }
                    }
                } else if tactical {
                    buf.push(Move::new(from, to, Move::CAPTURE));
                }
            }

            if tactical
                && let Some(ep) = self.enpassant_square
                && attacks.contains_square(ep.index())
            {
                buf.push(Move::new(from, ep.index(), Move::EN_PASSANT));
            }

            let to = (from as isize + us.forward()) as usize;
            if occupied.contains_square(to) {
                continue;
            }
            if to / 8 == promo_rank {
                if tactical {
                    buf.push(Move::new(from, to, Move::PROMO_Q));
                } else {
                    for flag in [Move::PROMO_N, Move::PROMO_B, Move::PROMO_R] {
                        buf.push(Move::new(from, to, flag));
                    }
                }
            } else if !tactical {
                buf.push(Move::new(from, to, Move::QUIET));
                let double = (to as isize + us.forward()) as usize;
                if from / 8 == start_rank && !occupied.contains_square(double) {
                    buf.push(Move::new(from, double, Move::DOUBLE_PAWN));
                }
            }
        }
    }

    fn generate_piece_moves(&self, buf: &mut MoveBuffer, targets: BitBoard, flag: u16) {
        let us = self.stm;
        let occupied = self.positions.all_pieces();
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
            for from in self.positions.get_piece_bb(us, piece).iter_bits() {
                let attacks = ATTACKS.piece_attacks(piece, us, from, occupied) & targets;
                for to in attacks.iter_bits() {
                    buf.push(Move::new(from, to, flag));
                }
            }
        }
    }

    /// The destination square is left to the caller's legality check
    fn generate_castling(&self, buf: &mut MoveBuffer) {
        let us = self.stm;
        let base = match us {
            Side::White => 0,
            Side::Black => 56,
        };
        let king = base + 4;
        let occupied = self.positions.all_pieces();
        let rook = Some(PieceInfo::new(Piece::Rook, us));

        if self.positions.piece_at(king) != Some(PieceInfo::new(Piece::King, us)) {
            return;
        }
        let can_kingside = self.castling_rights.allows(CastlingRights::kingside(us))
            && self.positions.piece_at(base + 7) == rook
            && !occupied.contains_square(base + 5)
            && !occupied.contains_square(base + 6);
        let can_queenside = self.castling_rights.allows(CastlingRights::queenside(us))
            && self.positions.piece_at(base) == rook
            && !occupied.contains_square(base + 1)
            && !occupied.contains_square(base + 2)
            && !occupied.contains_square(base + 3);
        if !can_kingside && !can_queenside {
            return;
        }
        if self.is_square_attacked(king, !us) {
            return;
        }
        if can_kingside && !self.is_square_attacked(base + 5, !us) {
            buf.push(Move::new(king, base + 6, Move::KING_CASTLE));
        }
        if can_queenside && !self.is_square_attacked(base + 3, !us) {
            buf.push(Move::new(king, base + 2, Move::QUEEN_CASTLE));
        }
    }
}
