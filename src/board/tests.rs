use crate::board::zobrist::calculate_hash;
use crate::prelude::*;
use crate::utils::perft::perft;

const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

fn perft_nodes(fen: &str, depth: u8) -> u64 {
    let mut board = Board::from_fen(fen).unwrap();
    perft(&mut board, depth, false).nodes
}

#[cfg(test)]
mod perft_tests {
    use super::*;

    #[test]
    fn start_position() {
        assert_eq!(perft_nodes(START_FEN, 1), 20);
        assert_eq!(perft_nodes(START_FEN, 2), 400);
        assert_eq!(perft_nodes(START_FEN, 3), 8_902);
        assert_eq!(perft_nodes(START_FEN, 4), 197_281);
    }

    #[test]
    fn kiwipete() {
        assert_eq!(perft_nodes(KIWIPETE, 1), 48);
        assert_eq!(perft_nodes(KIWIPETE, 2), 2_039);
        assert_eq!(perft_nodes(KIWIPETE, 3), 97_862);
    }

    #[test]
    fn endgame_with_en_passant_pins() {
        assert_eq!(perft_nodes(POSITION_3, 1), 14);
        assert_eq!(perft_nodes(POSITION_3, 2), 191);
        assert_eq!(perft_nodes(POSITION_3, 3), 2_812);
        assert_eq!(perft_nodes(POSITION_3, 4), 43_238);
    }

    #[test]
    fn promotions_and_castling() {
        assert_eq!(perft_nodes(POSITION_4, 1), 6);
        assert_eq!(perft_nodes(POSITION_4, 2), 264);
        assert_eq!(perft_nodes(POSITION_4, 3), 9_467);
        assert_eq!(perft_nodes(POSITION_5, 1), 44);
        assert_eq!(perft_nodes(POSITION_5, 2), 1_486);
        assert_eq!(perft_nodes(POSITION_5, 3), 62_379);
    }

    #[test]
    fn divide_sums_to_total() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let result = perft(&mut board, 2, true);
        let counts = result.move_counts.unwrap();
        assert_eq!(counts.len(), 48);
        assert_eq!(counts.iter().map(|(_, c)| c).sum::<u64>(), result.nodes);
    }
}

#[cfg(test)]
mod make_unmake_tests {
    use super::*;

    /// Walks every move two plies deep, checking the incremental hash
    /// and that unmake restores the exact board.
    fn check_symmetry(fen: &str) {
        let mut board = Board::from_fen(fen).unwrap();
        let original = board;
        let mut moves = MoveBuffer::new();
        board.generate_moves(&mut moves);

        for &m in moves.iter() {
            let undo = board.make_move(m);
            assert_ne!(board, original, "{m} did not change {fen}");
            assert_eq!(board.hash, calculate_hash(&board), "hash drift after {m} in {fen}");

            let mut replies = MoveBuffer::new();
            board.generate_moves(&mut replies);
            let before_reply = board;
            for &r in replies.iter() {
                let reply_undo = board.make_move(r);
                assert_eq!(board.hash, calculate_hash(&board), "hash drift after {m} {r}");
                board.unmake_move(r, reply_undo);
                assert_eq!(board, before_reply, "unmake {r} after {m} broke {fen}");
            }

            board.unmake_move(m, undo);
            assert_eq!(board, original, "unmake {m} broke {fen}");
        }
    }

    #[test]
    fn symmetric_on_test_positions() {
        for fen in [START_FEN, KIWIPETE, POSITION_3, POSITION_4, POSITION_5] {
            check_symmetry(fen);
        }
    }

    #[test]
    fn en_passant_key_leaves_with_the_last_capturer() {
        // b4 is the only pawn that can take on a3, and it captures elsewhere
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        for uci in ["a2a4", "b4c3"] {
            let m = Move::from_uci(&board, uci).unwrap();
            board.make_move(m);
            assert_eq!(board.hash, calculate_hash(&board), "hash drift after {uci}");
        }
        let reparsed = Board::from_fen(&board.to_fen()).unwrap();
        assert_eq!(board.hash, reparsed.hash);
    }

    #[test]
    fn null_move_roundtrip() {
        let mut board = Board::from_fen("4k3/8/8/8/3pP3/8/8/4K3 b - e3 0 1").unwrap();
        let original = board;
        let undo = board.make_null_move();
        assert_eq!(board.stm, Side::White);
        assert_eq!(board.enpassant_square, None);
        assert_eq!(board.hash, calculate_hash(&board));
        board.unmake_null_move(undo);
        assert_eq!(board, original);
    }

    #[test]
    fn castling_moves_rook_and_clears_rights() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castle = Move::from_uci(&board, "e1g1").unwrap();
        assert!(castle.is_castle());
        board.make_move(castle);
        assert_eq!(board.piece_at(5), Some(PieceInfo::new(Piece::Rook, Side::White)));
        assert_eq!(board.piece_at(7), None);
        assert_eq!(board.castling_rights.to_string(), "kq");
    }

    #[test]
    fn no_castling_through_check() {
        // Black rook on f8 covers f1
        let board = Board::from_fen("5r1k/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert!(Move::from_uci(&board, "e1g1").is_err());
        assert!(Move::from_uci(&board, "e1c1").is_ok());
    }
}

#[cfg(test)]
mod query_tests {
    use super::*;

    #[test]
    fn check_detection() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/4K2r w - - 0 1").unwrap();
        assert!(board.in_check());
        assert!(!board.is_in_check(Side::Black));
    }

    #[test]
    fn pseudo_legal_filters_foreign_moves() {
        let board = Board::new();
        assert!(board.is_pseudo_legal(Move::new(12, 28, Move::DOUBLE_PAWN)));
        assert!(!board.is_pseudo_legal(Move::new(12, 36, Move::QUIET)));
        assert!(!board.is_pseudo_legal(Move::new(52, 36, Move::DOUBLE_PAWN)));
        assert!(!board.is_pseudo_legal(Move::NULL));
    }

    #[test]
    fn non_pawn_material() {
        let board = Board::from_fen("4k3/pppp4/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
        assert!(board.has_non_pawn_material(Side::White));
        assert!(!board.has_non_pawn_material(Side::Black));
    }

    #[test]
    fn capture_generation_is_tactical_only() {
        let board = Board::from_fen(KIWIPETE).unwrap();
        let mut captures = MoveBuffer::new();
        board.generate_captures(&mut captures);
        assert!(captures.iter().all(|m| m.is_noisy()));

        let mut quiets = MoveBuffer::new();
        board.generate_quiets(&mut quiets);
        assert!(quiets.iter().all(|m| !m.is_noisy()));
        assert!(captures.len() + quiets.len() >= board.legal_moves().len());
        assert_eq!(board.legal_moves().len(), 48);
    }
}
