use std::fmt::Write;

use crate::board::zobrist::calculate_hash;
use crate::prelude::*;

/// Parses a FEN string into a [`Board`].
///
/// The halfmove clock and fullmove number are optional and default to `0` and `1`.
pub fn parse_fen(fen: &str) -> Result<Board> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    ensure!(
        (4..=6).contains(&parts.len()),
        "Expected 4 to 6 fields in FEN, found {}: '{fen}'",
        parts.len()
    );

    let mut board = Board::empty();
    place_pieces(&mut board, parts[0])
        .wrap_err_with(|| format!("Placing pieces from '{}'", parts[0]))?;

    board.stm = match parts[1] {
        "w" => Side::White,
        "b" => Side::Black,
        other => bail!("Invalid side to move '{other}'"),
    };
    board.castling_rights = parts[2]
        .parse()
        .wrap_err_with(|| format!("Parsing castling rights '{}'", parts[2]))?;
    board.enpassant_square = match parts[3] {
        "-" => None,
        sq => Some(
            sq.parse()
                .wrap_err_with(|| format!("Parsing en passant square '{sq}'"))?,
        ),
    };
    if let Some(half_move) = parts.get(4) {
        board.halfmove_clock = half_move
            .parse::<u8>()
            .into_diagnostic()
            .wrap_err_with(|| format!("attempt to parse {half_move} to u8"))?;
    }
    if let Some(full_move) = parts.get(5) {
        board.fullmove_number = full_move
            .parse::<u16>()
            .into_diagnostic()
            .wrap_err_with(|| format!("attempt to parse {full_move} to u16"))?;
    }

    for side in Side::SIDES {
        ensure!(
            board.positions.get_piece_bb(side, Piece::King).pop_count() == 1,
            "{side} must have exactly one king"
        );
    }

    board.hash = calculate_hash(&board);
    Ok(board)
}

fn place_pieces(board: &mut Board, placement: &str) -> Result<()> {
    let ranks: Vec<&str> = placement.split('/').collect();
    ensure!(ranks.len() == 8, "Expected 8 ranks, found {}", ranks.len());

    for (i, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - i;
        let mut file = 0;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
                continue;
            }
            let (piece, side) =
                Piece::from_char(c).ok_or_else(|| miette!("Invalid piece character '{c}'"))?;
            let square = Square::from_coords(rank, file)
                .ok_or_else(|| miette!("Rank '{rank_str}' overflows the board"))?;
            board.positions.set(square.index(), PieceInfo::new(piece, side));
            file += 1;
        }
        ensure!(file == 8, "Rank '{rank_str}' does not cover 8 files");
    }
    Ok(())
}

pub fn to_fen(board: &Board) -> String {
    let mut fen = String::with_capacity(90);
    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            match board.positions.piece_at(rank * 8 + file) {
                Some(info) => {
                    if empty > 0 {
                        let _ = write!(fen, "{empty}");
                        empty = 0;
                    }
                    fen.push(info.piece.to_char(info.side));
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            let _ = write!(fen, "{empty}");
        }
        if rank > 0 {
            fen.push('/');
        }
    }

    let stm = if board.stm == Side::White { 'w' } else { 'b' };
    let ep = board
        .enpassant_square
        .map_or_else(|| "-".to_string(), |sq| sq.to_string());
    let _ = write!(
        fen,
        " {stm} {} {ep} {} {}",
        board.castling_rights, board.halfmove_clock, board.fullmove_number
    );
    fen
}
