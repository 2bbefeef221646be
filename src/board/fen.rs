//! FEN parsing and formatting.
//! http://en.wikipedia.org/wiki/Forsyth%E2%80%93Edwards_Notation

use super::{
    ANY_CASTLE, BLACK_OO, BLACK_OOO, Castle, Color, NO_CASTLE, Piece, Position, Variant, WHITE_OO,
    WHITE_OOO, castle_to_string,
};
use crate::moves::notation::NotationError;
use crate::square::Square;
use std::str::FromStr;

/// The FEN string of the standard starting position.
pub const FEN_START_POS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const ITOA: &[u8] = b"0123456789";
const PIECE_TO_SYMBOL: &[u8] = b".?pPnNbBrRqQkK";

fn symbol_to_piece(symbol: char) -> Piece {
    match symbol {
        'p' => Piece::BLACK_PAWN,
        'n' => Piece::BLACK_KNIGHT,
        'b' => Piece::BLACK_BISHOP,
        'r' => Piece::BLACK_ROOK,
        'q' => Piece::BLACK_QUEEN,
        'k' => Piece::BLACK_KING,
        'P' => Piece::WHITE_PAWN,
        'N' => Piece::WHITE_KNIGHT,
        'B' => Piece::WHITE_BISHOP,
        'R' => Piece::WHITE_ROOK,
        'Q' => Piece::WHITE_QUEEN,
        'K' => Piece::WHITE_KING,
        _ => Piece::NONE,
    }
}

// (castle right, [expected piece; 2], [expected square; 2])
fn castle_info(symbol: char) -> Option<(Castle, [Piece; 2], [Square; 2])> {
    match symbol {
        'K' => Some((
            WHITE_OO,
            [Piece::WHITE_KING, Piece::WHITE_ROOK],
            [Square::E1, Square::H1],
        )),
        'Q' => Some((
            WHITE_OOO,
            [Piece::WHITE_KING, Piece::WHITE_ROOK],
            [Square::E1, Square::A1],
        )),
        'k' => Some((
            BLACK_OO,
            [Piece::BLACK_KING, Piece::BLACK_ROOK],
            [Square::E8, Square::H8],
        )),
        'q' => Some((
            BLACK_OOO,
            [Piece::BLACK_KING, Piece::BLACK_ROOK],
            [Square::E8, Square::A8],
        )),
        _ => None,
    }
}

impl Position {
    /// Parses a standard-chess position from its FEN string. FENs
    /// with fewer or more than six fields are rejected.
    pub fn from_fen(fen: &str) -> Result<Position, NotationError> {
        Position::from_fen_variant(fen, Variant::Standard)
    }

    /// Parses a position played under the given variant.
    pub fn from_fen_variant(fen: &str, variant: Variant) -> Result<Position, NotationError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 6 {
            return Err(NotationError::Fen("too few fields".to_string()));
        }
        if fields.len() > 6 {
            return Err(NotationError::Fen("too many fields".to_string()));
        }

        let mut pos = Position::new();
        pos.variant = variant;
        parse_piece_placement(fields[0], &mut pos)?;
        parse_side_to_move(fields[1], &mut pos)?;
        parse_castling_ability(fields[2], &mut pos)?;
        parse_enpassant_square(fields[3], &mut pos)?;

        let halfmove = fields[4]
            .parse::<i32>()
            .map_err(|_| NotationError::Fen(format!("bad halfmove clock {}", fields[4])))?;
        pos.set_halfmove_clock(halfmove);
        let fullmove = fields[5]
            .parse::<i32>()
            .map_err(|_| NotationError::Fen(format!("bad fullmove counter {}", fields[5])))?;
        pos.set_fullmove_counter(fullmove);

        pos.ply = ((fullmove - 1).max(0) * 2) as usize;
        if pos.side_to_move == Color::Black {
            pos.ply += 1;
        }
        Ok(pos)
    }

    /// Formats the position as FEN.
    pub fn to_fen(&self) -> String {
        let mut s = format_piece_placement(self);
        s.push(' ');
        s.push_str(format_side_to_move(self));
        s.push(' ');
        s.push_str(castle_to_string(self.castling_ability()));
        s.push(' ');
        s.push_str(&format_enpassant_square(self));
        s.push(' ');
        s.push_str(&self.halfmove_clock().to_string());
        s.push(' ');
        s.push_str(&self.fullmove_counter().to_string());
        s
    }
}

fn parse_piece_placement(s: &str, pos: &mut Position) -> Result<(), NotationError> {
    let (mut r, mut f) = (0i32, 0i32);
    for p in s.chars() {
        if p == '/' {
            if r == 7 {
                return Err(NotationError::Fen("expected 8 ranks".to_string()));
            }
            if f != 8 {
                return Err(NotationError::Fen(format!(
                    "expected 8 squares per rank, got {f}"
                )));
            }
            r += 1;
            f = 0;
            continue;
        }

        if let Some(d) = p.to_digit(10) {
            if !(1..=8).contains(&d) {
                return Err(NotationError::Fen(format!("bad empty count {p}")));
            }
            f += d as i32;
            continue;
        }

        let pi = symbol_to_piece(p);
        if pi == Piece::NONE {
            return Err(NotationError::Fen(format!("unexpected symbol {p}")));
        }
        if f >= 8 {
            return Err(NotationError::Fen(format!("rank {} too long", 8 - r)));
        }

        // FEN describes the board starting from the 8th rank.
        pos.put(Square::rank_file(7 - r, f), pi);
        f += 1;
    }

    if f < 8 {
        return Err(NotationError::Fen(format!("rank {} too short", r + 1)));
    }
    Ok(())
}

fn format_piece_placement(pos: &Position) -> String {
    let mut s = String::new();
    for r in (0..8).rev() {
        let mut space = 0;
        for f in 0..8 {
            let pi = pos.get(Square::rank_file(r, f));
            if pi == Piece::NONE {
                space += 1;
            } else {
                if space != 0 {
                    s.push(ITOA[space] as char);
                    space = 0;
                }
                s.push(PIECE_TO_SYMBOL[pi.index()] as char);
            }
        }
        if space != 0 {
            s.push(ITOA[space] as char);
        }
        if r != 0 {
            s.push('/');
        }
    }
    s
}

fn parse_side_to_move(s: &str, pos: &mut Position) -> Result<(), NotationError> {
    match s {
        "w" => pos.set_side_to_move(Color::White),
        "b" => pos.set_side_to_move(Color::Black),
        _ => return Err(NotationError::Fen(format!("invalid color {s}"))),
    }
    Ok(())
}

fn format_side_to_move(pos: &Position) -> &'static str {
    if pos.side_to_move == Color::White { "w" } else { "b" }
}

fn parse_castling_ability(s: &str, pos: &mut Position) -> Result<(), NotationError> {
    if s == "-" {
        pos.set_castling_ability(NO_CASTLE);
        return Ok(());
    }

    let mut ability = NO_CASTLE;
    for p in s.chars() {
        let (castle, pieces, squares) = castle_info(p)
            .ok_or_else(|| NotationError::Fen(format!("invalid castling ability {s}")))?;
        ability |= castle;
        for i in 0..2 {
            if pos.get(squares[i]) != pieces[i] {
                return Err(NotationError::Fen(format!(
                    "expected {:?} at {}, got {:?}",
                    pieces[i],
                    squares[i],
                    pos.get(squares[i])
                )));
            }
        }
    }
    debug_assert!(ability & !ANY_CASTLE == 0);
    pos.set_castling_ability(ability);
    Ok(())
}

fn parse_enpassant_square(s: &str, pos: &mut Position) -> Result<(), NotationError> {
    if s.starts_with('-') {
        pos.set_enpassant_square(Square::A1);
        return Ok(());
    }
    let sq = Square::from_str(s)?;
    pos.set_enpassant_square(sq);
    Ok(())
}

fn format_enpassant_square(pos: &Position) -> String {
    if pos.enpassant_square() != Square::A1 {
        pos.enpassant_square().to_string()
    } else {
        "-".to_string()
    }
}
