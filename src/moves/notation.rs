//! Move parsing: UCI coordinate notation and SAN.

use crate::board::{Color, Figure, Piece, Position, color_figure};
use crate::moves::types::{ALL, Move, MoveKind};
use crate::square::Square;
use std::str::FromStr;
use thiserror::Error;

/// Errors surfaced to the UCI driver when a position or move string
/// cannot be understood. The command carrying it is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("invalid square {0}")]
    BadSquare(String),
    #[error("invalid FEN: {0}")]
    Fen(String),
    #[error("move string has the wrong length")]
    WrongLength,
    #[error("unknown figure symbol")]
    UnknownFigure,
    #[error("bad disambiguation")]
    BadDisambiguation,
    #[error("only pawns on the last rank can be promoted")]
    BadPromotion,
    #[error("no such move")]
    NoSuchMove,
    #[error("{0} is not a valid move")]
    NotPseudoLegal(String),
}

fn symbol_to_figure(symbol: u8) -> Figure {
    match symbol {
        b'p' | b'P' => Figure::Pawn,
        b'n' | b'N' => Figure::Knight,
        b'b' | b'B' => Figure::Bishop,
        b'r' | b'R' => Figure::Rook,
        b'q' | b'Q' => Figure::Queen,
        b'k' | b'K' => Figure::King,
        _ => Figure::None,
    }
}

impl Position {
    /// Parses a move in UCI coordinate format, e.g. "a2a4" or "h7h8q"
    /// for a promotion. The move must be pseudo-legal.
    pub fn uci_to_move(&self, s: &str) -> Result<Move, NotationError> {
        if s.len() < 4 {
            return Err(NotationError::WrongLength);
        }

        let from = Square::from_str(&s[0..2])?;
        let to = Square::from_str(&s[2..4])?;

        let mut kind = MoveKind::Normal;
        let mut capture = self.get(to);
        let mut target = self.get(from);

        let pi = self.get(from);
        if pi.figure() == Figure::Pawn && self.is_enpassant_square(to) {
            kind = MoveKind::Enpassant;
            capture = color_figure(self.side_to_move.opposite(), Figure::Pawn);
        }
        if pi == Piece::WHITE_KING
            && from == Square::E1
            && (to == Square::C1 || to == Square::G1)
        {
            kind = MoveKind::Castling;
        }
        if pi == Piece::BLACK_KING
            && from == Square::E8
            && (to == Square::C8 || to == Square::G8)
        {
            kind = MoveKind::Castling;
        }
        if pi.figure() == Figure::Pawn && (to.rank() == 0 || to.rank() == 7) {
            if s.len() != 5 {
                return Err(NotationError::WrongLength);
            }
            let fig = symbol_to_figure(s.as_bytes()[4]);
            if fig == Figure::None {
                return Err(NotationError::UnknownFigure);
            }
            kind = MoveKind::Promotion;
            target = color_figure(self.side_to_move, fig);
        } else if s.len() != 4 {
            return Err(NotationError::WrongLength);
        }

        let m = Move::new(kind, from, to, capture, target);
        if !self.is_pseudo_legal(m) {
            return Err(NotationError::NotPseudoLegal(s.to_string()));
        }
        Ok(m)
    }

    /// Parses a move in standard algebraic notation.
    ///
    /// The accepted set of strings is slightly wider than FIDE SAN:
    /// the "x" (capture) marker's presence or correctness is ignored,
    /// "+" (check), "#" (checkmate) and "e.p." are ignored.
    pub fn san_to_move(&self, s: &str) -> Result<Move, NotationError> {
        let bytes = s.as_bytes();
        let mut kind = MoveKind::Normal;
        let (mut rank, mut file) = (-1i32, -1i32); // from disambiguation
        let to;
        let mut capture = Piece::NONE;
        let mut target;

        // bytes[b..e] is the part that still needs parsing.
        let mut b = 0usize;
        let mut e = bytes.len();
        if b == e {
            return Err(NotationError::WrongLength);
        }
        while e > b && (bytes[e - 1] == b'#' || bytes[e - 1] == b'+') {
            e -= 1;
        }

        if &s[b..e] == "o-o" || &s[b..e] == "O-O" {
            // King side castling.
            kind = MoveKind::Castling;
            if self.side_to_move == Color::White {
                rank = Square::E1.rank();
                file = Square::E1.file();
                to = Square::G1;
                target = Piece::WHITE_KING;
            } else {
                rank = Square::E8.rank();
                file = Square::E8.file();
                to = Square::G8;
                target = Piece::BLACK_KING;
            }
        } else if &s[b..e] == "o-o-o" || &s[b..e] == "O-O-O" {
            // Queen side castling.
            kind = MoveKind::Castling;
            if self.side_to_move == Color::White {
                rank = Square::E1.rank();
                file = Square::E1.file();
                to = Square::C1;
                target = Piece::WHITE_KING;
            } else {
                rank = Square::E8.rank();
                file = Square::E8.file();
                to = Square::C8;
                target = Piece::BLACK_KING;
            }
        } else {
            // Get the moving piece.
            if matches!(bytes[b], b'a'..=b'h' | b'x') {
                target = color_figure(self.side_to_move, Figure::Pawn);
            } else {
                let fig = symbol_to_figure(bytes[b]);
                if fig == Figure::None {
                    return Err(NotationError::UnknownFigure);
                }
                target = color_figure(self.side_to_move, fig);
                b += 1;
            }

            // Skip e.p. for en passant.
            if e > b + 4 && &s[e - 4..e] == "e.p." {
                e -= 4;
            }

            // Pawn promotion.
            if e < b + 1 {
                return Err(NotationError::WrongLength);
            }
            if !bytes[e - 1].is_ascii_digit() {
                if target.figure() != Figure::Pawn {
                    return Err(NotationError::BadPromotion);
                }
                let fig = symbol_to_figure(bytes[e - 1]);
                if fig == Figure::None {
                    return Err(NotationError::UnknownFigure);
                }
                kind = MoveKind::Promotion;
                target = color_figure(self.side_to_move, fig);
                e -= 1;
                // Sometimes = is inserted before the promotion figure.
                if e > b && bytes[e - 1] == b'=' {
                    e -= 1;
                }
            }

            // Destination square.
            if e < b + 2 {
                return Err(NotationError::WrongLength);
            }
            to = Square::from_str(&s[e - 2..e])?;
            if target.figure() == Figure::Pawn && self.is_enpassant_square(to) {
                kind = MoveKind::Enpassant;
                capture = color_figure(self.side_to_move.opposite(), Figure::Pawn);
            } else {
                capture = self.get(to);
            }
            e -= 2;

            // Ignore 'x' (capture) or '-' (no capture) if present.
            if e > b && (bytes[e - 1] == b'x' || bytes[e - 1] == b'-') {
                e -= 1;
            }

            // Disambiguation.
            if e - b > 2 {
                return Err(NotationError::BadDisambiguation);
            }
            while b < e {
                match bytes[b] {
                    b'a'..=b'h' => file = (bytes[b] - b'a') as i32,
                    b'1'..=b'8' => rank = (bytes[b] - b'1') as i32,
                    _ => return Err(NotationError::BadDisambiguation),
                }
                b += 1;
            }
        }

        // Find the pseudo-legal move matching all constraints.
        let mut moves = Vec::with_capacity(32);
        if kind == MoveKind::Promotion {
            self.generate_figure_moves(Figure::Pawn, ALL, &mut moves);
        } else {
            self.generate_figure_moves(target.figure(), ALL, &mut moves);
        }
        for &pm in &moves {
            if pm.kind() != kind || pm.capture() != capture {
                continue;
            }
            if pm.to() != to || pm.target() != target {
                continue;
            }
            if rank != -1 && pm.from().rank() != rank {
                continue;
            }
            if file != -1 && pm.from().file() != file {
                continue;
            }
            return Ok(pm);
        }
        Err(NotationError::NoSuchMove)
    }
}
