//! Pseudo-legal move generation, partitioned by move kind.

use crate::attacks;
use crate::bitboard::{self, Bitboard, BitboardExt};
use crate::board::{Castle, Color, Figure, Piece, Position, color_figure};
use crate::moves::types::{Move, MoveKind, QUIET, TACTICAL, VIOLENT};
use crate::square::Square;

impl Position {
    // The destination mask for normal piece moves of the requested
    // kinds. Tactical moves are handled by dedicated generators.
    fn kind_mask(&self, kind: u8) -> Bitboard {
        let mut mask = 0;
        if kind & VIOLENT != 0 {
            mask |= self.by_color[self.side_to_move.opposite() as usize];
        }
        if kind & QUIET != 0 {
            mask |= !self.all();
        }
        mask
    }

    fn gen_bitboard_moves(&self, pi: Piece, from: Square, mut att: Bitboard, moves: &mut Vec<Move>) {
        while att != 0 {
            let to = att.pop();
            moves.push(Move::new(MoveKind::Normal, from, to, self.get(to), pi));
        }
    }

    fn gen_pawn_promotions(&self, kind: u8, moves: &mut Vec<Move>) {
        if kind & (VIOLENT | TACTICAL) == 0 {
            return;
        }

        // Promotion figure range per kind: violent gets the queen,
        // tactical gets knight through rook.
        let mut p_min = Figure::Queen;
        let mut p_max = Figure::Rook;
        if kind & VIOLENT != 0 {
            p_max = Figure::Queen;
        }
        if kind & TACTICAL != 0 {
            p_min = Figure::Knight;
        }

        let us = self.side_to_move;
        let them = us.opposite();
        let all = self.all();
        let theirs = self.by_color[them as usize];

        let (mut ours, forward) = if us == Color::White {
            (self.by_piece(us, Figure::Pawn) & bitboard::BB_RANK_7, 1i32)
        } else {
            (self.by_piece(us, Figure::Pawn) & bitboard::BB_RANK_2, -1i32)
        };

        let mut push = |from: Square, to: Square, capt: Piece, moves: &mut Vec<Move>| {
            let mut p = p_min as u8;
            while p <= p_max as u8 {
                let target = color_figure(us, Figure::from_u8(p));
                moves.push(Move::new(MoveKind::Promotion, from, to, capt, target));
                p += 1;
            }
        };

        while ours != 0 {
            let from = ours.pop();
            let to = from.relative(forward, 0);

            if !all.has(to) {
                push(from, to, Piece::NONE, moves);
            }
            if to.file() != 0 {
                let west = to.relative(0, -1);
                if theirs.has(west) {
                    push(from, west, self.get(west), moves);
                }
            }
            if to.file() != 7 {
                let east = to.relative(0, 1);
                if theirs.has(east) {
                    push(from, east, self.get(east), moves);
                }
            }
        }
    }

    // Single pawn pushes. Promotions are generated separately.
    fn gen_pawn_advance_moves(&self, kind: u8, moves: &mut Vec<Move>) {
        if kind & QUIET == 0 {
            return;
        }

        let us = self.side_to_move;
        let occ = self.all();
        let pawn = color_figure(us, Figure::Pawn);

        let (mut ours, forward) = if us == Color::White {
            (
                self.by_piece(us, Figure::Pawn) & !bitboard::south(occ) & !bitboard::BB_RANK_7,
                1,
            )
        } else {
            (
                self.by_piece(us, Figure::Pawn) & !bitboard::north(occ) & !bitboard::BB_RANK_2,
                -1,
            )
        };

        while ours != 0 {
            let from = ours.pop();
            let to = from.relative(forward, 0);
            moves.push(Move::new(MoveKind::Normal, from, to, Piece::NONE, pawn));
        }
    }

    // Double pawn pushes.
    fn gen_pawn_double_advance_moves(&self, kind: u8, moves: &mut Vec<Move>) {
        if kind & QUIET == 0 {
            return;
        }

        let us = self.side_to_move;
        let occ = self.all();
        let pawn = color_figure(us, Figure::Pawn);

        let (mut ours, forward) = if us == Color::White {
            (
                self.by_piece(us, Figure::Pawn)
                    & bitboard::rank_bb(1)
                    & !bitboard::south(occ)
                    & !bitboard::south(bitboard::south(occ)),
                2,
            )
        } else {
            (
                self.by_piece(us, Figure::Pawn)
                    & bitboard::rank_bb(6)
                    & !bitboard::north(occ)
                    & !bitboard::north(bitboard::north(occ)),
                -2,
            )
        };

        while ours != 0 {
            let from = ours.pop();
            let to = from.relative(forward, 0);
            moves.push(Move::new(MoveKind::Normal, from, to, Piece::NONE, pawn));
        }
    }

    fn pawn_capture(&self, to: Square) -> (MoveKind, Piece) {
        if self.is_enpassant_square(to) {
            (
                MoveKind::Enpassant,
                color_figure(self.side_to_move.opposite(), Figure::Pawn),
            )
        } else {
            (MoveKind::Normal, self.get(to))
        }
    }

    // Pawn captures, including en passant on the effective square.
    // Promotion captures are generated separately.
    fn gen_pawn_attack_moves(&self, kind: u8, moves: &mut Vec<Move>) {
        if kind & VIOLENT == 0 {
            return;
        }

        let us = self.side_to_move;
        let pawn = color_figure(us, Figure::Pawn);

        let mut theirs = self.by_color[us.opposite() as usize];
        let ep = self.effective_enpassant_square();
        if ep != Square::A1 {
            theirs |= ep.bitboard();
        }

        let (ours, targets, forward) = if us == Color::White {
            (
                self.by_piece(us, Figure::Pawn) & !bitboard::BB_RANK_7,
                bitboard::south(theirs),
                1,
            )
        } else {
            (
                self.by_piece(us, Figure::Pawn) & !bitboard::BB_RANK_2,
                bitboard::north(theirs),
                -1,
            )
        };

        // Take west.
        let mut bb = ours & bitboard::east(targets);
        while bb != 0 {
            let from = bb.pop();
            let to = from.relative(forward, -1);
            let (kind, capt) = self.pawn_capture(to);
            moves.push(Move::new(kind, from, to, capt, pawn));
        }

        // Take east.
        let mut bb = ours & bitboard::west(targets);
        while bb != 0 {
            let from = bb.pop();
            let to = from.relative(forward, 1);
            let (kind, capt) = self.pawn_capture(to);
            moves.push(Move::new(kind, from, to, capt, pawn));
        }
    }

    fn gen_knight_moves(&self, mask: Bitboard, moves: &mut Vec<Move>) {
        let pi = color_figure(self.side_to_move, Figure::Knight);
        let mut bb = self.by_piece(self.side_to_move, Figure::Knight);
        while bb != 0 {
            let from = bb.pop();
            let att = attacks::knight_mobility(from) & mask;
            self.gen_bitboard_moves(pi, from, att, moves);
        }
    }

    // Diagonal slides for fig (bishop or queen).
    fn gen_bishop_moves(&self, fig: Figure, mask: Bitboard, moves: &mut Vec<Move>) {
        let pi = color_figure(self.side_to_move, fig);
        let all = self.all();
        let mut bb = self.by_piece(self.side_to_move, fig);
        while bb != 0 {
            let from = bb.pop();
            let att = attacks::bishop_mobility(from, all) & mask;
            self.gen_bitboard_moves(pi, from, att, moves);
        }
    }

    // Straight slides for fig (rook or queen).
    fn gen_rook_moves(&self, fig: Figure, mask: Bitboard, moves: &mut Vec<Move>) {
        let pi = color_figure(self.side_to_move, fig);
        let all = self.all();
        let mut bb = self.by_piece(self.side_to_move, fig);
        while bb != 0 {
            let from = bb.pop();
            let att = attacks::rook_mobility(from, all) & mask;
            self.gen_bitboard_moves(pi, from, att, moves);
        }
    }

    fn gen_king_moves_near(&self, mask: Bitboard, moves: &mut Vec<Move>) {
        let pi = color_figure(self.side_to_move, Figure::King);
        let from = self.by_piece(self.side_to_move, Figure::King).as_square();
        let att = attacks::king_mobility(from) & mask;
        self.gen_bitboard_moves(pi, from, att, moves);
    }

    fn gen_king_castles(&self, kind: u8, moves: &mut Vec<Move>) {
        if kind & TACTICAL == 0 {
            return;
        }

        let us = self.side_to_move;
        let rank = us.king_home_rank();
        let (oo, ooo): (Castle, Castle) = if us == Color::White {
            (crate::board::WHITE_OO, crate::board::WHITE_OOO)
        } else {
            (crate::board::BLACK_OO, crate::board::BLACK_OOO)
        };
        let other = us.opposite();

        // The king must not castle out of, through or into an attack,
        // and the squares between king and rook must be empty.
        let mut try_castle = |right: Castle, empty_files: &[i32], safe_files: &[i32], to_file: i32| {
            if self.castling_ability() & right == 0 {
                return;
            }
            if empty_files
                .iter()
                .any(|&f| !self.is_empty(Square::rank_file(rank, f)))
            {
                return;
            }
            if safe_files
                .iter()
                .any(|&f| self.get_attacker(Square::rank_file(rank, f), other) != Figure::None)
            {
                return;
            }
            moves.push(Move::new(
                MoveKind::Castling,
                Square::rank_file(rank, 4),
                Square::rank_file(rank, to_file),
                Piece::NONE,
                color_figure(us, Figure::King),
            ));
        };

        try_castle(oo, &[5, 6], &[4, 5, 6], 6);
        try_castle(ooo, &[3, 2, 1], &[4, 3, 2], 2);
    }

    /// Appends all pseudo-legal moves of the requested kinds. The
    /// moves may leave the own king in check. The generator order was
    /// chosen empirically to help move ordering: late quiet moves are
    /// reduced more.
    pub fn generate_moves(&self, kind: u8, moves: &mut Vec<Move>) {
        let mask = self.kind_mask(kind);
        self.gen_king_moves_near(mask, moves);
        self.gen_pawn_double_advance_moves(kind, moves);
        self.gen_rook_moves(Figure::Rook, mask, moves);
        self.gen_bishop_moves(Figure::Queen, mask, moves);
        self.gen_pawn_attack_moves(kind, moves);
        self.gen_pawn_advance_moves(kind, moves);
        self.gen_pawn_promotions(kind, moves);
        self.gen_knight_moves(mask, moves);
        self.gen_bishop_moves(Figure::Bishop, mask, moves);
        self.gen_king_castles(kind, moves);
        self.gen_rook_moves(Figure::Queen, mask, moves);
    }

    /// Appends all pseudo-legal moves of one figure.
    pub fn generate_figure_moves(&self, fig: Figure, kind: u8, moves: &mut Vec<Move>) {
        let mask = self.kind_mask(kind);
        match fig {
            Figure::Pawn => {
                self.gen_pawn_advance_moves(kind, moves);
                self.gen_pawn_attack_moves(kind, moves);
                self.gen_pawn_double_advance_moves(kind, moves);
                self.gen_pawn_promotions(kind, moves);
            }
            Figure::Knight => self.gen_knight_moves(mask, moves),
            Figure::Bishop => self.gen_bishop_moves(Figure::Bishop, mask, moves),
            Figure::Rook => self.gen_rook_moves(Figure::Rook, mask, moves),
            Figure::Queen => {
                self.gen_bishop_moves(Figure::Queen, mask, moves);
                self.gen_rook_moves(Figure::Queen, mask, moves);
            }
            Figure::King => {
                self.gen_king_moves_near(mask, moves);
                self.gen_king_castles(kind, moves);
            }
            Figure::None => {}
        }
    }

    /// All strictly legal moves: pseudo-legal moves that leave the own
    /// king safe and, in Racing Kings, give no local check to either
    /// side.
    pub fn legal_moves(&mut self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.generate_moves(crate::moves::types::ALL, &mut moves);
        let us = self.side_to_move;
        let them = us.opposite();

        moves.retain(|&m| {
            self.do_move(m);
            let mut illegal = self.is_checked(us);
            if self.variant == crate::board::Variant::RacingKings {
                illegal = illegal || self.is_checked_local(them);
            }
            self.undo_move();
            !illegal
        });
        moves
    }
}
