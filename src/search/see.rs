//! Static exchange evaluation: the net material result of all
//! possible recaptures on a square, assuming best play.
//! https://www.chessprogramming.org/SEE_-_The_Swap_Algorithm

use crate::attacks;
use crate::bitboard::{self, Bitboard, BitboardExt};
use crate::board::{COLOR_ARRAY_SIZE, Color, FIGURE_ARRAY_SIZE, Figure, Position, color_figure};
use crate::moves::types::{Move, MoveKind};
use arrayvec::ArrayVec;

// Piece bonuses for the exchange, fixed to approximately the mid game
// figure weights. Deliberately different from the evaluation weights.
const SEE_BONUS: [i32; FIGURE_ARRAY_SIZE] = [0, 55, 325, 341, 454, 1110, 20000];

// The immediate material swing of m: the captured figure, plus the
// promotion upgrade if any.
fn see_score(m: Move) -> i32 {
    let mut score = SEE_BONUS[m.capture().figure() as usize];
    if m.kind() == MoveKind::Promotion {
        score -= SEE_BONUS[Figure::Pawn as usize];
        score += SEE_BONUS[m.target().figure() as usize];
    }
    score
}

/// True if see(m) < 0, with a fast path: capturing with a less
/// valuable piece can never lose material.
pub fn see_sign(pos: &Position, m: Move) -> bool {
    if m.piece().figure() <= m.capture().figure() {
        return false;
    }
    see(pos, m) < 0
}

/// The static exchange evaluation for m, the last move executed.
///
/// Simulates best-play captures on m's destination square, always
/// answering with the least valuable attacker, and folds the gain
/// list backwards. Optimized for the common case of no recapture.
pub fn see(pos: &Position, m: Move) -> i32 {
    let mut us = pos.side_to_move;
    let sq = m.to();
    let bb = sq.bitboard();
    let mut target = m.target(); // piece on the square
    let bb27 = bb & !(bitboard::BB_RANK_1 | bitboard::BB_RANK_8);
    let bb18 = bb & (bitboard::BB_RANK_1 | bitboard::BB_RANK_8);

    // Occupancy as the exchange is executed.
    let mut occ: [Bitboard; COLOR_ARRAY_SIZE] = [
        0,
        pos.by_color[Color::Black as usize],
        pos.by_color[Color::White as usize],
    ];
    let mut all = occ[Color::White as usize] | occ[Color::Black as usize];

    // At most one gain entry per piece on the board, plus the move
    // itself, so the list never outgrows its stack allocation.
    let mut score = see_score(m);
    let mut gain: ArrayVec<i32, 33> = ArrayVec::new();
    gain.push(score);

    while score >= 0 {
        // Pick the next least valuable attacker of sq.
        let ours = occ[us as usize];

        let find = || -> Option<(Figure, Bitboard, MoveKind)> {
            let pawn = bitboard::backward(us, bitboard::west(bb27) | bitboard::east(bb27));
            let att = pawn & ours & pos.by_figure[Figure::Pawn as usize];
            if att != 0 {
                return Some((Figure::Pawn, att, MoveKind::Normal));
            }

            let att = attacks::knight_mobility(sq) & ours & pos.by_figure[Figure::Knight as usize];
            if att != 0 {
                return Some((Figure::Knight, att, MoveKind::Normal));
            }

            if attacks::super_attack(sq) & ours == 0 {
                // No remaining figure can attack sq.
                return None;
            }

            let bishop = attacks::bishop_mobility(sq, all);
            let att = bishop & ours & pos.by_figure[Figure::Bishop as usize];
            if att != 0 {
                return Some((Figure::Bishop, att, MoveKind::Normal));
            }

            let rook = attacks::rook_mobility(sq, all);
            let att = rook & ours & pos.by_figure[Figure::Rook as usize];
            if att != 0 {
                return Some((Figure::Rook, att, MoveKind::Normal));
            }

            // Pawn promotions count as queens minus the pawn.
            let pawn = bitboard::backward(us, bitboard::west(bb18) | bitboard::east(bb18));
            let att = pawn & ours & pos.by_figure[Figure::Pawn as usize];
            if att != 0 {
                return Some((Figure::Queen, att, MoveKind::Promotion));
            }

            let att = (rook | bishop) & ours & pos.by_figure[Figure::Queen as usize];
            if att != 0 {
                return Some((Figure::Queen, att, MoveKind::Normal));
            }

            let att = attacks::king_mobility(sq) & ours & pos.by_figure[Figure::King as usize];
            if att != 0 {
                return Some((Figure::King, att, MoveKind::Normal));
            }

            None
        };

        let (fig, att, kind) = match find() {
            Some(found) => found,
            None => break,
        };

        // Make a pseudo-legal capture with the smallest attacker.
        let from = att.lsb();
        let attacker = color_figure(us, fig);
        let capture = Move::new(kind, from.as_square(), sq, target, attacker);
        target = attacker; // the attacker becomes the new target

        score = see_score(capture) - score;
        gain.push(score);

        occ[us as usize] &= !from;
        all &= !from;
        us = us.opposite();
    }

    // Fold the gains backwards: each side may stop the exchange when
    // continuing loses material.
    for i in (0..gain.len() - 1).rev() {
        if -gain[i + 1] < gain[i] {
            gain[i] = -gain[i + 1];
        }
    }
    gain[0]
}
