//! Perft: exhaustive legal move counting to a fixed depth.
//!
//! The node counts for well-known positions are published, which
//! makes perft the strongest cross-check of move generation,
//! make/unmake and the legality filter all at once.
//! https://www.chessprogramming.org/Perft_Results

use crate::board::{Position, Variant};
use crate::moves::types::{ALL, Move};

const MAX_PERFT_DEPTH: usize = 20;

// True if m, already executed on pos, was illegal for the side that
// played it. Mirrors the search's filter, including the Racing Kings
// no-checks rule.
fn was_illegal(pos: &Position) -> bool {
    let them = pos.side_to_move;
    let us = them.opposite();
    if pos.is_checked(us) {
        return true;
    }
    pos.variant == Variant::RacingKings && pos.is_checked_local(them)
}

// Recursive node counter with one reusable move buffer per ply.
fn perft_recursive(pos: &mut Position, depth: u32, ply: usize, buffers: &mut [Vec<Move>]) -> u64 {
    if depth == 0 {
        return 1;
    }

    {
        let moves = &mut buffers[ply];
        moves.clear();
        pos.generate_moves(ALL, moves);
    }

    let move_count = buffers[ply].len();
    let mut nodes = 0;

    for i in 0..move_count {
        let m = buffers[ply][i];
        pos.do_move(m);
        if !was_illegal(pos) {
            nodes += perft_recursive(pos, depth - 1, ply + 1, buffers);
        }
        pos.undo_move();
    }

    nodes
}

fn new_buffers(depth: u32) -> Vec<Vec<Move>> {
    (0..=depth).map(|_| Vec::with_capacity(64)).collect()
}

/// Counts the leaf nodes of the legal move tree of the given depth.
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    assert!(
        depth as usize <= MAX_PERFT_DEPTH,
        "depth {depth} exceeds {MAX_PERFT_DEPTH}"
    );

    let mut buffers = new_buffers(depth);
    perft_recursive(pos, depth, 0, &mut buffers)
}

/// Like perft, but prints the subtree count under every root move,
/// the standard way to diff a wrong generator against a known-good
/// engine. Returns the total.
pub fn perft_divide(pos: &mut Position, depth: u32) -> u64 {
    assert!(
        depth as usize <= MAX_PERFT_DEPTH,
        "depth {depth} exceeds {MAX_PERFT_DEPTH}"
    );

    let mut buffers = new_buffers(depth);
    {
        let moves = &mut buffers[0];
        moves.clear();
        pos.generate_moves(ALL, moves);
    }

    let move_count = buffers[0].len();
    let mut total = 0;

    for i in 0..move_count {
        let m = buffers[0][i];
        pos.do_move(m);
        if !was_illegal(pos) {
            let nodes = if depth == 1 {
                1
            } else {
                perft_recursive(pos, depth - 1, 1, &mut buffers)
            };
            println!("{}: {}", m.uci(), nodes);
            total += nodes;
        }
        pos.undo_move();
    }

    println!("Total: {}", total);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::FEN_START_POS;

    #[test]
    fn depth_zero_is_one_node() {
        let mut pos = Position::from_fen(FEN_START_POS).unwrap();
        assert_eq!(perft(&mut pos, 0), 1);
    }

    #[test]
    fn perft_leaves_the_position_untouched() {
        let mut pos = Position::from_fen(FEN_START_POS).unwrap();
        let before = pos.clone();
        perft(&mut pos, 3);
        assert_eq!(pos, before);
    }

    #[test]
    fn racing_kings_start_has_twenty_one_moves() {
        // The check filter prunes Nc3 and Nxc1, both of which would
        // check the king on a2.
        let mut pos =
            Position::from_fen_variant(Variant::RacingKings.start_fen(), Variant::RacingKings)
                .unwrap();
        assert_eq!(perft(&mut pos, 1), 21);
        assert_eq!(pos.legal_moves().len(), 21);
    }
}
