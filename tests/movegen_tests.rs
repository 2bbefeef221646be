//! Per-figure move generation against hand-checked expectations.

mod common;

use std::collections::HashSet;
use std::str::FromStr;
use stretto::board::{Color, Figure, Piece, Position};
use stretto::moves::types::{ALL, QUIET, VIOLENT};
use stretto::square::Square;

const TEST_BOARD_1: &str = "r3k2r/3ppp2/1BB3B1/pp2P1pp/PP4PP/5b2/3PPP2/R3K2R w KQkq - 0 1";

fn sq(s: &str) -> Square {
    Square::from_str(s).unwrap()
}

fn figure_moves(pos: &Position, fig: Figure, kind: u8) -> HashSet<String> {
    let mut moves = Vec::new();
    pos.generate_figure_moves(fig, kind, &mut moves);
    moves.iter().map(|m| m.uci()).collect()
}

fn expect(actual: HashSet<String>, expected: &[&str]) {
    let expected: HashSet<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn knight_moves() {
    let mut pos = Position::new();
    pos.set_side_to_move(Color::White);
    pos.put(sq("b2"), Piece::WHITE_KNIGHT);
    pos.put(sq("f4"), Piece::WHITE_KNIGHT);
    pos.put(sq("c4"), Piece::WHITE_PAWN);

    expect(
        figure_moves(&pos, Figure::Knight, ALL),
        &[
            "b2d1", "b2d3", "b2a4", "f4d3", "f4d5", "f4e6", "f4g6", "f4h5", "f4h3", "f4g2",
            "f4e2",
        ],
    );
}

#[test]
fn rook_moves() {
    let mut pos = Position::new();
    pos.set_side_to_move(Color::White);
    pos.put(sq("b2"), Piece::WHITE_ROOK);
    pos.put(sq("f2"), Piece::WHITE_KING);
    pos.put(sq("b6"), Piece::BLACK_KING);

    expect(
        figure_moves(&pos, Figure::Rook, ALL),
        &["b2b1", "b2b3", "b2b4", "b2b5", "b2b6", "b2a2", "b2c2", "b2d2", "b2e2"],
    );
}

#[test]
fn bishop_and_queen_moves() {
    let mut pos = Position::new();
    pos.set_side_to_move(Color::White);
    pos.put(sq("b1"), Piece::BLACK_ROOK);
    pos.put(sq("d1"), Piece::WHITE_QUEEN);
    pos.put(sq("e1"), Piece::WHITE_KING);
    pos.put(sq("g1"), Piece::WHITE_KNIGHT);
    pos.put(sq("c2"), Piece::WHITE_KNIGHT);
    pos.put(sq("f2"), Piece::WHITE_KNIGHT);
    pos.put(sq("e3"), Piece::WHITE_KNIGHT);
    pos.put(sq("f3"), Piece::WHITE_BISHOP);
    pos.put(sq("d5"), Piece::BLACK_ROOK);

    expect(
        figure_moves(&pos, Figure::Bishop, ALL),
        &["f3e2", "f3e4", "f3d5", "f3g2", "f3h1", "f3g4", "f3h5"],
    );
    expect(
        figure_moves(&pos, Figure::Queen, ALL),
        &["d1b1", "d1c1", "d1d2", "d1d3", "d1d4", "d1d5", "d1e2"],
    );
}

#[test]
fn king_moves_with_and_without_neighbours() {
    let mut pos = Position::new();
    pos.set_side_to_move(Color::White);
    pos.put(sq("a2"), Piece::WHITE_KING);
    expect(
        figure_moves(&pos, Figure::King, ALL),
        &["a2a3", "a2b3", "a2b2", "a2b1", "a2a1"],
    );

    pos.put(sq("a3"), Piece::WHITE_PAWN);
    pos.put(sq("b3"), Piece::BLACK_PAWN);
    pos.put(sq("b2"), Piece::WHITE_QUEEN);
    expect(
        figure_moves(&pos, Figure::King, ALL),
        &["a2b3", "a2b1", "a2a1"],
    );
}

#[test]
fn king_castle_generation_depends_on_rights() {
    let mut pos = Position::from_fen(TEST_BOARD_1).unwrap();

    let cases: [(stretto::board::Castle, &[&str]); 5] = [
        (stretto::board::NO_CASTLE, &["e1d1", "e1f1"]),
        (
            stretto::board::BLACK_OO | stretto::board::BLACK_OOO,
            &["e1d1", "e1f1"],
        ),
        (stretto::board::WHITE_OO, &["e1d1", "e1f1", "e1g1"]),
        (stretto::board::WHITE_OOO, &["e1d1", "e1f1", "e1c1"]),
        (
            stretto::board::WHITE_OO | stretto::board::WHITE_OOO,
            &["e1d1", "e1f1", "e1g1", "e1c1"],
        ),
    ];
    for (castle, expected) in cases {
        pos.set_castling_ability(castle);
        expect(figure_moves(&pos, Figure::King, ALL), expected);
    }

    // A piece on c1 blocks the queen side.
    pos.put(sq("c1"), Piece::WHITE_BISHOP);
    pos.set_castling_ability(stretto::board::WHITE_OO | stretto::board::WHITE_OOO);
    expect(
        figure_moves(&pos, Figure::King, ALL),
        &["e1d1", "e1f1", "e1g1"],
    );
    pos.remove(sq("c1"), Piece::WHITE_BISHOP);

    // A bishop attacking the path blocks the queen side, too.
    pos.put(sq("a3"), Piece::BLACK_BISHOP);
    expect(
        figure_moves(&pos, Figure::King, ALL),
        &["e1d1", "e1f1", "e1g1"],
    );
}

#[test]
fn pawn_advances_on_test_board() {
    let pos = Position::from_fen(TEST_BOARD_1).unwrap();
    expect(
        figure_moves(&pos, Figure::Pawn, QUIET),
        &["d2d3", "e2e3", "e5e6", "d2d4", "e2e4"],
    );

    let mut pos = pos;
    pos.do_move(stretto::moves::types::NULL_MOVE);
    expect(
        figure_moves(&pos, Figure::Pawn, QUIET),
        &["d7d6", "e7e6", "f7f6", "d7d5", "f7f5"],
    );
}

#[test]
fn pawn_attacks_on_test_board() {
    let pos = Position::from_fen(TEST_BOARD_1).unwrap();
    expect(
        figure_moves(&pos, Figure::Pawn, VIOLENT),
        &["e2f3", "a4b5", "b4a5", "g4h5", "h4g5"],
    );

    let mut pos = pos;
    pos.do_move(stretto::moves::types::NULL_MOVE);
    expect(
        figure_moves(&pos, Figure::Pawn, VIOLENT),
        &["d7c6", "f7g6", "a5b4", "b5a4", "h5g4", "g5h4"],
    );
}

#[test]
fn pawn_attacks_on_kiwipete() {
    let pos = Position::from_fen(common::KIWIPETE).unwrap();
    expect(
        figure_moves(&pos, Figure::Pawn, VIOLENT),
        &["d5e6", "g2h3"],
    );

    let mut pos = pos;
    pos.do_move(stretto::moves::types::NULL_MOVE);
    expect(
        figure_moves(&pos, Figure::Pawn, VIOLENT),
        &["b4c3", "h3g2", "e6d5"],
    );
}

#[test]
fn enpassant_follows_the_last_double_push() {
    let mut pos = Position::from_fen(TEST_BOARD_1).unwrap();
    let mut play = |pos: &mut Position, s: &str| {
        let m = pos.uci_to_move(s).unwrap();
        pos.do_move(m);
    };

    let pawn_from = |pos: &Position, from: &str| -> HashSet<String> {
        let mut moves = Vec::new();
        pos.generate_figure_moves(Figure::Pawn, ALL, &mut moves);
        moves
            .iter()
            .filter(|m| m.from() == sq(from))
            .map(|m| m.uci())
            .collect()
    };

    play(&mut pos, "a1d1");
    play(&mut pos, "d7d5");
    expect(pawn_from(&pos, "e5"), &["e5e6", "e5d6"]);

    play(&mut pos, "e2e3");
    play(&mut pos, "f7f5");
    expect(pawn_from(&pos, "e5"), &["e5e6", "e5f6"]);

    play(&mut pos, "e3e4");
    play(&mut pos, "f3g2");
    expect(pawn_from(&pos, "e5"), &["e5e6"]);

    pos.undo_move();
    pos.undo_move();
    expect(pawn_from(&pos, "e5"), &["e5e6", "e5f6"]);

    pos.undo_move();
    pos.undo_move();
    expect(pawn_from(&pos, "e5"), &["e5e6", "e5d6"]);
}

#[test]
fn no_panic_over_generated_games() {
    // Execute and take back every generated move on a position that
    // used to crash move generation.
    let fen = "8/7P/4R3/p4pk1/P2p1r2/3P4/1R6/b1bK4 b - - 1 111";
    let mut pos = Position::from_fen(fen).unwrap();
    let mut moves = Vec::new();
    pos.generate_moves(ALL, &mut moves);
    for m in moves {
        pos.do_move(m);
        pos.undo_move();
    }
}
