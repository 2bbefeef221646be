//! Position invariants: make/unmake reversibility, castling rights,
//! en passant, draw rules and the pseudo-legality screen.

mod common;

use std::str::FromStr;
use stretto::board::{
    FEN_START_POS, NO_CASTLE, Piece, Position, WHITE_OO, WHITE_OOO, color_figure,
};
use stretto::moves::types::{ALL, Move, MoveKind, NULL_MOVE, QUIET, TACTICAL, VIOLENT};
use stretto::square::Square;

const TEST_BOARD_1: &str = "r3k2r/3ppp2/1BB3B1/pp2P1pp/PP4PP/5b2/3PPP2/R3K2R w KQkq - 0 1";

fn sq(s: &str) -> Square {
    Square::from_str(s).unwrap()
}

#[test]
fn make_unmake_restores_the_position_bit_for_bit() {
    for fen in common::TEST_FENS {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut moves = Vec::new();
        pos.generate_moves(ALL, &mut moves);

        let before = pos.clone();
        for &m in &moves {
            pos.do_move(m);
            pos.undo_move();
            assert_eq!(pos, before, "make/unmake of {m} changed {fen}");
        }
    }
}

#[test]
fn make_unmake_over_full_games() {
    for game in common::TEST_GAMES {
        let mut pos = Position::from_fen(FEN_START_POS).unwrap();
        let mut stack = Vec::new();

        for s in game.split_whitespace() {
            let m = pos.uci_to_move(s).unwrap();
            stack.push((m, pos.clone()));
            pos.do_move(m);
            assert_eq!(pos.last_move(), m);
            // One state per move played, plus the base state.
            assert_eq!(pos.num_states(), stack.len() + 1);
            pos.verify().unwrap();
        }

        for (m, before) in stack.into_iter().rev() {
            assert_eq!(pos.last_move(), m);
            pos.undo_move();
            assert_eq!(pos, before);
        }
    }
}

#[test]
fn castling_moves_the_rook_and_back() {
    let mut pos = Position::from_fen(TEST_BOARD_1).unwrap();

    let m = pos.uci_to_move("e1c1").unwrap();
    assert_eq!(m.kind(), MoveKind::Castling);
    pos.do_move(m);
    assert_eq!(pos.get(sq("a1")), Piece::NONE);
    assert_eq!(pos.get(sq("c1")), Piece::WHITE_KING);
    assert_eq!(pos.get(sq("d1")), Piece::WHITE_ROOK);
    assert_eq!(pos.get(sq("e1")), Piece::NONE);

    pos.undo_move();
    assert_eq!(pos.get(sq("a1")), Piece::WHITE_ROOK);
    assert_eq!(pos.get(sq("c1")), Piece::NONE);
    assert_eq!(pos.get(sq("d1")), Piece::NONE);
    assert_eq!(pos.get(sq("e1")), Piece::WHITE_KING);
}

#[test]
fn castling_rights_are_updated_and_restored() {
    let mut pos = Position::from_fen(TEST_BOARD_1).unwrap();
    pos.set_castling_ability(WHITE_OOO);

    let has_ooo = |pos: &mut Position| {
        pos.legal_moves()
            .iter()
            .any(|m| m.kind() == MoveKind::Castling && m.to() == sq("c1"))
    };
    assert!(has_ooo(&mut pos));

    // Moving the a1 rook loses the queen-side right, and undoing the
    // move restores it.
    let m1 = pos.uci_to_move("a1a2").unwrap();
    pos.do_move(m1);
    let m2 = pos.uci_to_move("a8a7").unwrap();
    pos.do_move(m2);
    assert_eq!(pos.castling_ability(), NO_CASTLE);
    assert!(!has_ooo(&mut pos));

    pos.undo_move();
    pos.undo_move();
    assert_eq!(pos.castling_ability(), WHITE_OOO);
    assert!(has_ooo(&mut pos));
}

#[test]
fn rook_capture_clears_castling_rights() {
    let mut pos = Position::from_fen(common::KIWIPETE).unwrap();
    for s in ["f3f5", "h3g2", "a1b1", "g2h1n"] {
        let m = pos.uci_to_move(s).unwrap();
        pos.do_move(m);
    }
    // The white king-side right is gone after the h1 rook fell.
    assert_eq!(pos.castling_ability() & WHITE_OO, 0);
    assert_ne!(pos.castling_ability() & (stretto::board::BLACK_OO | stretto::board::BLACK_OOO), 0);
}

#[test]
fn castling_refused_through_attacked_squares() {
    let mut pos = Position::from_fen(common::KIWIPETE).unwrap();
    for s in ["f3f5", "d7d6", "e2b5"] {
        let m = pos.uci_to_move(s).unwrap();
        pos.do_move(m);
    }
    // The bishop on b5 attacks e8; Black may not castle at all.
    let castles: Vec<Move> = pos
        .legal_moves()
        .into_iter()
        .filter(|m| m.kind() == MoveKind::Castling)
        .collect();
    assert!(castles.is_empty(), "castling through check: {castles:?}");
}

#[test]
fn enpassant_square_set_only_by_double_push() {
    let mut pos = Position::new();
    pos.set_side_to_move(stretto::board::Color::White);
    pos.put(sq("h1"), Piece::WHITE_KING);
    pos.put(sq("h8"), Piece::BLACK_KING);
    pos.put(sq("a3"), Piece::WHITE_PAWN);
    pos.put(sq("a4"), Piece::BLACK_PAWN);
    pos.put(sq("b2"), Piece::WHITE_PAWN);
    pos.put(sq("c3"), Piece::WHITE_PAWN);
    pos.put(sq("c4"), Piece::BLACK_PAWN);

    let m = pos.uci_to_move("b2b4").unwrap();
    pos.do_move(m);
    assert_eq!(pos.enpassant_square(), sq("b3"));

    // Both black pawns can take en passant, and only en passant.
    let mut moves = Vec::new();
    pos.generate_figure_moves(stretto::board::Figure::Pawn, ALL, &mut moves);
    assert_eq!(moves.len(), 2);
    for m in &moves {
        assert_eq!(m.kind(), MoveKind::Enpassant);
        assert_eq!(m.to(), sq("b3"));
        assert_eq!(m.capture_square(), sq("b4"));
    }

    pos.undo_move();
    assert_eq!(pos.enpassant_square(), Square::A1);
}

#[test]
fn enpassant_is_not_fabricated() {
    // d3 is the en passant square, but only the e4 pawn may take.
    let pos = Position::from_fen("8/7p/p5pb/4k3/P1pPn3/8/P5PP/1rB2RK1 b - d3 0 28").unwrap();
    let mut moves = Vec::new();
    pos.generate_moves(ALL, &mut moves);
    let ep: Vec<&Move> = moves.iter().filter(|m| m.kind() == MoveKind::Enpassant).collect();
    assert_eq!(ep.len(), 1);
    assert_eq!(ep[0].from(), sq("c4"));
    assert_eq!(ep[0].to(), sq("d3"));
}

#[test]
fn promotions_generate_all_four_figures() {
    let pos = Position::from_fen("3k4/8/8/p1P2p2/PpP1pP2/pPPpP3/2P2pp1/3K3R b - - 0 1").unwrap();
    let mut moves = Vec::new();
    pos.generate_figure_moves(stretto::board::Figure::Pawn, ALL, &mut moves);

    let f2: Vec<String> = moves
        .iter()
        .filter(|m| m.from() == sq("f2"))
        .map(|m| m.uci())
        .collect();
    for m in ["f2f1n", "f2f1b", "f2f1r", "f2f1q"] {
        assert!(f2.contains(&m.to_string()), "missing {m} in {f2:?}");
    }
    assert_eq!(f2.len(), 4);

    // g2 can promote by pushing and by capturing h1.
    let g2: Vec<&Move> = moves.iter().filter(|m| m.from() == sq("g2")).collect();
    assert_eq!(g2.len(), 8);
}

#[test]
fn halfmove_clock_follows_pawn_moves_and_captures() {
    let data = [
        ("8/K5p1/1P1k1p1p/5P1P/2R3P1/8/8/8 b - - 0 78", "d6d5", 1),
        (
            "6k1/Qp1r1pp1/p1rP3p/P3q3/2Bnb1P1/1P3PNP/4p1K1/R1R5 b - - 15 1",
            "e5g3",
            0,
        ),
        (
            "6k1/Qp1r1pp1/p1rP3p/P3q3/2Bnb1P1/1P3PNP/4p1K1/R1R5 b - - 15 1",
            "d7d8",
            16,
        ),
    ];

    for (fen, s, expected) in data {
        let mut pos = Position::from_fen(fen).unwrap();
        let m = pos.uci_to_move(s).unwrap();
        pos.do_move(m);
        assert_eq!(pos.halfmove_clock(), expected, "after {s} on {fen}");
    }
}

#[test]
fn fifty_move_rule_boundary() {
    let pos = Position::from_fen("2b5/8/1P6/8/2k3K1/8/5B2/8 w - - 99 113").unwrap();
    assert!(!pos.fifty_move_rule());

    let mut pos = pos;
    let m = pos.uci_to_move("g4f4").unwrap();
    pos.do_move(m);
    assert!(pos.fifty_move_rule());

    let pos = Position::from_fen("2b5/8/1P6/8/2k2K2/8/5B2/8 b - - 100 113").unwrap();
    assert!(pos.fifty_move_rule());
}

#[test]
fn threefold_repetition_counts_exact_occurrences() {
    let mut pos = Position::from_fen(FEN_START_POS).unwrap();
    let mut play = |pos: &mut Position, moves: &[&str]| {
        for s in moves {
            let m = pos.uci_to_move(s).unwrap();
            pos.do_move(m);
        }
    };

    play(&mut pos, &["b1c3", "b8c6", "c3b1", "c6b8"]);
    assert!(pos.three_fold_repetition() < 3);

    play(&mut pos, &["b1c3", "b8c6", "c3b1", "c6b8"]);
    assert_eq!(pos.three_fold_repetition(), 3);

    // A pawn move resets the window.
    play(&mut pos, &["d2d4", "d7d5"]);
    play(&mut pos, &["b1c3", "b8c6", "c3b1", "c6b8"]);
    assert!(pos.three_fold_repetition() < 3);

    play(&mut pos, &["b1c3", "b8c6", "c3b1", "c6b8"]);
    assert_eq!(pos.three_fold_repetition(), 3);
}

#[test]
fn null_move_round_trip() {
    let mut pos = Position::from_fen(FEN_START_POS).unwrap();
    pos.do_move(NULL_MOVE);
    assert_eq!(pos.side_to_move, stretto::board::Color::Black);
    pos.undo_move();
    assert_eq!(pos.to_fen(), FEN_START_POS);

    // The null move clears the en passant square and restores it on
    // undo.
    let m = pos.uci_to_move("d2d4").unwrap();
    pos.do_move(m);
    pos.do_move(NULL_MOVE);
    assert_eq!(pos.enpassant_square(), Square::A1);
    pos.undo_move();
    assert_eq!(pos.enpassant_square(), sq("d3"));
}

#[test]
fn pseudo_legality_screen_rejects_stale_hash_moves() {
    let data = [
        (
            "rnbqkbnr/ppp1pppp/8/8/4p3/3B4/PPPP1PPP/RNBQK1NR w KQkq - 0 1",
            Move::new(
                MoveKind::Normal,
                Square::D2,
                Square::D4,
                Piece::NONE,
                Piece::WHITE_PAWN,
            ),
        ),
        (
            "rnbqkbnr/ppp1pppp/8/8/8/4pN2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
            Move::new(
                MoveKind::Castling,
                Square::E1,
                Square::G1,
                Piece::NONE,
                Piece::WHITE_KING,
            ),
        ),
        (
            "rnbqkbnr/ppp1pppp/8/8/8/4pN2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
            Move::new(
                MoveKind::Normal,
                Square::B8,
                Square::D7,
                Piece::WHITE_PAWN,
                Piece::BLACK_KNIGHT,
            ),
        ),
        (
            "rnbqkbnr/ppp1pppp/8/8/8/4pN2/PPPP1PPP/RNBQKB1R w KQkq - 1 2",
            Move::new(
                MoveKind::Normal,
                Square::B1,
                Square::D2,
                Piece::WHITE_PAWN,
                Piece::WHITE_KNIGHT,
            ),
        ),
    ];

    for (fen, m) in data {
        let pos = Position::from_fen(fen).unwrap();
        assert!(!pos.is_pseudo_legal(m), "{m} accepted on {fen}");
    }
}

#[test]
fn generated_moves_are_pseudo_legal() {
    for fen in common::TEST_FENS {
        let pos = Position::from_fen(fen).unwrap();
        let mut moves = Vec::new();
        pos.generate_moves(ALL, &mut moves);
        for m in moves {
            assert!(pos.is_pseudo_legal(m), "{m} rejected on {fen}");
            assert_eq!(m.piece().color(), pos.side_to_move);
            assert_eq!(m.target().color(), pos.side_to_move);
        }
    }
}

#[test]
fn move_kinds_partition_all_moves() {
    for fen in common::TEST_FENS {
        let pos = Position::from_fen(fen).unwrap();

        let mut seen = std::collections::HashMap::new();
        for kind in [VIOLENT, TACTICAL, QUIET] {
            let mut moves = Vec::new();
            pos.generate_moves(kind, &mut moves);
            for m in moves {
                *seen.entry(m).or_insert(0u8) |= kind;
            }
        }

        for (m, k) in &seen {
            assert!(
                [VIOLENT, TACTICAL, QUIET].contains(k),
                "move {m} has mixed kind {k} on {fen}"
            );
        }

        let mut all = Vec::new();
        pos.generate_moves(ALL, &mut all);
        assert_eq!(all.len(), seen.len(), "kind partition mismatch on {fen}");
    }
}

#[test]
fn quiet_moves_are_quiet_and_tactical_are_tactical() {
    for fen in common::TEST_FENS {
        let pos = Position::from_fen(fen).unwrap();

        let mut moves = Vec::new();
        pos.generate_moves(QUIET, &mut moves);
        for m in &moves {
            assert!(m.is_quiet(), "expected quiet move, got {m} on {fen}");
        }

        moves.clear();
        pos.generate_moves(TACTICAL, &mut moves);
        for m in &moves {
            let underpromotion = m.kind() == MoveKind::Promotion
                && m.target().figure() != stretto::board::Figure::Queen;
            assert!(
                m.kind() == MoveKind::Castling || underpromotion,
                "expected tactical move, got {m} on {fen}"
            );
        }
    }
}

#[test]
fn has_legal_moves_detects_mates_and_stalemates() {
    let data = [
        ("8/7P/4R3/p4pk1/P2p1r2/3P4/1R6/b1bK4 b - - 1 111", true),
        ("Q4k2/2p2p2/1r6/3p3p/4PPb1/2P3P1/7P/6K1 b - - 0 44", true),
        ("4b2k/5pQ1/5P2/7p/4P3/2P1K1P1/1r6/8 b - - 10 57", false),
        ("5k2/5P2/5K2/8/8/8/8/8 b - - 0 1", false),
    ];
    for (fen, expected) in data {
        let mut pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.has_legal_moves(), expected, "{fen}");
    }
}

#[test]
fn least_valuable_attacker_ordering() {
    use stretto::board::{Color, Figure};
    let pos = Position::from_fen("3k4/8/8/p1P2p2/PpP1pP2/pPPpP3/2P2pp1/3K3R w - - 0 1").unwrap();

    assert_eq!(pos.get_attacker(sq("b4"), Color::White), Figure::Pawn);
    assert_eq!(pos.get_attacker(sq("e4"), Color::White), Figure::None);
    assert_eq!(pos.get_attacker(sq("e1"), Color::Black), Figure::Pawn);
    assert_eq!(pos.get_attacker(sq("g1"), Color::Black), Figure::Pawn);

    let pos = Position::from_fen("4K3/8/3n4/8/4N3/3n4/8/4k3 w - - 0 1").unwrap();
    assert_eq!(pos.get_attacker(sq("e8"), Color::Black), Figure::Knight);
    assert_eq!(pos.get_attacker(sq("c4"), Color::Black), Figure::Knight);
    assert_eq!(pos.get_attacker(sq("e1"), Color::Black), Figure::Knight);
    assert_eq!(pos.get_attacker(sq("h8"), Color::Black), Figure::None);
}

#[test]
fn capture_of_own_color_never_generated() {
    for fen in common::TEST_FENS {
        let pos = Position::from_fen(fen).unwrap();
        let mut moves = Vec::new();
        pos.generate_moves(ALL, &mut moves);
        for m in moves {
            assert_ne!(m.capture().color(), pos.side_to_move, "move {m} on {fen}");
        }
    }
}

#[test]
fn fen_round_trip_over_corpus() {
    for fen in common::TEST_FENS {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }
    // Ensure color_figure stays consistent with the symbols used in
    // the corpus FENs.
    let pos = Position::from_fen(FEN_START_POS).unwrap();
    assert_eq!(
        pos.get(Square::D1),
        color_figure(stretto::board::Color::White, stretto::board::Figure::Queen)
    );
}
