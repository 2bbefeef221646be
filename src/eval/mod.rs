//! Static position evaluation.
//!
//! The standard evaluation is a tapered mid/end game score: material,
//! mobility, pawn structure (connected, isolated, double, passed),
//! king shelter, bishop pair and rook files. Weights were trained with
//! Texel's tuning method. Racing Kings uses a much simpler material
//! plus king-advance score.

pub mod cache;

use crate::attacks;
use crate::bitboard::{self, BitboardExt};
use crate::board::{Color, FIGURE_ARRAY_SIZE, Figure, Position};
use cache::{Cache, murmur_mix};
use once_cell::sync::Lazy;

/// Strictly greater than every evaluation score (mates excluded).
pub const KNOWN_WIN_SCORE: i32 = 25_000_000;
/// Strictly smaller than every evaluation score (mates excluded).
pub const KNOWN_LOSS_SCORE: i32 = -KNOWN_WIN_SCORE;
/// MATE_SCORE - N is mate in N plies.
pub const MATE_SCORE: i32 = 30_000_000;
/// MATED_SCORE + N is mated in N plies.
pub const MATED_SCORE: i32 = -MATE_SCORE;
/// Strictly outside every possible score.
pub const INFINITY_SCORE: i32 = 32_000_000;

/// A pair of mid and end game weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub m: i32,
    pub e: i32,
}

/// A running sum of scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eval {
    pub m: i32,
    pub e: i32,
}

impl Eval {
    /// Folds the pair into one score for the given game phase,
    /// 0 = opening, 256 = late endgame.
    #[inline(always)]
    pub fn feed(self, phase: i32) -> i32 {
        (self.m * (256 - phase) + self.e * phase) / 256
    }

    #[inline(always)]
    pub fn merge(&mut self, o: Eval) {
        self.m += o.m;
        self.e += o.e;
    }

    #[inline(always)]
    pub fn add(&mut self, s: Score) {
        self.m += s.m;
        self.e += s.e;
    }

    #[inline(always)]
    pub fn add_n(&mut self, s: Score, n: i32) {
        self.m += s.m * n;
        self.e += s.e * n;
    }

    #[inline(always)]
    pub fn neg(&mut self) {
        self.m = -self.m;
        self.e = -self.e;
    }
}

const fn s(m: i32, e: i32) -> Score {
    Score { m, e }
}

/// All evaluation parameters in one vector, sliced into named regions
/// at startup. The evaluation is effectively a single-layer network
/// y = W_m * x * (1-p) + W_e * x * p over features extracted from the
/// position, symmetrical with respect to colors.
#[rustfmt::skip]
pub static WEIGHTS: [Score; 94] = [
    s(1034, 5770), s(5363, 9844), s(39652, 54153), s(42277, 58849), s(57185, 103947),
    s(140637, 189061), s(4799, 7873), s(9625, 9558), s(950, 2925), s(1112, 1908),
    s(806, 1167), s(732, 824), s(168, 1149), s(-879, -359), s(3495, 7396),
    s(2193, 7557), s(1909, 7559), s(3903, 3354), s(3372, 6143), s(7773, 5680),
    s(6441, 4512), s(2974, 2896), s(3912, 6372), s(2689, 6273), s(3266, 4799),
    s(3581, 4578), s(4765, 6213), s(5273, 5606), s(5775, 4043), s(3817, 4274),
    s(3708, 8782), s(2391, 7627), s(5072, 4626), s(6109, 3746), s(5668, 5198),
    s(3913, 5131), s(2830, 5977), s(2266, 5967), s(3516, 10438), s(3637, 8738),
    s(4903, 5959), s(5655, 3593), s(5049, 5557), s(5400, 4573), s(3630, 7749),
    s(2604, 7455), s(5493, 12869), s(5021, 10574), s(8042, 6544), s(10390, -1256),
    s(11098, -2344), s(12808, 4315), s(8494, 9675), s(7990, 9444), s(13836, 17481),
    s(12537, 16982), s(11116, 10810), s(15238, 3620), s(10331, 2338), s(6943, 8458),
    s(-835, 14771), s(-1276, 18329), s(7371, 5198), s(256, 1926), s(-53, 2965),
    s(-254, 6546), s(2463, 10465), s(5507, 19296), s(11056, 20099), s(8034, 5202),
    s(4857, -3126), s(3065, 3432), s(-137, 6127), s(-2620, 8577), s(-9391, 12415),
    s(-3313, 12592), s(7738, 8987), s(18783, -215), s(-526, 755), s(6310, 5426),
    s(5263, 7710), s(-2482, 10646), s(2399, 8982), s(-607, 9555), s(7854, 5619),
    s(5386, 402), s(1228, 866), s(-991, 178), s(-1070, -1129), s(2183, 362),
    s(-2259, -681), s(3854, 9184), s(4472, 890), s(1300, 1524),
];

// Named chunks of WEIGHTS.
struct Weights {
    figure: [Score; FIGURE_ARRAY_SIZE],
    mobility: [Score; FIGURE_ARRAY_SIZE],
    pawn: [Score; 48],
    passed_pawn: [Score; 8],
    king_rank: [Score; 8],
    king_file: [Score; 8],
    connected_pawn: Score,
    double_pawn: Score,
    isolated_pawn: Score,
    pawn_threat: Score,
    king_shelter: Score,
    bishop_pair: Score,
    rook_on_open_file: Score,
    rook_on_half_open_file: Score,
}

static W: Lazy<Weights> = Lazy::new(|| {
    let mut it = WEIGHTS.iter().copied();
    let mut slice = |out: &mut [Score]| {
        for o in out.iter_mut() {
            *o = it.next().expect("weights vector too short");
        }
    };

    let mut w = Weights {
        figure: [Score::default(); FIGURE_ARRAY_SIZE],
        mobility: [Score::default(); FIGURE_ARRAY_SIZE],
        pawn: [Score::default(); 48],
        passed_pawn: [Score::default(); 8],
        king_rank: [Score::default(); 8],
        king_file: [Score::default(); 8],
        connected_pawn: Score::default(),
        double_pawn: Score::default(),
        isolated_pawn: Score::default(),
        pawn_threat: Score::default(),
        king_shelter: Score::default(),
        bishop_pair: Score::default(),
        rook_on_open_file: Score::default(),
        rook_on_half_open_file: Score::default(),
    };

    slice(&mut w.figure);
    slice(&mut w.mobility);
    slice(&mut w.pawn);
    slice(&mut w.passed_pawn);
    slice(&mut w.king_rank);
    slice(&mut w.king_file);

    let mut entry = || it.next().expect("weights vector too short");
    w.connected_pawn = entry();
    w.double_pawn = entry();
    w.isolated_pawn = entry();
    w.pawn_threat = entry();
    w.king_shelter = entry();
    w.bishop_pair = entry();
    w.rook_on_open_file = entry();
    w.rook_on_half_open_file = entry();

    assert!(it.next().is_none(), "not all weights used");
    w
});

/// The mid or end game figure weight, whichever is larger. Used by
/// futility margins.
pub fn figure_bonus(fig: Figure) -> i32 {
    let s = W.figure[fig as usize];
    s.m.max(s.e)
}

// Racing Kings piece values, in centipawns. Pawns never occur.
const RK_PIECE_VALUES: [i32; 6] = [0, 0, 300, 325, 500, 700];
const RK_KING_ADVANCE_VALUE: i32 = 250;

fn hash_pawns_and_shelter(pos: &Position, us: Color) -> u64 {
    let mut h = cache::MURMUR_SEED[us as usize];
    h = murmur_mix(pos.by_piece(us, Figure::Pawn), h);
    h = murmur_mix(pos.by_piece(us.opposite(), Figure::Pawn), h);
    h = murmur_mix(pos.by_piece(us, Figure::King), h);
    if pos.by_piece(us.opposite(), Figure::Queen) != 0 {
        // Mix in something to signal the queen's presence.
        h = murmur_mix(cache::MURMUR_SEED[Color::None as usize], h);
    }
    h
}

fn evaluate_pawns_and_shelter(pos: &Position, us: Color) -> Eval {
    let mut eval = Eval::default();
    eval.merge(evaluate_pawns(pos, us));
    eval.merge(evaluate_shelter(pos, us));
    eval
}

fn evaluate_pawns(pos: &Position, us: Color) -> Eval {
    let mut eval = Eval::default();
    let ours = pos.by_piece(us, Figure::Pawn);
    let theirs = pos.by_piece(us.opposite(), Figure::Pawn);

    let mut block = bitboard::east(theirs) | theirs | bitboard::west(theirs);
    let wings = bitboard::east(ours) | bitboard::west(ours);
    let double;
    if us == Color::White {
        block = bitboard::south_span(block) | bitboard::south_span(ours);
        double = ours & bitboard::south(ours);
    } else {
        block = bitboard::north_span(block) | bitboard::north_span(ours);
        double = ours & bitboard::north(ours);
    }

    // No pawn on the adjacent files.
    let isolated = ours & !bitboard::fill(wings);
    // Has a neighbouring pawn.
    let connected =
        ours & (bitboard::north(wings) | wings | bitboard::south(wings));
    // No pawn in front and no enemy on the adjacent files.
    let passed = ours & !block;

    let mut bb = ours;
    while bb != 0 {
        let sq = bb.pop();
        let pov_sq = sq.pov(us);
        let rank = pov_sq.rank();

        eval.add(W.figure[Figure::Pawn as usize]);
        eval.add(W.pawn[pov_sq.index() - 8]);

        if passed.has(sq) {
            eval.add(W.passed_pawn[rank as usize]);
        }
        if connected.has(sq) {
            eval.add(W.connected_pawn);
        }
        if double.has(sq) {
            eval.add(W.double_pawn);
        }
        if isolated.has(sq) {
            eval.add(W.isolated_pawn);
        }
    }

    eval
}

fn evaluate_shelter(pos: &Position, us: Color) -> Eval {
    let mut eval = Eval::default();
    let pawns = pos.by_piece(us, Figure::Pawn);
    let king = pos.by_piece(us, Figure::King);

    let sq = king.as_square().pov(us);
    eval.add(W.king_file[sq.file() as usize]);
    eval.add(W.king_rank[sq.rank() as usize]);

    // Shelter matters only while the enemy queen is on the board.
    if pos.by_piece(us.opposite(), Figure::Queen) != 0 {
        let king_span = bitboard::forward_span(us, king);
        let file = sq.file();
        if file > 0 && bitboard::west(king_span) & pawns == 0 {
            eval.add(W.king_shelter);
        }
        if king_span & pawns == 0 {
            eval.add_n(W.king_shelter, 2);
        }
        if file < 7 && bitboard::east(king_span) & pawns == 0 {
            eval.add(W.king_shelter);
        }
    }
    eval
}

fn evaluate_side(pos: &Position, us: Color, eval: &mut Eval, cache: &mut Cache) {
    eval.merge(cache.load(pos, us));
    let all = pos.all();
    let them = us.opposite();

    // Pawn forward mobility and threats on enemy pieces.
    let mobility = bitboard::forward(us, pos.by_piece(us, Figure::Pawn)) & !all;
    eval.add_n(W.mobility[Figure::Pawn as usize], mobility.count());
    let threats = pos.pawn_threats(us) & pos.by_color[them as usize];
    eval.add_n(W.pawn_threat, threats.count());

    // Mobility is counted against a mask that excludes own pawns and
    // squares covered by enemy pawns.
    let excl = pos.by_piece(us, Figure::Pawn) | pos.pawn_threats(them);

    let mut bb = pos.by_piece(us, Figure::Knight);
    while bb != 0 {
        let sq = bb.pop();
        eval.add(W.figure[Figure::Knight as usize]);
        let mobility = attacks::knight_mobility(sq) & !excl;
        eval.add_n(W.mobility[Figure::Knight as usize], mobility.count());
    }

    let mut num_bishops = 0;
    let mut bb = pos.by_piece(us, Figure::Bishop);
    while bb != 0 {
        let sq = bb.pop();
        eval.add(W.figure[Figure::Bishop as usize]);
        let mobility = attacks::bishop_mobility(sq, all) & !excl;
        eval.add_n(W.mobility[Figure::Bishop as usize], mobility.count());
        num_bishops += 1;
    }
    eval.add_n(W.bishop_pair, num_bishops / 2);

    let mut bb = pos.by_piece(us, Figure::Rook);
    while bb != 0 {
        let sq = bb.pop();
        eval.add(W.figure[Figure::Rook as usize]);
        let mobility = attacks::rook_mobility(sq, all) & !excl;
        eval.add_n(W.mobility[Figure::Rook as usize], mobility.count());

        let f = bitboard::file_bb(sq.file());
        if pos.by_piece(us, Figure::Pawn) & f == 0 {
            if pos.by_piece(them, Figure::Pawn) & f == 0 {
                eval.add(W.rook_on_open_file);
            } else {
                eval.add(W.rook_on_half_open_file);
            }
        }
    }

    let mut bb = pos.by_piece(us, Figure::Queen);
    while bb != 0 {
        let sq = bb.pop();
        eval.add(W.figure[Figure::Queen as usize]);
        let mobility = attacks::queen_mobility(sq, all) & !excl;
        eval.add_n(W.mobility[Figure::Queen as usize], mobility.count());
    }

    // King, each side has one.
    let sq = pos.by_piece(us, Figure::King).as_square();
    let mobility = attacks::king_mobility(sq) & !excl;
    eval.add_n(W.mobility[Figure::King as usize], mobility.count());
}

/// Evaluates the position as a (mid, end) pair from White's POV.
pub fn evaluate_position(pos: &Position, cache: &mut Cache) -> Eval {
    let mut eval = Eval::default();
    evaluate_side(pos, Color::Black, &mut eval, cache);
    eval.neg();
    evaluate_side(pos, Color::White, &mut eval, cache);
    eval
}

/// Evaluates the position from White's POV in internal weight units.
pub fn evaluate(pos: &Position, cache: &mut Cache) -> i32 {
    let eval = evaluate_position(pos, cache);
    let score = eval.feed(phase(pos));
    assert!(
        KNOWN_LOSS_SCORE < score && score < KNOWN_WIN_SCORE,
        "score {score} outside ({KNOWN_LOSS_SCORE}, {KNOWN_WIN_SCORE})"
    );
    score
}

/// Racing Kings evaluation from White's POV, already in centipawns:
/// variant piece values plus a king-advance bonus per rank.
pub fn evaluate_racing_kings(pos: &Position) -> i32 {
    let mut score = 0;
    for us in [Color::White, Color::Black] {
        let mut side = 0;
        for fig in [Figure::Knight, Figure::Bishop, Figure::Rook, Figure::Queen] {
            side += RK_PIECE_VALUES[fig as usize] * pos.by_piece(us, fig).count();
        }
        let king_sq = pos.by_piece(us, Figure::King).as_square();
        side += king_sq.rank() * RK_KING_ADVANCE_VALUE;

        if us == Color::White {
            score += side;
        } else {
            score -= side;
        }
    }
    score
}

/// Scales the score returned by evaluate so one pawn is about 100.
#[inline(always)]
pub fn scale_to_centipawn(score: i32) -> i32 {
    (score + 64) / 128
}

/// The progress of the game: 0 at opening material, 256 when only
/// kings and pawns remain.
pub fn phase(pos: &Position) -> i32 {
    let total = 4 * 1 + 4 * 1 + 4 * 2 + 2 * 4;
    let mut curr = total;
    curr -= pos.by_figure[Figure::Knight as usize].count();
    curr -= pos.by_figure[Figure::Bishop as usize].count();
    curr -= pos.by_figure[Figure::Rook as usize].count() * 2;
    curr -= pos.by_figure[Figure::Queen as usize].count() * 4;
    (curr * 256 + total / 2) / total
}

/// A fresh pawns-and-shelter cache; the search keeps one per engine.
pub fn new_pawns_and_shelter_cache() -> Cache {
    Cache::new(9, hash_pawns_and_shelter, evaluate_pawns_and_shelter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Variant;

    #[test]
    fn start_position_is_roughly_balanced() {
        let mut pos = Position::from_fen(crate::board::FEN_START_POS).unwrap();
        let mut cache = new_pawns_and_shelter_cache();
        let score = scale_to_centipawn(evaluate(&mut pos, &mut cache));
        assert!(score.abs() < 50, "start position score {score}");
    }

    #[test]
    fn phase_bounds() {
        let pos = Position::from_fen(crate::board::FEN_START_POS).unwrap();
        assert_eq!(phase(&pos), 0);
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(phase(&pos), 256);
    }

    #[test]
    fn racing_kings_rewards_king_advance() {
        let mut pos =
            Position::from_fen_variant(Variant::RacingKings.start_fen(), Variant::RacingKings)
                .unwrap();
        assert_eq!(evaluate_racing_kings(&pos), 0);

        // White king one rank further up is worth one advance bonus.
        let m = pos.uci_to_move("h2h3").unwrap();
        pos.do_move(m);
        assert_eq!(evaluate_racing_kings(&pos), RK_KING_ADVANCE_VALUE);
    }

    #[test]
    fn material_up_is_positive() {
        // White has an extra queen.
        let mut pos =
            Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let mut cache = new_pawns_and_shelter_cache();
        assert!(scale_to_centipawn(evaluate(&mut pos, &mut cache)) > 300);
    }
}
