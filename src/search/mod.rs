//! Move search: iterative deepening alpha-beta in negamax form.
//!
//! Implemented techniques: aspiration windows, principal variation
//! search, null move pruning, late move reductions, futility and
//! history pruning, check extensions, mate distance pruning and a
//! quiescence search with static exchange evaluation.

pub mod pv;
pub mod see;
pub mod stack;
pub mod time_control;
pub mod tt;

use crate::bitboard;
use crate::board::{Color, Figure, Position, Variant};
use crate::eval::{
    self, INFINITY_SCORE, KNOWN_LOSS_SCORE, KNOWN_WIN_SCORE, MATE_SCORE, MATED_SCORE,
    cache::Cache, evaluate, evaluate_racing_kings, scale_to_centipawn,
};
use crate::moves::types::{ALL, Move, MoveKind, NULL_MOVE, VIOLENT};
use crate::uci::UciLogger;
use pv::PvTable;
use see::see_sign;
use stack::Stack;
use std::sync::Arc;
use time_control::TimeControl;
use tt::{DEFAULT_HASH_TABLE_SIZE_MB, HashEntry, HashKind, HashTable};

// How much to extend the search on checks.
const CHECK_DEPTH_EXTENSION: i32 = 1;
// Disable null-move pruning at and below this depth.
const NULL_MOVE_DEPTH_LIMIT: i32 = 1;
// Default null-move depth reduction; more in some situations.
const NULL_MOVE_DEPTH_REDUCTION: i32 = 1;
// Do not reduce late moves at and below this depth.
const LMR_DEPTH_LIMIT: i32 = 3;
// Maximum depth for futility pruning.
const FUTILITY_DEPTH_LIMIT: i32 = 3;

const INITIAL_ASPIRATION_WINDOW: i32 = 21; // about a quarter of a pawn
const FUTILITY_MARGIN: i32 = 150; // about a pawn and a half
const CHECKPOINT_STEP: u64 = 10000; // nodes between clock polls

// Score from side to move's POV given the score from White's POV.
const SCORE_MULTIPLIER: [i32; 3] = [0, -1, 1];

/// Engine options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// True to display info strings.
    pub analyse_mode: bool,
}

/// Basic search statistics, reset at the start of each search.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    /// Number of transposition table hits.
    pub cache_hit: u64,
    /// Number of transposition table misses.
    pub cache_miss: u64,
    /// Number of nodes searched.
    pub nodes: u64,
    /// Depth of the last completed iteration.
    pub depth: i32,
    /// Maximum ply reached on the PV.
    pub sel_depth: i32,
}

impl Stats {
    /// The ratio of hits over the total number of lookups.
    pub fn cache_hit_ratio(&self) -> f32 {
        self.cache_hit as f32 / (self.cache_hit + self.cache_miss) as f32
    }
}

/// Search progress sink. Exactly two implementations exist, so a sum
/// type with a match beats a trait object; the call sites are at
/// search start and end and once per completed depth.
pub enum Logger {
    /// Discards everything.
    Null,
    /// Writes UCI info lines to stdout.
    Uci(UciLogger),
}

impl Logger {
    fn begin_search(&mut self) {
        match self {
            Logger::Null => {}
            Logger::Uci(log) => log.begin_search(),
        }
    }

    fn end_search(&mut self) {
        match self {
            Logger::Null => {}
            Logger::Uci(log) => log.end_search(),
        }
    }

    fn print_pv(&mut self, stats: &Stats, score: i32, pv: &[Move]) {
        match self {
            Logger::Null => {}
            Logger::Uci(log) => log.print_pv(stats, score, pv),
        }
    }
}

// How well a move performed in the past: (bad, good) counters.
#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    counter: [i32; 2],
    mv: Move,
}

/// A fixed-size hash table of move history counters. Old moves are
/// evicted on collision, so the table is approximately LRU.
struct HistoryTable {
    entries: Vec<HistoryEntry>,
}

// Murmur-inspired hash of the packed move; upper bits are better
// mixed than the lower ones. The multiplier was chosen to minimize
// collisions.
fn history_hash(m: Move) -> usize {
    let h = m.packed().wrapping_mul(438650727);
    (h.wrapping_add(h << 17) >> 22) as usize
}

impl HistoryTable {
    fn new() -> HistoryTable {
        HistoryTable {
            entries: vec![
                HistoryEntry {
                    counter: [0, 0],
                    mv: NULL_MOVE,
                };
                1024
            ],
        }
    }

    // The (bad, good) counters for m.
    fn get(&self, m: Move) -> (i32, i32) {
        let h = history_hash(m);
        if self.entries[h].mv != m {
            (0, 0)
        } else {
            (self.entries[h].counter[0], self.entries[h].counter[1])
        }
    }

    // Bumps a counter for m, evicting an unrelated move if needed.
    // Counters start from 1 so the ratio estimate is well defined.
    fn inc(&mut self, m: Move, good: bool) {
        let h = history_hash(m);
        if self.entries[h].mv != m {
            self.entries[h] = HistoryEntry {
                counter: [1, 1],
                mv: m,
            };
        }
        self.entries[h].counter[good as usize] += 1;
    }
}

// True if a passed pawn appears or disappears with m. The heuristic
// does not handle discovered passers.
fn passed(pos: &Position, m: Move) -> bool {
    if m.piece().figure() == Figure::Pawn {
        // No pawns ahead on its own or the adjacent files.
        let bb = m.to().bitboard();
        let bb = bitboard::west(bb) | bb | bitboard::east(bb);
        let pawns =
            pos.by_figure[Figure::Pawn as usize] & !m.to().bitboard() & !m.from().bitboard();
        if bitboard::forward_span(m.side_to_move(), bb) & pawns == 0 {
            return true;
        }
    }
    if m.capture().figure() == Figure::Pawn {
        let bb = m.to().bitboard();
        let bb = bitboard::west(bb) | bb | bitboard::east(bb);
        let pawns =
            pos.by_figure[Figure::Pawn as usize] & !m.to().bitboard() & !m.from().bitboard();
        if bitboard::backward_span(m.side_to_move(), bb) & pawns == 0 {
            return true;
        }
    }
    false
}

// True if m cannot raise the static evaluation above alpha. This is a
// heuristic; mistakes happen.
fn is_futile(pos: &Position, static_score: i32, alpha: i32, margin: i32, m: Move) -> bool {
    if m.kind() == MoveKind::Promotion {
        // Promotions and passed pawns can improve the evaluation by
        // much more than the futility margin.
        return false;
    }
    let f = m.capture().figure();
    let delta = scale_to_centipawn(eval::figure_bonus(f));
    static_score + delta + margin < alpha && !passed(pos, m)
}

/// The engine searches the best move for a position.
pub struct Engine {
    pub options: Options,
    pub log: Logger,
    pub stats: Stats,
    pub position: Position,

    tt: HashTable,
    root_ply: usize, // position's ply when the search started
    stack: Stack,
    pv_table: PvTable,
    history: HistoryTable,
    pawn_cache: Cache,

    time_control: Option<Arc<TimeControl>>,
    stopped: bool,
    checkpoint: u64,
}

impl Engine {
    /// A new engine for pos. The start position is used when pos is
    /// None.
    pub fn new(pos: Option<Position>, log: Logger, options: Options) -> Engine {
        let mut eng = Engine {
            options,
            log,
            stats: Stats::default(),
            position: Position::default(),
            tt: HashTable::new(DEFAULT_HASH_TABLE_SIZE_MB),
            root_ply: 0,
            stack: Stack::new(),
            pv_table: PvTable::new(),
            history: HistoryTable::new(),
            pawn_cache: eval::new_pawns_and_shelter_cache(),
            time_control: None,
            stopped: false,
            checkpoint: 0,
        };
        eng.set_position(pos);
        eng
    }

    /// Sets the current position; None means the variant's starting
    /// position.
    pub fn set_position(&mut self, pos: Option<Position>) {
        match pos {
            Some(pos) => self.position = pos,
            None => {
                let variant = self.position.variant;
                self.position = Position::from_fen_variant(variant.start_fen(), variant)
                    .expect("start FEN is valid");
            }
        }
    }

    /// Switches the variant and resets to its starting position.
    pub fn set_variant(&mut self, variant: Variant) {
        self.position = Position::from_fen_variant(variant.start_fen(), variant)
            .expect("start FEN is valid");
    }

    /// Executes a move on the current position.
    pub fn do_move(&mut self, m: Move) {
        self.position.do_move(m);
    }

    /// Takes back the last move.
    pub fn undo_move(&mut self) {
        self.position.undo_move();
    }

    /// Resizes the transposition table to size_mb megabytes.
    pub fn resize_hash_table(&mut self, size_mb: usize) {
        self.tt = HashTable::new(size_mb);
    }

    /// Clears the transposition table, e.g. for a new game.
    pub fn clear_hash_table(&mut self) {
        self.tt.clear();
    }

    /// Evaluates the position from the side to move's POV, in
    /// centipawns.
    pub fn score(&mut self) -> i32 {
        let score = match self.position.variant {
            Variant::Standard => {
                scale_to_centipawn(evaluate(&self.position, &mut self.pawn_cache))
            }
            Variant::RacingKings => evaluate_racing_kings(&self.position),
        };
        SCORE_MULTIPLIER[self.position.side_to_move as usize] * score
    }

    // The ply from the beginning of the search.
    fn ply(&self) -> i32 {
        (self.position.ply - self.root_ply) as i32
    }

    // Checks whether the game has already ended here: missing kings,
    // insufficient material, the fifty-move rule or a repetition.
    // At root two repetitions are not yet a draw, deeper they are.
    fn end_position(&mut self) -> Option<i32> {
        let pos = &self.position;
        let us = pos.side_to_move as usize;
        let white_king = pos.by_piece(Color::White, Figure::King);
        let black_king = pos.by_piece(Color::Black, Figure::King);
        if white_king == 0 && black_king == 0 {
            return Some(0);
        }
        if white_king == 0 {
            return Some(SCORE_MULTIPLIER[us] * (MATED_SCORE + self.ply()));
        }
        if black_king == 0 {
            return Some(SCORE_MULTIPLIER[us] * (MATE_SCORE - self.ply()));
        }
        if pos.insufficient_material() {
            return Some(0);
        }
        if pos.fifty_move_rule() {
            return Some(0);
        }
        let r = pos.three_fold_repetition();
        if (self.ply() > 0 && r >= 2) || r >= 3 {
            return Some(0);
        }
        None
    }

    // Probes the transposition table for the current position. Mate
    // scores are stored relative to the stored position and adjusted
    // back relative to the root here.
    fn retrieve_hash(&mut self) -> HashEntry {
        let entry = self.tt.get(&self.position);

        if entry.kind == HashKind::NoEntry {
            self.stats.cache_miss += 1;
            return HashEntry::default();
        }
        if entry.mv != NULL_MOVE && !self.position.is_pseudo_legal(entry.mv) {
            self.stats.cache_miss += 1;
            return HashEntry::default();
        }

        let mut entry = entry;
        if entry.score < KNOWN_LOSS_SCORE {
            if entry.kind == HashKind::Exact {
                entry.score += self.ply();
            }
        } else if entry.score > KNOWN_WIN_SCORE {
            if entry.kind == HashKind::Exact {
                entry.score -= self.ply();
            }
        }

        self.stats.cache_hit += 1;
        entry
    }

    // Stores the current position. Mate scores are saved relative to
    // this position; non-exact mate bounds are saturated to the
    // known-win/loss boundary or dropped entirely.
    fn update_hash(&mut self, alpha: i32, beta: i32, depth: i32, mut score: i32, mv: Move) {
        let mut kind = HashKind::Exact;
        if score <= alpha {
            kind = HashKind::FailedLow;
        } else if score >= beta {
            kind = HashKind::FailedHigh;
        }

        if score < KNOWN_LOSS_SCORE {
            match kind {
                HashKind::Exact => score -= self.ply(),
                HashKind::FailedLow => score = KNOWN_LOSS_SCORE,
                _ => return,
            }
        } else if score > KNOWN_WIN_SCORE {
            match kind {
                HashKind::Exact => score += self.ply(),
                HashKind::FailedHigh => score = KNOWN_WIN_SCORE,
                _ => return,
            }
        }

        let entry = HashEntry {
            mv,
            score,
            depth: depth.clamp(i8::MIN as i32, i8::MAX as i32) as i8,
            kind,
            ..HashEntry::default()
        };
        self.tt.put(&self.position, entry);
    }

    // Evaluates the position after resolving all captures.
    //
    // A very limited search considering only violent moves. Checks
    // are not searched; the move ordering puts a king capture first.
    fn search_quiescence(&mut self, alpha: i32, beta: i32) -> i32 {
        self.stats.nodes += 1;
        if let Some(score) = self.end_position() {
            return score;
        }

        // Stand pat.
        let static_score = self.score();
        if static_score >= beta {
            return static_score;
        }
        let mut local_alpha = alpha.max(static_score);

        let us = self.position.side_to_move;
        let in_check = self.position.is_checked(us);

        let mut best_move = NULL_MOVE;
        self.stack.generate_moves(&self.position, VIOLENT, NULL_MOVE);
        loop {
            let m = self.stack.pop_move(&self.position);
            if m == NULL_MOVE {
                break;
            }

            // Prune futile moves which would just stand pat one ply
            // down anyway.
            if !in_check && is_futile(&self.position, static_score, local_alpha, FUTILITY_MARGIN, m)
            {
                continue;
            }

            // Discard illegal moves and losing captures.
            self.position.do_move(m);
            if self.position.is_checked(us)
                || (!in_check && m.kind() == MoveKind::Normal && see_sign(&self.position, m))
            {
                self.position.undo_move();
                continue;
            }
            // In Racing Kings giving check is illegal, so captures
            // that check are discarded as well.
            if self.position.variant == Variant::RacingKings
                && self.position.is_checked_local(us.opposite())
            {
                self.position.undo_move();
                continue;
            }

            let score = -self.search_quiescence(-beta, -local_alpha);
            self.position.undo_move();

            if score >= beta {
                return score;
            }
            if score > local_alpha {
                local_alpha = score;
                best_move = m;
            }
        }

        if alpha < local_alpha && local_alpha < beta {
            self.pv_table.put(&self.position, best_move);
        }
        local_alpha
    }

    // Descends on the search tree after a move was executed.
    //
    // lmr is how much to reduce a late move; null_window requests a
    // scout search first. Undoes the move before returning.
    fn try_move(&mut self, alpha: i32, beta: i32, depth: i32, lmr: i32, null_window: bool) -> i32 {
        let depth = depth - 1;

        let mut score = alpha + 1;
        if lmr > 0 {
            // Reduced-depth scout for late moves.
            score = -self.search_tree(-alpha - 1, -alpha, depth - lmr);
        }

        if score > alpha {
            // The reduction is disabled or the scout failed high.
            if null_window {
                score = -self.search_tree(-alpha - 1, -alpha, depth);
                if alpha < score && score < beta {
                    score = -self.search_tree(-beta, -alpha, depth);
                }
            } else {
                score = -self.search_tree(-beta, -alpha, depth);
            }
        }

        self.position.undo_move();
        score
    }

    /// The fail-soft alpha-beta tree search: the returned score may
    /// fall outside the (alpha, beta) window.
    ///
    /// If score <= alpha the search failed low and the score is an
    /// upper bound; if score >= beta it failed high and the score is
    /// a lower bound; otherwise the score is exact. The score is from
    /// the side to move's POV.
    fn search_tree(&mut self, alpha: i32, beta: i32, depth: i32) -> i32 {
        let ply = self.ply();
        let pv_node = alpha + 1 < beta;
        let us = self.position.side_to_move;

        // Update statistics and poll the clock every few thousand
        // nodes.
        self.stats.nodes += 1;
        if !self.stopped && self.stats.nodes >= self.checkpoint {
            self.checkpoint = self.stats.nodes + CHECKPOINT_STEP;
            if let Some(tc) = &self.time_control {
                if tc.stopped() {
                    self.stopped = true;
                }
            }
        }
        if self.stopped {
            // The caller discards this score.
            return alpha;
        }
        if pv_node && ply > self.stats.sel_depth {
            self.stats.sel_depth = ply;
        }

        if let Some(score) = self.end_position() {
            return score;
        }

        // Mate pruning: when an ancestor already mates in fewer plies
        // this subtree always fails low.
        if MATE_SCORE - ply <= alpha {
            return KNOWN_WIN_SCORE;
        }

        // Check the transposition table. The hash move is kept for
        // ordering even when the bound is unusable.
        let entry = self.retrieve_hash();
        let hash = entry.mv;
        if entry.kind != HashKind::NoEntry && depth <= entry.depth as i32 {
            match entry.kind {
                HashKind::Exact => {
                    // Update the principal variation when possible.
                    if alpha < entry.score && entry.score < beta {
                        self.pv_table.put(&self.position, hash);
                    }
                    return entry.score;
                }
                HashKind::FailedLow if entry.score <= alpha => {
                    // The actual score is at most entry.score, so
                    // this node fails low, too.
                    return entry.score;
                }
                HashKind::FailedHigh if entry.score >= beta => {
                    // The actual score is at least entry.score, so
                    // this node fails high, too.
                    return entry.score;
                }
                _ => {}
            }
        }

        if depth <= 0 {
            // Depth can drop below zero because of aggressive
            // reductions.
            let score = self.search_quiescence(alpha, beta);
            self.update_hash(alpha, beta, depth, score, NULL_MOVE);
            return score;
        }

        let side_is_checked = self.position.is_checked(us);

        // Null move pruning: if passing still fails high the position
        // is too good, so the opponent will avoid it.
        if depth > NULL_MOVE_DEPTH_LIMIT
            && !side_is_checked // null move is illegal in check
            && self.position.has_non_pawns(us) // avoid zugzwang traps
            && KNOWN_LOSS_SCORE < alpha
            && beta < KNOWN_WIN_SCORE
        {
            let mut reduction = NULL_MOVE_DEPTH_REDUCTION;
            if self.position.num_non_pawns(us) >= 3 {
                // Reduce more with three or more minor/major pieces.
                reduction += 1;
            }

            self.position.do_move(NULL_MOVE);
            let score = self.try_move(beta - 1, beta, depth - reduction, 0, false);
            if score >= beta {
                return score;
            }
        }

        let mut best_move = NULL_MOVE;
        let mut best_score = -INFINITY_SCORE;

        // Futility and history pruning at frontier nodes.
        let mut static_score = 0;
        let mut allow_leaf_pruning = false;
        if depth <= FUTILITY_DEPTH_LIMIT
            && !side_is_checked
            && !pv_node
            && KNOWN_LOSS_SCORE < alpha
            && beta < KNOWN_WIN_SCORE // not searching for a mate
        {
            allow_leaf_pruning = true;
            static_score = self.score();
        }

        // Principal variation search: scout with a null window once a
        // good move is known.
        let mut null_window = false;
        // Late move reduction: best moves run at full depth, the rest
        // reduced.
        let allow_late_move = !side_is_checked && depth > LMR_DEPTH_LIMIT;

        // Mate cannot be declared unless all moves were tried.
        let mut dropped = false;
        let mut num_quiet = 0;
        let mut local_alpha = alpha;

        self.stack.generate_moves(&self.position, ALL, hash);
        loop {
            let m = self.stack.pop_move(&self.position);
            if m == NULL_MOVE {
                break;
            }

            let critical = m == hash || self.stack.is_killer(&self.position, m);
            if m.is_quiet() {
                num_quiet += 1;
            }

            let mut new_depth = depth;
            self.position.do_move(m);

            // Skip moves that leave the own king in check.
            if self.position.is_checked(us) {
                self.position.undo_move();
                continue;
            }
            // In Racing Kings skip moves that give check.
            if self.position.variant == Variant::RacingKings
                && self.position.is_checked_local(us.opposite())
            {
                self.position.undo_move();
                continue;
            }

            // Extend when the move gives check, unless the checker
            // hangs on its square anyway.
            let gives_check = self.position.is_checked(us.opposite());
            if gives_check {
                if self.position.get_attacker(m.to(), us.opposite()) == Figure::None
                    || self.position.get_attacker(m.to(), us) != Figure::None
                {
                    new_depth += CHECK_DEPTH_EXTENSION;
                }
            }

            // Late move reductions for quiet moves and bad captures.
            let mut lmr = 0;
            if allow_late_move && !gives_check && !critical {
                if m.is_quiet() {
                    // Reduce more at high depth and after many quiet
                    // moves: a long quiet tail rarely holds the cut
                    // move, and deep reductions are less risky.
                    lmr = 1 + depth.min(num_quiet) / 5;
                } else if see_sign(&self.position, m) {
                    // Losing captures can be reduced, too.
                    lmr = 1;
                }
            }

            // Prune moves close to the frontier.
            if allow_leaf_pruning && !gives_check && !critical {
                // Quiet moves which performed badly before.
                let (bad, good) = self.history.get(m);
                if bad > 16 * good && (m.is_quiet() || see_sign(&self.position, m)) {
                    dropped = true;
                    self.position.undo_move();
                    continue;
                }
                // Moves that cannot raise alpha.
                if is_futile(
                    &self.position,
                    static_score,
                    local_alpha,
                    depth * FUTILITY_MARGIN,
                    m,
                ) {
                    best_score = best_score.max(static_score);
                    dropped = true;
                    self.position.undo_move();
                    continue;
                }
            }

            let score = self.try_move(local_alpha, beta, new_depth, lmr, null_window);

            if allow_leaf_pruning && !gives_check {
                self.history.inc(m, score > alpha);
            }
            if score >= beta {
                // Fail high, cut node.
                self.stack.save_killer(&self.position, m);
                self.update_hash(alpha, beta, depth, score, m);
                return score;
            }
            if score > best_score {
                null_window = true;
                best_move = m;
                best_score = score;
                local_alpha = local_alpha.max(score);
            }
        }

        if !dropped {
            // No move at all means the game is over here.
            if best_move == NULL_MOVE {
                if side_is_checked {
                    best_score = MATED_SCORE + ply;
                } else {
                    best_score = 0;
                }
            }
            self.update_hash(alpha, beta, depth, best_score, best_move);
            if alpha < best_score && best_score < beta {
                self.pv_table.put(&self.position, best_move);
            }
        }

        best_score
    }

    // One iteration of the iterative deepening search, with gradually
    // widening aspiration windows around the previous score.
    fn search(&mut self, depth: i32, estimated: i32) -> i32 {
        let gamma = estimated;
        let mut delta = INITIAL_ASPIRATION_WINDOW;
        let mut alpha = (gamma - delta).max(-INFINITY_SCORE);
        let mut beta = (gamma + delta).min(INFINITY_SCORE);
        let mut score = estimated;

        if depth < 4 {
            // An aspiration window at very low depth wastes more time
            // re-searching than it saves.
            alpha = -INFINITY_SCORE;
            beta = INFINITY_SCORE;
        }

        while !self.stopped {
            // At root a non-null move is required, so null-move
            // pruning is not used here.
            score = self.search_tree(alpha, beta, depth);
            if score <= alpha {
                alpha = (alpha - delta).max(-INFINITY_SCORE);
                delta += delta / 2;
            } else if score >= beta {
                beta = (beta + delta).min(INFINITY_SCORE);
                delta += delta / 2;
            } else {
                return score;
            }
        }

        score
    }

    /// Searches the current position.
    ///
    /// Returns the principal variation: moves[0] is the best move
    /// found, moves[1] the pondering move. The pv is empty when the
    /// game has already finished. The time control must be started.
    pub fn play(&mut self, tc: Arc<TimeControl>) -> Vec<Move> {
        self.log.begin_search();
        self.stats = Stats {
            depth: -1,
            ..Stats::default()
        };

        self.root_ply = self.position.ply;
        self.time_control = Some(tc.clone());
        self.stopped = false;
        self.checkpoint = CHECKPOINT_STEP;
        self.stack.reset();

        let mut moves = Vec::new();
        let mut score = 0;
        for depth in 0..64 {
            if !tc.next_depth(depth) {
                // The clock says stop; at least one depth has been
                // searched so a move can be returned.
                break;
            }

            self.stats.depth = depth;
            score = self.search(depth, score);

            if !self.stopped {
                // Only a completed iteration yields a usable pv.
                moves = self.pv_table.get(&mut self.position);
                self.log.print_pv(&self.stats, score, &moves);
            }
        }

        self.log.end_search();
        moves
    }
}
