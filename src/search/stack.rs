//! Staged move generation and ordering.
//!
//! Moves are produced in several phases so that generation and
//! sorting can often be skipped entirely: the hash move first, then
//! violent moves by MVV/LVA, then killers, then everything else.

use crate::board::Position;
use crate::moves::types::{ALL, Move, NULL_MOVE, QUIET, TACTICAL, VIOLENT};

// Generation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MsState {
    Hash,          // return the hash move
    GenViolent,    // generate violent moves
    ReturnViolent, // return violent moves in order
    GenKiller,     // generate killer moves
    ReturnKiller,  // return killer moves in order
    GenRest,       // generate the remaining moves
    ReturnRest,    // return the remaining moves in order
    Done,          // all moves returned
}

// MVV/LVA bonuses with one pawn = 10.
const MVVLVA_BONUS: [i16; 7] = [0, 10, 40, 45, 68, 145, 256];

/// Most Valuable Victim / Least Valuable Aggressor ordering score.
pub fn mvvlva(m: Move) -> i16 {
    let a = m.target().figure() as usize;
    let v = m.capture().figure() as usize;
    MVVLVA_BONUS[v] * 64 - MVVLVA_BONUS[a]
}

// Per-ply pending moves.
struct MoveStack {
    moves: Vec<Move>, // pending moves
    order: Vec<i16>,  // pending moves' weights
    kind: u8,         // which kinds to generate
    state: MsState,
    hash: Move,        // hash move
    killer: [Move; 4], // killer moves, newest first
}

impl MoveStack {
    fn new() -> MoveStack {
        MoveStack {
            moves: Vec::with_capacity(4),
            order: Vec::with_capacity(4),
            kind: ALL,
            state: MsState::Done,
            hash: NULL_MOVE,
            killer: [NULL_MOVE; 4],
        }
    }
}

/// A stack of move generators, one per ply. Killers persist across
/// sibling nodes at the same ply.
pub struct Stack {
    moves: Vec<MoveStack>,
}

impl Stack {
    pub fn new() -> Stack {
        Stack { moves: Vec::new() }
    }

    /// Clears the stack for a new search from pos.
    pub fn reset(&mut self) {
        self.moves.clear();
    }

    // The move stack for the current ply, growing the stack on demand.
    fn get(&mut self, ply: usize) -> &mut MoveStack {
        while self.moves.len() <= ply {
            self.moves.push(MoveStack::new());
        }
        &mut self.moves[ply]
    }

    /// Starts a new generation round at the position's ply for moves
    /// of kind, with hash tried first.
    pub fn generate_moves(&mut self, pos: &Position, kind: u8, hash: Move) {
        let ms = self.get(pos.ply);
        ms.moves.clear(); // keep the backing memory
        ms.order.clear();
        ms.kind = kind;
        ms.state = MsState::Hash;
        ms.hash = hash;
        // killers are kept
    }

    // Generates the moves of kind into the pending array with their
    // MVV/LVA weights.
    fn generate(&mut self, pos: &Position, kind: u8) {
        let ms = &mut self.moves[pos.ply];
        debug_assert!(ms.moves.is_empty() && ms.order.is_empty());
        if ms.kind & kind == 0 {
            return;
        }
        pos.generate_moves(ms.kind & kind, &mut ms.moves);
        for &m in &ms.moves {
            ms.order.push(mvvlva(m));
        }
    }

    // Moves the best pending move to the back.
    fn move_best(&mut self, ply: usize) {
        let ms = &mut self.moves[ply];
        if ms.moves.is_empty() {
            return;
        }

        let mut bi = 0;
        for i in 0..ms.moves.len() {
            if ms.order[i] > ms.order[bi] {
                bi = i;
            }
        }

        let last = ms.moves.len() - 1;
        ms.moves.swap(bi, last);
        ms.order.swap(bi, last);
    }

    // Pops the pending move from the back.
    fn pop_front(&mut self, ply: usize) -> Move {
        let ms = &mut self.moves[ply];
        match ms.moves.pop() {
            Some(m) => {
                ms.order.pop();
                m
            }
            None => NULL_MOVE,
        }
    }

    /// Pops the next move, or NULL_MOVE when exhausted.
    ///
    /// Order: the hash move, the violent moves by decreasing MVV/LVA,
    /// the killers, then tactical and quiet moves in generation order.
    pub fn pop_move(&mut self, pos: &Position) -> Move {
        let ply = pos.ply;
        loop {
            match self.moves[ply].state {
                MsState::Hash => {
                    // Return the hash move directly, without
                    // generating anything.
                    self.moves[ply].state = MsState::GenViolent;
                    let hash = self.moves[ply].hash;
                    if pos.is_pseudo_legal(hash) {
                        return hash;
                    }
                }

                MsState::GenViolent => {
                    self.moves[ply].state = MsState::ReturnViolent;
                    self.generate(pos, VIOLENT);
                }

                MsState::ReturnViolent => {
                    // Selection-pop instead of a full sort: captures
                    // fail high often enough that sorting everything
                    // is wasted work.
                    self.move_best(ply);
                    let m = self.pop_front(ply);
                    if m == NULL_MOVE {
                        if self.moves[ply].kind & (TACTICAL | QUIET) == 0 {
                            // No other moves were requested, e.g. in
                            // quiescence search.
                            self.moves[ply].state = MsState::Done;
                        } else {
                            self.moves[ply].state = MsState::GenKiller;
                        }
                    } else if m != self.moves[ply].hash {
                        return m;
                    }
                }

                MsState::GenKiller => {
                    // Not every killer is valid in this position; they
                    // are screened when returned.
                    self.moves[ply].state = MsState::ReturnKiller;
                    for i in (0..4).rev() {
                        let m = self.moves[ply].killer[i];
                        if m != NULL_MOVE {
                            self.moves[ply].moves.push(m);
                            self.moves[ply].order.push(-(i as i16));
                        }
                    }
                }

                MsState::ReturnKiller => {
                    let m = self.pop_front(ply);
                    if m == NULL_MOVE {
                        self.moves[ply].state = MsState::GenRest;
                    } else if m != self.moves[ply].hash && pos.is_pseudo_legal(m) {
                        return m;
                    }
                }

                MsState::GenRest => {
                    self.moves[ply].state = MsState::ReturnRest;
                    self.generate(pos, TACTICAL | QUIET);
                }

                MsState::ReturnRest => {
                    let m = self.pop_front(ply);
                    if m == NULL_MOVE {
                        self.moves[ply].state = MsState::Done;
                    } else if m != self.moves[ply].hash && !self.is_killer(pos, m) {
                        return m;
                    }
                }

                MsState::Done => {
                    // Just in case another move is requested.
                    return NULL_MOVE;
                }
            }
        }
    }

    /// True if m is a killer move at the position's ply.
    pub fn is_killer(&self, pos: &Position, m: Move) -> bool {
        let k = &self.moves[pos.ply].killer;
        m == k[0] || m == k[1] || m == k[2] || m == k[3]
    }

    /// Records a beta-cutoff move as a killer, promoting it to the
    /// front with an LRU shift among the four slots. Violent moves
    /// are not killers.
    pub fn save_killer(&mut self, pos: &Position, m: Move) {
        let ms = self.get(pos.ply);
        if !m.is_violent() {
            let k = &mut ms.killer;
            if m == k[0] {
                // already first
            } else if m == k[1] {
                k.swap(0, 1);
            } else if m == k[2] {
                k[2] = k[1];
                k[1] = k[0];
                k[0] = m;
            } else {
                k[3] = k[2];
                k[2] = k[1];
                k[1] = k[0];
                k[0] = m;
            }
        }
    }
}

impl Default for Stack {
    fn default() -> Stack {
        Stack::new()
    }
}
