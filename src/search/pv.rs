//! A separate table preserving the principal variation.
//!
//! During alpha-beta, PV nodes (exact scores) are quickly overwritten
//! in the main transposition table by bound entries, so the PV is kept
//! in its own small table, as suggested by Robert Hyatt.

use crate::board::Position;
use crate::moves::types::{Move, NULL_MOVE};
use std::collections::HashSet;

const PV_TABLE_SIZE: usize = 1 << 13;
const PV_TABLE_MASK: usize = PV_TABLE_SIZE - 1;

#[derive(Clone, Copy)]
struct PvEntry {
    // The position's full Zobrist key, to handle conflicts.
    lock: u64,
    // When the move was added; older entries are replaced first.
    birth: u32,
    mv: Move,
}

pub struct PvTable {
    table: Vec<PvEntry>,
    timer: u32,
}

impl PvTable {
    pub fn new() -> PvTable {
        PvTable {
            table: vec![
                PvEntry {
                    lock: 0,
                    birth: 0,
                    mv: NULL_MOVE,
                };
                PV_TABLE_SIZE
            ],
            timer: 0,
        }
    }

    /// Inserts a new entry. Ignores null moves.
    ///
    /// Two slots derived from disjoint halves of the Zobrist key are
    /// probed. A slot already holding this position is reused,
    /// otherwise the older of the two is replaced.
    pub fn put(&mut self, pos: &Position, mv: Move) {
        if mv == NULL_MOVE {
            return;
        }

        let zobrist = pos.zobrist();
        let key1 = zobrist as u32 as usize & PV_TABLE_MASK;
        let key2 = (zobrist >> 32) as u32 as usize & PV_TABLE_MASK;

        let index = if self.table[key1].lock == zobrist {
            key1
        } else if self.table[key2].lock == zobrist {
            key2
        } else if self.table[key1].birth <= self.table[key2].birth {
            key1
        } else {
            key2
        };

        self.timer += 1;
        self.table[index] = PvEntry {
            lock: zobrist,
            birth: self.timer,
            mv,
        };
    }

    fn get_move(&self, pos: &Position) -> Move {
        let zobrist = pos.zobrist();
        let key1 = zobrist as u32 as usize & PV_TABLE_MASK;
        let key2 = (zobrist >> 32) as u32 as usize & PV_TABLE_MASK;

        if self.table[key1].lock == zobrist {
            self.table[key1].mv
        } else if self.table[key2].lock == zobrist {
            self.table[key2].mv
        } else {
            NULL_MOVE
        }
    }

    /// Walks the principal variation from pos, playing each stored
    /// move on the position. A seen-set guards against cycles. The
    /// position is restored before returning.
    pub fn get(&self, pos: &mut Position) -> Vec<Move> {
        let mut seen = HashSet::new();
        let mut moves = Vec::new();

        let mut next = self.get_move(pos);
        while next != NULL_MOVE && !seen.contains(&pos.zobrist()) {
            seen.insert(pos.zobrist());
            moves.push(next);
            pos.do_move(next);
            next = self.get_move(pos);
        }

        for _ in 0..moves.len() {
            pos.undo_move();
        }
        moves
    }
}

impl Default for PvTable {
    fn default() -> PvTable {
        PvTable::new()
    }
}
