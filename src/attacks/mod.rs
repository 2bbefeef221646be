//! Attack tables for all pieces. Sliding pieces use magic bitboards;
//! a short description by Pradyumna Kannan:
//! http://www.pradu.us/old/Nov27_2008/Buzz/research/magic/Bitboards.pdf

use crate::bitboard::{self, Bitboard, BitboardExt};
use crate::square::Square;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

const ROOK_DELTAS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const BISHOP_DELTAS: [(i32, i32); 4] = [(-1, 1), (1, 1), (1, -1), (-1, -1)];

// Rook magics are expensive to find, so known good multipliers are
// burned in, one (magic, table bits) pair per square.
#[rustfmt::skip]
const ROOK_MAGICS: [(u64, u32); 64] = [
    (36028952711532673, 12),    (14411536674683101313, 11), (576496005395513857, 11),
    (4604372721729, 11),        (36031546200687617, 11),    (36033197213089793, 11),
    (3848292811265, 11),        (4539788820801, 12),
    (5066692388487169, 11),     (360288245069774977, 10),   (2355383154875302401, 10),
    (9304436898871644161, 10),  (144115499663886337, 10),   (108086941350626369, 10),
    (9441796687501985793, 10),  (2359886214407946241, 11),
    (4631389266822304769, 11),  (9304436831221219585, 10),  (9263904435128516865, 10),
    (596726951168704769, 10),   (288388705826635841, 10),   (1298162592589676609, 10),
    (668793341028205569, 10),   (27041389040664577, 11),
    (10450310413697025, 11),    (90107726679507201, 10),    (9223653580555165697, 10),
    (5190691178076966913, 10),  (74380329532524545, 10),    (9269586743957521409, 10),
    (3503805114303512577, 10),  (159429253169153, 11),
    (140737496752193, 11),      (23081233739161857, 10),    (216208542045048897, 10),
    (4655469687738433, 10),     (4910190248417298433, 10),  (140754676613633, 10),
    (1441856117960359937, 10),  (4613955963706147841, 11),
    (4755801345016995841, 11),  (17610976739329, 10),       (2667820173397917761, 10),
    (5764660368316567553, 10),  (2251851487527425, 10),     (8859435012, 10),
    (648529410319974401, 10),   (4611686019534716929, 11),
    (2310346608845258881, 11),  (9007201406419201, 10),     (360428707682197761, 10),
    (2452350872031592705, 10),  (7881299415531649, 10),     (105622918137857, 10),
    (13979322776982393857, 10), (27025995845339137, 11),
    (1153273486052196353, 12),  (846729215754241, 11),      (4611695089401765889, 11),
    (1153211792858550273, 11),  (54342271281408001, 11),    (93452063091195905, 11),
    (13835060872780858369, 11), (633464726504577, 12),
];

/// Ray attack from sq along deltas, stopping at the first blocker in
/// occupancy (the blocker square is included).
pub fn sliding_attack(sq: Square, deltas: &[(i32, i32)], occupancy: Bitboard) -> Bitboard {
    let mut bb = 0;
    for &(dr, df) in deltas {
        let (mut r, mut f) = (sq.rank(), sq.file());
        loop {
            r += dr;
            f += df;
            if !(0..8).contains(&r) || !(0..8).contains(&f) {
                break;
            }
            let sq0 = Square::rank_file(r, f);
            bb |= sq0.bitboard();
            if occupancy & sq0.bitboard() != 0 {
                break;
            }
        }
    }
    bb
}

// Folds the 64-bit product into 32 bits before shifting; shift is
// 32 - log2(table size).
#[inline(always)]
fn spell(magic: u64, shift: u32, bb: Bitboard) -> usize {
    let mul = magic.wrapping_mul(bb);
    ((((mul >> 32) as u32) ^ (mul as u32)) >> shift) as usize
}

/// One square's magic attack table.
pub struct MagicInfo {
    store: Vec<Bitboard>,
    mask: Bitboard,
    magic: u64,
    shift: u32,
}

impl MagicInfo {
    #[inline(always)]
    fn attack(&self, occ: Bitboard) -> Bitboard {
        self.store[spell(self.magic, self.shift, occ & self.mask)]
    }
}

// Searches multipliers that perfectly hash every relevant occupancy of
// a square into an attack table.
struct Wizard {
    deltas: &'static [(i32, i32)],
    min_shift: u32, // which table sizes to search
    max_shift: u32,
    max_num_entries: u32, // total size budget over all squares
    rng: StdRng,

    magics: [u64; 64],
    shifts: [u32; 64],

    store: Vec<Bitboard>, // scratch table for collision checks
    subsets: Vec<Bitboard>,
    attacks: Vec<Bitboard>,
}

impl Wizard {
    fn new(
        deltas: &'static [(i32, i32)],
        min_shift: u32,
        max_shift: u32,
        max_num_entries: u32,
    ) -> Wizard {
        Wizard {
            deltas,
            min_shift,
            max_shift,
            max_num_entries,
            // Fixed seed keeps the searched magics reproducible.
            rng: StdRng::seed_from_u64(1),
            magics: [0; 64],
            shifts: [0; 64],
            store: Vec::new(),
            subsets: Vec::new(),
            attacks: Vec::new(),
        }
    }

    // A sparse random multiplier. ANDing three randoms keeps the
    // population count low, which makes a perfect hash more likely.
    fn rand_magic(&mut self) -> u64 {
        let r = self.rng.next_u64() & self.rng.next_u64() & self.rng.next_u64();
        (r << 6) + 1
    }

    // The relevant blocker squares: the attack set on an empty board
    // minus the ray borders.
    fn mask(&self, sq: Square) -> Bitboard {
        let mut border = (bitboard::BB_RANK_1 | bitboard::BB_RANK_8) & !bitboard::rank_bb(sq.rank());
        border |= (bitboard::BB_FILE_A | bitboard::BB_FILE_H) & !bitboard::file_bb(sq.file());
        !border & sliding_attack(sq, self.deltas, bitboard::BB_EMPTY)
    }

    // Enumerates all subsets of the mask with the Carry-Rippler trick
    // and records each subset's true attack board.
    fn prepare(&mut self, sq: Square) {
        self.subsets.clear();
        self.attacks.clear();

        let mask = self.mask(sq);
        let mut subset: Bitboard = 0;
        loop {
            self.subsets.push(subset);
            self.attacks
                .push(sliding_attack(sq, self.deltas, subset));
            subset = subset.wrapping_sub(mask) & mask;
            if subset == 0 {
                break;
            }
        }
    }

    fn try_magic_number(&mut self, mi: &mut MagicInfo, sq: Square, magic: u64, shift: u32) -> bool {
        let size = 1usize << shift;
        if self.store.len() < size {
            self.store.resize(size, 0);
        }
        for slot in &mut self.store[..size] {
            *slot = 0;
        }

        // Verify the magic gives a perfect hash over all subsets.
        for (i, &bb) in self.subsets.iter().enumerate() {
            let index = spell(magic, 32 - shift, bb);
            if self.store[index] != 0 && self.store[index] != self.attacks[i] {
                return false;
            }
            self.store[index] = self.attacks[i];
        }

        self.magics[sq.index()] = magic;
        self.shifts[sq.index()] = shift;

        mi.store = self.store[..size].to_vec();
        mi.mask = self.mask(sq);
        mi.magic = magic;
        mi.shift = 32 - shift;
        true
    }

    fn search_magic(&mut self, sq: Square, mi: &mut MagicInfo) {
        if self.shifts[sq.index()] != 0 && self.shifts[sq.index()] <= self.min_shift {
            return;
        }

        self.prepare(sq);
        let mask = self.mask(sq);
        let mut i = 0;
        while i < 100 || self.shifts[sq.index()] == 0 {
            // Aim for a smaller table than the current best.
            let shift = if self.shifts[sq.index()] == 0 {
                self.max_shift
            } else {
                self.shifts[sq.index()] - 1
            };

            let mut magic = 0u64;
            while (mask.wrapping_mul(magic)).count_ones() < 6 {
                magic = self.rand_magic();
            }
            self.try_magic_number(mi, sq, magic, shift);
            i += 1;
        }
    }

    fn search_magics(&mut self, mi: &mut [MagicInfo; 64]) {
        let mut num_entries = u32::MAX;
        while num_entries > self.max_num_entries {
            num_entries = 0;
            for sq in 0..64u8 {
                let sq = Square::from_index(sq);
                self.search_magic(sq, &mut mi[sq.index()]);
                num_entries += 1 << self.shifts[sq.index()];
            }
        }
    }

    fn set_magic(&mut self, mi: &mut [MagicInfo; 64], sq: Square, magic: u64, shift: u32) {
        self.prepare(sq);
        if !self.try_magic_number(&mut mi[sq.index()], sq, magic, shift) {
            panic!("invalid magic: sq={sq} magic={magic} shift={shift}");
        }
    }
}

fn init_jump_attacks(jumps: &[(i32, i32)]) -> [Bitboard; 64] {
    let mut attacks = [0; 64];
    for r in 0..8 {
        for f in 0..8 {
            let mut bb = 0;
            for &(dr, df) in jumps {
                let (r0, f0) = (r + dr, f + df);
                if (0..8).contains(&r0) && (0..8).contains(&f0) {
                    bb |= Square::rank_file(r0, f0).bitboard();
                }
            }
            attacks[Square::rank_file(r, f).index()] = bb;
        }
    }
    attacks
}

fn empty_magics() -> [MagicInfo; 64] {
    std::array::from_fn(|_| MagicInfo {
        store: Vec::new(),
        mask: 0,
        magic: 0,
        shift: 0,
    })
}

struct AttackTables {
    pawn: [Bitboard; 64],
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    // Rook-or-bishop rays on an empty board, a cheap geometric reject.
    super_attack: [Bitboard; 64],
    rook_magic: [MagicInfo; 64],
    bishop_magic: [MagicInfo; 64],
}

static TABLES: Lazy<AttackTables> = Lazy::new(|| {
    let pawn = init_jump_attacks(&[(-1, -1), (-1, 1), (1, 1), (1, -1)]);
    let knight = init_jump_attacks(&[
        (-2, -1),
        (-2, 1),
        (2, -1),
        (2, 1),
        (-1, -2),
        (-1, 2),
        (1, -2),
        (1, 2),
    ]);
    let king = init_jump_attacks(&[
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
    ]);

    let mut super_attack = [0; 64];
    for (i, slot) in super_attack.iter_mut().enumerate() {
        let sq = Square::from_index(i as u8);
        *slot = sliding_attack(sq, &ROOK_DELTAS, bitboard::BB_EMPTY)
            | sliding_attack(sq, &BISHOP_DELTAS, bitboard::BB_EMPTY);
    }

    let mut rook_magic = empty_magics();
    let mut wiz = Wizard::new(&ROOK_DELTAS, 10, 13, 130000);
    for (i, &(magic, shift)) in ROOK_MAGICS.iter().enumerate() {
        wiz.set_magic(&mut rook_magic, Square::from_index(i as u8), magic, shift);
    }

    // Bishop magics, unlike rook magics, are easy to find at startup.
    let mut bishop_magic = empty_magics();
    let mut wiz = Wizard::new(&BISHOP_DELTAS, 5, 9, 6000);
    wiz.search_magics(&mut bishop_magic);

    AttackTables {
        pawn,
        knight,
        king,
        super_attack,
        rook_magic,
        bishop_magic,
    }
});

/// Squares from which a pawn of either color would attack sq.
#[inline(always)]
pub fn pawn_attack(sq: Square) -> Bitboard {
    TABLES.pawn[sq.index()]
}

/// All squares a knight reaches from sq.
#[inline(always)]
pub fn knight_mobility(sq: Square) -> Bitboard {
    TABLES.knight[sq.index()]
}

/// All squares a king reaches from sq. Castling not included.
#[inline(always)]
pub fn king_mobility(sq: Square) -> Bitboard {
    TABLES.king[sq.index()]
}

/// Queen rays from sq on an empty board.
#[inline(always)]
pub fn super_attack(sq: Square) -> Bitboard {
    TABLES.super_attack[sq.index()]
}

/// The squares a bishop reaches from sq given all pieces.
#[inline(always)]
pub fn bishop_mobility(sq: Square, all: Bitboard) -> Bitboard {
    TABLES.bishop_magic[sq.index()].attack(all)
}

/// The squares a rook reaches from sq given all pieces.
#[inline(always)]
pub fn rook_mobility(sq: Square, all: Bitboard) -> Bitboard {
    TABLES.rook_magic[sq.index()].attack(all)
}

/// The squares a queen reaches from sq given all pieces.
#[inline(always)]
pub fn queen_mobility(sq: Square, all: Bitboard) -> Bitboard {
    rook_mobility(sq, all) | bishop_mobility(sq, all)
}
