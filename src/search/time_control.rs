//! The search clock: splits the remaining time over the expected
//! number of moves and exposes a soft deadline (do not start another
//! iteration) and a hard deadline (abort the current one).

use crate::bitboard::BitboardExt;
use crate::board::{Color, Position};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, Instant};

// Default number of moves the remaining time is planned over.
const DEFAULT_MOVES_TO_GO: i32 = 30;
const INFINITE: Duration = Duration::from_secs(1_000_000_000);
// Reserve for I/O and GUI latency.
const OVERHEAD: Duration = Duration::from_millis(20);

struct Deadlines {
    search_time: Duration,
    // Do not go to the next depth after this moment.
    search_deadline: Instant,
    // Abort the search after this moment.
    stop_deadline: Instant,
}

/// Time control that splits the remaining time over moves_to_go.
///
/// Configure the public fields, call start, then share it with the
/// search. stop and ponder_hit may be called from another thread.
pub struct TimeControl {
    pub wtime: Duration,
    pub winc: Duration,
    pub btime: Duration,
    pub binc: Duration,
    /// Maximum search depth, inclusive.
    pub depth: i32,
    /// Number of remaining moves to plan for.
    pub moves_to_go: i32,

    side_to_move: Color,
    time: Duration, // our time and increment
    inc: Duration,
    limit: Duration,

    predicted: bool, // this position was predicted by pondering
    branch: u32,     // branching factor estimate

    curr_depth: AtomicI32,
    stopped: AtomicBool,
    ponderhit: AtomicBool,

    deadlines: Mutex<Deadlines>,
}

impl TimeControl {
    /// A new time control with no time or depth limit. Branching is
    /// estimated from the piece count: with fewer pieces there is
    /// less mobility and the hash table kicks in more often.
    pub fn new(pos: &Position, predicted: bool) -> TimeControl {
        let mut branch = 2;
        let mut np = pos.all().count();
        while np > 0 {
            branch += 1;
            np /= 6;
        }

        let now = Instant::now();
        TimeControl {
            wtime: INFINITE,
            winc: Duration::ZERO,
            btime: INFINITE,
            binc: Duration::ZERO,
            depth: 64,
            moves_to_go: DEFAULT_MOVES_TO_GO,
            side_to_move: pos.side_to_move,
            time: Duration::ZERO,
            inc: Duration::ZERO,
            limit: Duration::ZERO,
            predicted,
            branch,
            curr_depth: AtomicI32::new(0),
            stopped: AtomicBool::new(false),
            ponderhit: AtomicBool::new(false),
            deadlines: Mutex::new(Deadlines {
                search_time: Duration::ZERO,
                search_deadline: now,
                stop_deadline: now,
            }),
        }
    }

    /// A time control limiting only the search depth.
    pub fn fixed_depth(pos: &Position, depth: i32) -> TimeControl {
        let mut tc = TimeControl::new(pos, false);
        tc.depth = depth;
        tc.moves_to_go = 1;
        tc
    }

    /// A time control spending the whole deadline on a single move.
    pub fn fixed_deadline(pos: &Position, deadline: Duration) -> TimeControl {
        let mut tc = TimeControl::new(pos, false);
        tc.wtime = deadline;
        tc.btime = deadline;
        tc.moves_to_go = 1;
        tc
    }

    // How much to think this round: the remaining time plus expected
    // increments, split over the remaining moves. The engine leans on
    // the clock early and on the increment later.
    fn thinking_time(&self) -> Duration {
        let mtg = self.moves_to_go.max(1) as u32;
        let mut tt = (self.time + self.inc * (mtg - 1)) / mtg;
        if self.predicted {
            tt = tt * 4 / 3;
        }
        tt.min(self.limit)
    }

    /// Starts the timer. Should be called as soon as possible after
    /// the go command to keep the measured time accurate.
    pub fn start(&mut self, ponder: bool) {
        if self.side_to_move == Color::White {
            self.time = self.wtime;
            self.inc = self.winc;
        } else {
            self.time = self.btime;
            self.inc = self.binc;
        }

        // The last moment the search must stop at.
        self.limit = if self.time > OVERHEAD * 2 {
            self.time - OVERHEAD
        } else if self.time > OVERHEAD {
            OVERHEAD
        } else {
            self.time
        };

        // Branch a bit more when only a few moves are left, to stay
        // on the safe side of the clock.
        let mut i = 4;
        while i > 0 {
            if self.moves_to_go <= i {
                self.branch += 1;
            }
            i /= 2;
        }

        self.stopped.store(false, Ordering::Relaxed);
        self.ponderhit.store(!ponder, Ordering::Relaxed);

        let search_time = self.thinking_time();
        self.update_deadlines(search_time);
    }

    fn update_deadlines(&self, search_time: Duration) {
        let now = Instant::now();
        let mut d = self.deadlines.lock().unwrap();
        d.search_time = search_time;
        d.search_deadline = now + search_time / self.branch;

        // The hard deadline has a large margin so the search is not
        // aborted mid-iteration too often.
        let deadline = (search_time * 4).min(self.limit);
        d.stop_deadline = now + deadline;
    }

    /// True if the search may start another iteration at depth.
    pub fn next_depth(&self, depth: i32) -> bool {
        self.curr_depth.store(depth, Ordering::Relaxed);
        let deadline = self.deadlines.lock().unwrap().search_deadline;
        depth <= self.depth && !self.has_stopped(deadline)
    }

    /// Switches from pondering to our own clock.
    pub fn ponder_hit(&self) {
        let search_time = self.deadlines.lock().unwrap().search_time;
        self.update_deadlines(search_time);
        self.ponderhit.store(true, Ordering::Relaxed);
    }

    /// Marks the search as stopped.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    fn has_stopped(&self, deadline: Instant) -> bool {
        if self.curr_depth.load(Ordering::Relaxed) <= 2 {
            // Run a few depths at least, otherwise mates in one can
            // be missed.
            return false;
        }
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        // Deadlines are ignored while pondering.
        self.ponderhit.load(Ordering::Relaxed) && Instant::now() > deadline
    }

    /// True if the search has stopped because stop was called or the
    /// time ran out. Checked by the search at node checkpoints.
    pub fn stopped(&self) -> bool {
        let deadline = self.deadlines.lock().unwrap().stop_deadline;
        if !self.has_stopped(deadline) {
            return false;
        }
        self.stopped.store(true, Ordering::Relaxed);
        true
    }
}
