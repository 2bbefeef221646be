//! The UCI protocol driver, a line-oriented REPL over stdin/stdout.
//! http://wbec-ridderkerk.nl/html/UCIProtocol.html

use crate::board::{Position, Variant};
use crate::eval::{KNOWN_LOSS_SCORE, KNOWN_WIN_SCORE, MATE_SCORE, MATED_SCORE};
use crate::moves::types::Move;
use crate::search::time_control::TimeControl;
use crate::search::tt::DEFAULT_HASH_TABLE_SIZE_MB;
use crate::search::{Engine, Logger, Options, Stats};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Why a command was not executed.
#[derive(Debug)]
pub enum UciError {
    /// The quit command was received.
    Quit,
    /// The command was rejected; the message is reported to the GUI.
    Message(String),
}

impl<E: std::fmt::Display> From<E> for UciError {
    fn from(e: E) -> UciError {
        UciError::Message(e.to_string())
    }
}

/// Writes search progress as UCI info lines. Output is buffered and
/// flushed at least once per second so fast iterations do not thrash
/// stdout.
pub struct UciLogger {
    start: Instant,
    buf: String,
}

impl UciLogger {
    pub fn new() -> UciLogger {
        UciLogger {
            start: Instant::now(),
            buf: String::new(),
        }
    }

    pub fn begin_search(&mut self) {
        self.start = Instant::now();
        self.buf.clear();
    }

    pub fn end_search(&mut self) {
        self.flush();
    }

    pub fn print_pv(&mut self, stats: &Stats, score: i32, pv: &[Move]) {
        use std::fmt::Write;

        let now = Instant::now();
        let _ = write!(
            self.buf,
            "info depth {} seldepth {} ",
            stats.depth, stats.sel_depth
        );

        if score > KNOWN_WIN_SCORE {
            let _ = write!(self.buf, "score mate {} ", (MATE_SCORE - score + 1) / 2);
        } else if score < KNOWN_LOSS_SCORE {
            let _ = write!(self.buf, "score mate {} ", (MATED_SCORE - score) / 2);
        } else {
            let _ = write!(self.buf, "score cp {} ", score);
        }

        let elapsed = (now - self.start).max(Duration::from_micros(1));
        let nps = stats.nodes as u128 * 1_000_000_000 / elapsed.as_nanos();
        let _ = write!(
            self.buf,
            "nodes {} time {} nps {} ",
            stats.nodes,
            elapsed.as_millis(),
            nps
        );

        let _ = write!(self.buf, "pv");
        for m in pv {
            let _ = write!(self.buf, " {}", m.uci());
        }
        self.buf.push('\n');

        if now > self.start + Duration::from_secs(1) {
            self.flush();
        }
    }

    fn flush(&mut self) {
        print!("{}", self.buf);
        let _ = std::io::stdout().flush();
        self.buf.clear();
    }
}

impl Default for UciLogger {
    fn default() -> UciLogger {
        UciLogger::new()
    }
}

// While true, the search thread holds back its bestmove line; the
// flag is cleared by stop or ponderhit.
type PonderGate = Arc<(Mutex<bool>, Condvar)>;

/// The UCI driver. Holds the engine behind a mutex which doubles as
/// the readiness barrier: commands that need a quiesced search simply
/// take the lock.
pub struct Uci {
    engine: Arc<Mutex<Engine>>,
    time_control: Option<Arc<TimeControl>>,
    ponder: PonderGate,
    // Zobrist key of the position predicted two plies ahead; used to
    // give the search more time when the prediction hit.
    predicted: Arc<AtomicU64>,
}

impl Uci {
    pub fn new(variant: Variant) -> Uci {
        let mut engine = Engine::new(None, Logger::Uci(UciLogger::new()), Options::default());
        engine.set_variant(variant);
        Uci {
            engine: Arc::new(Mutex::new(engine)),
            time_control: None,
            ponder: Arc::new((Mutex::new(false), Condvar::new())),
            predicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Executes one command line.
    pub fn execute(&mut self, line: &str) -> Result<(), UciError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let mut tokens = line.split_whitespace();
        let cmd = tokens.next().unwrap();
        let args: Vec<&str> = tokens.collect();

        // These commands do not expect the engine to be ready.
        match cmd {
            "isready" => return self.isready(),
            "quit" => return Err(UciError::Quit),
            "stop" => return self.stop(),
            "uci" => return self.uci(),
            "ponderhit" => return self.ponderhit(),
            _ => {}
        }

        // The remaining commands need a quiesced search.
        match cmd {
            "ucinewgame" => self.ucinewgame(),
            "position" => self.position(&args),
            "go" => self.go(&args),
            "setoption" => self.setoption(line),
            "d" | "display" => {
                // Debug helper: dump the board to the log.
                self.engine.lock().unwrap().position.log_board();
                Ok(())
            }
            _ => Err(UciError::Message(format!("unhandled command {cmd}"))),
        }
    }

    fn uci(&self) -> Result<(), UciError> {
        println!("id name stretto {}", env!("CARGO_PKG_VERSION"));
        println!("id author the stretto authors");
        println!();
        println!("option name UCI_AnalyseMode type check default false");
        println!(
            "option name Hash type spin default {} min 1 max 65536",
            DEFAULT_HASH_TABLE_SIZE_MB
        );
        println!("option name Ponder type check default true");
        println!("uciok");
        Ok(())
    }

    fn isready(&self) -> Result<(), UciError> {
        // Taking the engine lock waits for the search to finish.
        let _engine = self.engine.lock().unwrap();
        println!("readyok");
        Ok(())
    }

    fn ucinewgame(&self) -> Result<(), UciError> {
        // Clear the hash at the beginning of each game. The readiness
        // barrier guarantees no search is running.
        self.engine.lock().unwrap().clear_hash_table();
        Ok(())
    }

    fn position(&self, args: &[&str]) -> Result<(), UciError> {
        if args.is_empty() {
            return Err(UciError::Message("expected argument for position".into()));
        }

        let mut engine = self.engine.lock().unwrap();
        let mut i = 0;
        match args[0] {
            "startpos" => {
                let variant = engine.position.variant;
                engine.set_variant(variant);
                i += 1;
            }
            "fen" => {
                if args.len() < 7 {
                    return Err(UciError::Message("fen needs six fields".into()));
                }
                let fen = args[1..7].join(" ");
                let variant = engine.position.variant;
                let pos = Position::from_fen_variant(&fen, variant)?;
                engine.set_position(Some(pos));
                i += 7;
            }
            cmd => {
                return Err(UciError::Message(format!("unknown position command {cmd}")));
            }
        }

        if i < args.len() {
            if args[i] != "moves" {
                return Err(UciError::Message(format!(
                    "expected moves, got {}",
                    args[i]
                )));
            }
            for s in &args[i + 1..] {
                let m = engine.position.uci_to_move(s)?;
                engine.do_move(m);
            }
        }
        Ok(())
    }

    fn go(&mut self, args: &[&str]) -> Result<(), UciError> {
        let engine = self.engine.lock().unwrap();
        let predicted = self.predicted.load(Ordering::Relaxed) == engine.position.zobrist();
        let mut tc = TimeControl::new(&engine.position, predicted);
        tc.moves_to_go = 30; // in case there is no time refresh
        let mut ponder = false;

        let mut i = 0;
        while i < args.len() {
            match args[i] {
                "ponder" => ponder = true,
                "infinite" => tc = TimeControl::new(&engine.position, false),
                "wtime" => {
                    i += 1;
                    tc.wtime = parse_millis(args.get(i))?;
                }
                "winc" => {
                    i += 1;
                    tc.winc = parse_millis(args.get(i))?;
                }
                "btime" => {
                    i += 1;
                    tc.btime = parse_millis(args.get(i))?;
                }
                "binc" => {
                    i += 1;
                    tc.binc = parse_millis(args.get(i))?;
                }
                "movestogo" => {
                    i += 1;
                    tc.moves_to_go = parse_number(args.get(i))?;
                }
                "movetime" => {
                    i += 1;
                    let t = parse_millis(args.get(i))?;
                    tc.wtime = t;
                    tc.winc = Duration::ZERO;
                    tc.btime = t;
                    tc.binc = Duration::ZERO;
                    tc.moves_to_go = 1;
                }
                "depth" => {
                    i += 1;
                    tc.depth = parse_number(args.get(i))?;
                }
                _ => {}
            }
            i += 1;
        }
        drop(engine);

        if ponder {
            *self.ponder.0.lock().unwrap() = true;
        }

        tc.start(ponder);
        let tc = Arc::new(tc);
        self.time_control = Some(tc.clone());
        self.play(tc);
        Ok(())
    }

    // Spawns the search. Returns only after the search thread owns
    // the engine so that subsequent commands observe a busy engine.
    fn play(&mut self, tc: Arc<TimeControl>) {
        let engine = self.engine.clone();
        let ponder = self.ponder.clone();
        let predicted = self.predicted.clone();
        let (started_tx, started_rx) = mpsc::channel();

        thread::spawn(move || {
            let mut eng = engine.lock().unwrap();
            let _ = started_tx.send(());

            let moves = eng.play(tc);

            // Remember the expected position two plies ahead; if the
            // opponent plays the pondered move the next search gets
            // more time.
            if moves.len() >= 2 {
                eng.position.do_move(moves[0]);
                eng.position.do_move(moves[1]);
                predicted.store(eng.position.zobrist(), Ordering::Relaxed);
                eng.position.undo_move();
                eng.position.undo_move();
            } else {
                predicted.store(eng.position.zobrist(), Ordering::Relaxed);
            }

            // While pondering, hold the bestmove line until ponderhit
            // or stop arrives.
            let (lock, cond) = &*ponder;
            let mut pondering = lock.lock().unwrap();
            while *pondering {
                pondering = cond.wait(pondering).unwrap();
            }
            drop(pondering);

            // The engine stays locked until the bestmove line is out;
            // otherwise a fast position/go pair can interleave info
            // and bestmove lines in the wrong order.
            match moves.len() {
                0 => println!("bestmove (none)"),
                1 => println!("bestmove {}", moves[0].uci()),
                _ => println!("bestmove {} ponder {}", moves[0].uci(), moves[1].uci()),
            }
            let _ = std::io::stdout().flush();
            drop(eng);
        });

        // Do not return before the search owns the engine.
        let _ = started_rx.recv();
    }

    fn stop(&mut self) -> Result<(), UciError> {
        if let Some(tc) = &self.time_control {
            tc.stop();
        }
        self.release_ponder();
        // Wait until the engine becomes ready again.
        let _engine = self.engine.lock().unwrap();
        Ok(())
    }

    fn ponderhit(&mut self) -> Result<(), UciError> {
        if let Some(tc) = &self.time_control {
            tc.ponder_hit();
        }
        self.release_ponder();
        Ok(())
    }

    fn release_ponder(&self) {
        let (lock, cond) = &*self.ponder;
        *lock.lock().unwrap() = false;
        cond.notify_all();
    }

    fn setoption(&mut self, line: &str) -> Result<(), UciError> {
        // setoption name <name...> [value <value...>]
        let rest = line
            .strip_prefix("setoption")
            .map(str::trim)
            .and_then(|s| s.strip_prefix("name"))
            .map(str::trim)
            .ok_or_else(|| UciError::Message("invalid setoption arguments".into()))?;

        let (name, value) = match rest.find(" value ") {
            Some(at) => (rest[..at].trim(), Some(rest[at + 7..].trim())),
            None => (rest.trim(), None),
        };

        // Buttons have no value.
        if name == "Clear Hash" {
            self.engine.lock().unwrap().clear_hash_table();
            return Ok(());
        }

        let value = value.ok_or_else(|| UciError::Message("missing setoption value".into()))?;
        match name {
            "UCI_AnalyseMode" => {
                let mode = value
                    .parse::<bool>()
                    .map_err(|_| UciError::Message(format!("bad value {value}")))?;
                self.engine.lock().unwrap().options.analyse_mode = mode;
                Ok(())
            }
            "Hash" => {
                let mb = value
                    .parse::<usize>()
                    .map_err(|_| UciError::Message(format!("bad value {value}")))?;
                let mb = mb.clamp(1, 65536);
                self.engine.lock().unwrap().resize_hash_table(mb);
                Ok(())
            }
            _ => Err(UciError::Message(format!("unhandled option {name}"))),
        }
    }
}

fn parse_millis(arg: Option<&&str>) -> Result<Duration, UciError> {
    let ms: u64 = parse_number(arg)?;
    Ok(Duration::from_millis(ms))
}

fn parse_number<T: std::str::FromStr>(arg: Option<&&str>) -> Result<T, UciError> {
    arg.and_then(|s| s.parse().ok())
        .ok_or_else(|| UciError::Message("expected a number".into()))
}
