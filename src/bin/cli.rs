use std::io::{self, BufRead};

use stretto::board::Variant;
use stretto::uci::{Uci, UciError};

const USAGE: &str = "usage: stretto [--variant standard|racing-kings] [--log FILE]";

fn main() {
    let mut variant = Variant::Standard;
    let mut log_file: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--variant" => match args.next().as_deref() {
                Some("standard") => variant = Variant::Standard,
                Some("racing-kings") | Some("racingkings") => variant = Variant::RacingKings,
                other => {
                    eprintln!("unknown variant {other:?}\n{USAGE}");
                    std::process::exit(2);
                }
            },
            "--log" => match args.next() {
                Some(path) => log_file = Some(path),
                None => {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
            },
            "--version" => {
                println!("stretto {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            other => {
                eprintln!("unknown argument {other}\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    if let Some(path) = log_file {
        stretto::logger::init_logging(path, "stretto=debug");
    }

    println!("stretto {} by the stretto authors", env!("CARGO_PKG_VERSION"));
    tracing::info!(?variant, "engine started");

    let mut uci = Uci::new(variant);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        match uci.execute(&line) {
            Ok(()) => {}
            Err(UciError::Quit) => break,
            Err(UciError::Message(msg)) => {
                println!("info string {msg}");
                tracing::warn!(command = %line, error = %msg, "command rejected");
            }
        }
    }
}
