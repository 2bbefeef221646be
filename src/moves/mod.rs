pub mod movegen;
pub mod notation;
pub mod perft;
pub mod types;
