//! Transactional core of a trading venue: an in-memory limit order book with
//! deterministic price-time matching, a write-ahead durability log, and an
//! in-memory propagation channel feeding eventually-consistent read models.

pub mod api;
pub mod book;
pub mod channel;
pub mod cli;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fifo;
pub mod projections;
pub mod simulate;
pub mod state;
pub mod utils;
pub mod wal;
