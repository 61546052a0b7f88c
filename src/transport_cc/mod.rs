//! Transport-wide congestion control: per-packet send bookkeeping, feedback
//! matching and the bridge between the pacer and the bandwidth estimator.

mod client;
mod feedback;
mod send_history;

pub use client::*;
pub use feedback::*;
pub use send_history::*;
