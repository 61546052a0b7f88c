//! Fixed-interval pacing of outgoing media.

mod pacing_budget;
mod publisher;

pub use pacing_budget::*;
pub use publisher::*;
