mod acknowledged_bitrate_estimator;
mod bitrate_estimator;
mod config;
mod link_capacity_tracker;
mod loss_based_bwe_v0;
mod packet;
mod rtt_based_backoff;
mod sequence_number_unwrapper;

pub use acknowledged_bitrate_estimator::*;
pub use bitrate_estimator::*;
pub use config::*;
pub use link_capacity_tracker::*;
pub use loss_based_bwe_v0::*;
pub use packet::*;
pub use rtt_based_backoff::*;
pub use sequence_number_unwrapper::*;

pub mod api;
pub mod pacing;
pub mod transport_cc;
