//! Head-tracking input over the network
//!
//! - `osc`: OSC 1.0 message/bundle codec
//! - `receiver`: background UDP listener queuing head positions

pub mod osc;
pub mod receiver;

pub use osc::{OscArg, OscError, OscMessage, OscPacket};
pub use receiver::{extract_positions, ReceiverStats, TrackingError, TrackingReceiver};
