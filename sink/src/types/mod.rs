//! Common types used throughout the sink.

mod message;
mod sequence;

pub use message::*;
pub use sequence::*;
