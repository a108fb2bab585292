//! Persisted key/value state that outlives a single run of the sink.

mod base;
pub mod file;
pub mod memory;

pub use base::*;
