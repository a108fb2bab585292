//! Delivery queue between producers and the destination worker.

mod base;
pub mod memory;

pub use base::*;
