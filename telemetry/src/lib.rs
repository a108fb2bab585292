//! Tracing setup shared by the sink and its tests.

pub mod tracing;
