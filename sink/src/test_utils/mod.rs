//! Utilities for testing SQL destinations without a database server.
//!
//! - [`driver`] - scripted in-memory [`crate::client::SqlDriver`] that records every statement
//! - [`message`] - message builders and acknowledgment recording
//! - [`notify`] - waiting on notifications with a timeout
//! - [`destination`] - destination option builders

pub mod destination;
pub mod driver;
pub mod message;
pub mod notify;
