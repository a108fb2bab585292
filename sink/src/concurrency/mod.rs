//! Coordination primitives between the destination driver and its worker.
//!
//! The worker is woken by producers through a [`tokio::sync::Notify`] handed to the delivery
//! queue, and stopped through the [`shutdown`] channel. Both are awaited together with the
//! suspend deadline, so a stopping worker never sleeps through a shutdown request.

pub mod shutdown;
