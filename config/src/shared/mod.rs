mod base;
mod connection;
mod destination;
mod sink;
mod state_store;

pub use base::*;
pub use connection::*;
pub use destination::*;
pub use sink::*;
pub use state_store::*;
