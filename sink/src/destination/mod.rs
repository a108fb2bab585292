//! SQL destination: options, schema reconciliation, transactions and inserts.
//!
//! [`SqlSession`] holds the database-facing state owned by a destination worker. Its
//! operations are implemented across the submodules of this module. [`SqlDestination`] wires a
//! session, a queue and a state store together and runs the worker.

mod connection;
mod driver;
mod field;
mod identifier;
mod insert;
mod options;
mod schema;
mod session;
mod transaction;

pub use driver::*;
pub use field::*;
pub use identifier::*;
pub use insert::build_insert_statement;
pub use options::*;
pub use schema::index_name;
pub use session::SqlSession;
