//! SQL client capability used by destinations.
//!
//! [`SqlDriver`] and [`SqlConnection`] are the seam between the delivery logic and the database
//! library. [`sqlx_driver::SqlxDriver`] implements them on top of sqlx for PostgreSQL, MySQL and
//! SQLite.

mod base;
mod dialect;
pub mod sqlx_driver;

pub use base::*;
pub use dialect::*;
