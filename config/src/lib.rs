//! Configuration types and loading for the SQL sink.
//!
//! The [`shared`] module holds the deserializable configuration of a SQL destination and its
//! state store. [`load_config`] assembles a configuration from layered files and `APP_`-prefixed
//! environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
