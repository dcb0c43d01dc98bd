//! CLI command implementations
//!
//! - `migrate`: the migration run
//! - `registry`: registry inspection
//! - `config`: `init` and `schema`
//! - `util`: argument helpers shared by the commands

pub mod config;
pub mod migrate;
pub mod registry;
pub mod util;

pub use config::{cmd_init, cmd_schema};
pub use migrate::cmd_migrate;
pub use registry::cmd_registry;
