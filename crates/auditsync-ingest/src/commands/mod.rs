//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod checkpoint;
pub mod run;
pub mod save_token;
pub mod validate;
