//! Command-line administration for custom fields.

pub mod cli;
pub mod commands;
pub mod table;

pub use cli::{Cli, Commands};
