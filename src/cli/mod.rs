//! Command-line interface module.

mod args;
mod common;
pub mod maintain;
pub mod query;

pub use args::{Cli, Commands, OutputArgs};
