//! Command-line interface module.

mod args;
pub mod host;
pub mod resolve;

pub use args::{Cli, Commands, ResolveArgs};
