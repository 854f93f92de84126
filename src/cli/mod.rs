//! Command-line interface for crate-shuffle.
//!
//! This module parses the command line and runs the shuffle.

mod commands;

pub use commands::{Cli, run_command};
