//! CLI module for the Infusethink infrastructure tool.
//!
//! This module provides the command-line interface for previewing and
//! deploying the Infusethink stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
