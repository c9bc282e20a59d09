//! CLI module for campus-auth.

pub mod args;
pub mod commands;

pub use args::{AuthCommands, Cli, Commands};
