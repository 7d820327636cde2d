#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # warden
//!
//! Command-line front end for the warden reconciliation engine: argument
//! parsing, document loading and command dispatch.

pub mod cli;
pub mod commands;
pub mod loader;

pub use cli::{Cli, Commands, GlobalArgs};
pub use commands::execute_command;
pub use loader::{DocumentLoader, render};
