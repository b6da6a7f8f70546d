//! unturned-monitor library crate.
//!
//! Game server status monitoring with chat notifications. The binary wires
//! these modules together; integration tests drive them directly.

pub mod commands;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod panic_hook;
pub mod probe;
pub mod registry;
pub mod utils;

pub use error::{Error, Result};
