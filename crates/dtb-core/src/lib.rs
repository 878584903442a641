//! Core domain + application logic for the Discord flag-reaction translation bot.
//!
//! This crate is intentionally framework-agnostic. Discord and the HTTP
//! translation backends live behind ports (traits) implemented in adapter
//! crates.

pub mod config;
pub mod countries;
pub mod domain;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod logging;
pub mod mediator;
pub mod ports;
pub mod providers;
pub mod slash_commands;
pub mod temp_reply;
pub mod translation;
pub mod utils;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
