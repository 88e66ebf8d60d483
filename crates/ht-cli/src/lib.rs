//! Heartbeat tracker CLI library.
//!
//! This crate provides the `ht` command-line interface over the tracking
//! engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::{Config, TomlSettingsStore, default_config_file};
