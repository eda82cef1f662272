//! # Adlog CLI
//!
//! Runs coordinator operations against a local data directory holding a
//! file-backed content store and ledger.

pub mod app;
pub mod config;

pub use app::App;
pub use config::{AppConfig, Cli, Command};
