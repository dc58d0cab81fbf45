//! Configuration module for Watcherr
//!
//! Handles loading configuration from TOML files, `.env` files and environment variable overrides.

pub mod config;

pub use config::*;
