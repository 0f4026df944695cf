//! # MDP Common Library
//!
//! Shared code for the maritime data pipeline crates:
//! - Error type shared across crates
//! - TOML bootstrap configuration and data folder resolution
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
