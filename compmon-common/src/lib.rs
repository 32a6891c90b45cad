//! # compmon Common Library
//!
//! Shared code for the compmon crates:
//! - Error type
//! - Bootstrap configuration (TOML file, defaults, validation)
//! - Event types and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
