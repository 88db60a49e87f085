//! VolRoute Common - Shared types and utilities
//!
//! This crate provides the value types, error definitions, configuration
//! and retry helper used by the master client and its binaries.

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::{ClientConfig, RetryConfig};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use types::*;
