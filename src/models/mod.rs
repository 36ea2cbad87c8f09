//! Data models for the pool runtime.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod uri;

// Re-export commonly used types
pub use connection::{ConnectOptions, DatabaseMetadata};
pub use uri::{ConnectionUri, SchemeFamily, strip_qualifier};
