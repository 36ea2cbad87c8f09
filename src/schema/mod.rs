//! Schema management.
//!
//! - DDL execution pipeline over a pooled connection
//! - DDL script splitting

pub mod script;
pub mod target;

pub use script::split_statements;
pub use target::{DdlSummary, DdlTarget, GenerationTarget};
