//! tableprov common types, identities, and errors.
//!
//! This crate provides foundational types shared by the config loader and
//! the ingestion engine:
//! - Table identity (`TableKey`) and CSV dialect tags
//! - Path basename helper used to derive table names and sibling files
//! - The unified error type with stable codes

pub mod error;
pub mod id;
pub mod path;

pub use error::{Error, Result};
pub use id::{Dialect, TableKey};
pub use path::basename;

/// Name of the field that carries CSV text in every emitted record.
pub const PAYLOAD_FIELD: &str = "tableprov";
