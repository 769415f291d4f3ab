//! regsync-core: Shared types, configuration, and error handling for regsync.
//!
//! This crate provides the foundational types used across all regsync components:
//! - Entity types (Organization, Person, Authority, etc.) for the registry graph
//! - Natural keys that identify every entity across imports
//! - The inbound organization payload
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod keys;
pub mod payload;
pub mod types;

pub use error::RegsyncError;
pub use keys::NaturalKey;
pub use payload::Payload;
pub use types::{EdgeType, Entity, EntityKind, GeoLevel};
