//! regsync-import: organization registry importer.
//!
//! Reconciles one nested organization record into the entity graph: every
//! sub-entity is resolved by natural key before anything new is created, and
//! the whole graph is committed in a single transaction.

pub mod builder;
pub mod config;
pub mod dates;
pub mod error;
pub mod importer;
pub mod lock;
pub mod resolver;
pub mod unit_of_work;

pub use error::{Result, SyncError};
pub use importer::{ImportOutcome, Importer};
pub use lock::LockRegistry;
pub use unit_of_work::ImportSummary;
