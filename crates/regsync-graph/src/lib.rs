//! regsync graph — storage for the organization registry graph.
//!
//! The importer talks to storage only through [`EntityStore`]. Two stores
//! implement it: [`Neo4jStore`] for the production Neo4j database and
//! [`MemoryStore`] for dry runs and tests.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod neo4j;
pub mod queries;
pub mod schema;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;
pub use store::EntityStore;
