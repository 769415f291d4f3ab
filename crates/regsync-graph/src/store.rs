//! The entity store contract consumed by the importer.
//!
//! A store hands out entities by natural key and accepts inserts and updates,
//! optionally inside one transaction. It also models the session the writes
//! go through: a failed write closes the session, and a closed session must
//! be reopened before anything else is written.

use async_trait::async_trait;

use regsync_core::{Entity, NaturalKey};

use crate::client::GraphError;

#[async_trait]
pub trait EntityStore: Send {
    /// Look up an entity by its natural key.
    async fn find(&mut self, key: &NaturalKey) -> Result<Option<Entity>, GraphError>;

    /// Begin a transaction. Writes stay invisible to other sessions until commit.
    async fn begin(&mut self) -> Result<(), GraphError>;

    /// Insert a new entity. Fails if its natural key already exists.
    async fn insert(&mut self, entity: &Entity) -> Result<(), GraphError>;

    /// Overwrite the stored fields of an existing entity.
    async fn update(&mut self, entity: &Entity) -> Result<(), GraphError>;

    async fn commit(&mut self) -> Result<(), GraphError>;

    async fn rollback(&mut self) -> Result<(), GraphError>;

    /// Whether the session still accepts writes.
    fn is_open(&self) -> bool;

    /// Replace a closed session with a fresh one on the same connection.
    /// A transaction that was in progress is restarted empty.
    async fn reopen(&mut self) -> Result<(), GraphError>;

    fn statement_logging(&self) -> bool;

    /// Toggle per-statement diagnostic logging.
    fn set_statement_logging(&mut self, enabled: bool);
}
