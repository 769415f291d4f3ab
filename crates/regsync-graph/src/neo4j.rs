//! [`EntityStore`] backed by a live Neo4j database.

use async_trait::async_trait;
use neo4rs::Txn;

use regsync_core::{Entity, NaturalKey};

use crate::client::{GraphClient, GraphError};
use crate::mutations::{insert_statements, update_statement};
use crate::queries::{entity_from_node, find_statement, Statement};
use crate::schema::{schema_statements, CONSTRAINT_VIOLATION_CODE};
use crate::store::EntityStore;

pub struct Neo4jStore {
    client: GraphClient,
    txn: Option<Txn>,
    in_transaction: bool,
    open: bool,
    statement_logging: bool,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            txn: None,
            in_transaction: false,
            open: true,
            statement_logging: true,
        }
    }

    /// Create the per-label key constraints. Safe to run on every start.
    pub async fn ensure_schema(&self) -> Result<(), GraphError> {
        let statements = schema_statements();
        let count = statements.len();
        for stmt in statements {
            self.log_statement(&stmt);
            self.client.run(stmt.into_query()).await?;
        }
        tracing::info!(constraints = count, "Graph schema ensured");
        Ok(())
    }

    fn log_statement(&self, stmt: &Statement) {
        if self.statement_logging {
            tracing::debug!(cypher = %stmt.cypher, params = stmt.params.len(), "Executing statement");
        }
    }

    async fn write(&mut self, stmt: Statement, key: &NaturalKey) -> Result<(), GraphError> {
        if !self.open {
            return Err(GraphError::SessionClosed);
        }
        self.log_statement(&stmt);

        let result = match self.txn.as_mut() {
            Some(txn) => txn.run(stmt.into_query()).await.map_err(GraphError::from),
            None => self.client.run(stmt.into_query()).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                // The server aborts the transaction on any failed statement.
                self.open = false;
                Err(classify(err, key))
            }
        }
    }
}

#[async_trait]
impl EntityStore for Neo4jStore {
    async fn find(&mut self, key: &NaturalKey) -> Result<Option<Entity>, GraphError> {
        let stmt = find_statement(key);
        self.log_statement(&stmt);

        // An aborted transaction rejects reads too; fall back to autocommit.
        let open = self.open;
        let row = match self.txn.as_mut().filter(|_| open) {
            Some(txn) => {
                let mut stream = txn.execute(stmt.into_query()).await?;
                stream.next(txn.handle()).await?
            }
            None => self.client.query_one(stmt.into_query()).await?,
        };

        match row {
            Some(row) => {
                let node: neo4rs::Node = row.get("n").map_err(|e| {
                    GraphError::Serialization(format!("Failed to deserialize node: {e}"))
                })?;
                entity_from_node(key.kind(), &node).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn begin(&mut self) -> Result<(), GraphError> {
        if self.txn.is_some() {
            tracing::warn!("Transaction already in progress, reusing it");
            return Ok(());
        }
        self.txn = Some(self.client.start_txn().await?);
        self.in_transaction = true;
        Ok(())
    }

    async fn insert(&mut self, entity: &Entity) -> Result<(), GraphError> {
        let key = entity.key();
        for stmt in insert_statements(entity)? {
            self.write(stmt, &key).await?;
        }
        Ok(())
    }

    async fn update(&mut self, entity: &Entity) -> Result<(), GraphError> {
        let stmt = update_statement(entity)?;
        self.write(stmt, &entity.key()).await
    }

    async fn commit(&mut self) -> Result<(), GraphError> {
        let txn = self.txn.take().ok_or(GraphError::NoTransaction)?;
        self.in_transaction = false;
        if !self.open {
            return Err(GraphError::SessionClosed);
        }
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), GraphError> {
        self.in_transaction = false;
        match self.txn.take() {
            Some(txn) => {
                txn.rollback().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn reopen(&mut self) -> Result<(), GraphError> {
        if let Some(txn) = self.txn.take() {
            if let Err(e) = txn.rollback().await {
                tracing::debug!(error = %e, "Discarding aborted transaction");
            }
        }
        self.open = true;
        if self.in_transaction {
            self.txn = Some(self.client.start_txn().await?);
        }
        tracing::info!("Store session reopened");
        Ok(())
    }

    fn statement_logging(&self) -> bool {
        self.statement_logging
    }

    fn set_statement_logging(&mut self, enabled: bool) {
        self.statement_logging = enabled;
    }
}

/// Surface unique key failures as [`GraphError::ConstraintViolation`].
fn classify(err: GraphError, key: &NaturalKey) -> GraphError {
    match err {
        GraphError::Query(e) if e.to_string().contains(CONSTRAINT_VIOLATION_CODE) => {
            GraphError::ConstraintViolation {
                key: key.to_string(),
            }
        }
        other => other,
    }
}
