//! Transaction coordinator: one payload in, one committed graph out.
//!
//! A run checks whether the organization is already known, takes the import
//! lock, builds the graph inside a store transaction and commits it. Any
//! failure rolls the whole run back. Run-scoped state (resolver cache, unit
//! of work) is cleared after every run, successful or not.

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use regsync_core::payload::OrganizationData;
use regsync_core::{NaturalKey, Payload};
use regsync_graph::EntityStore;

use crate::builder::GraphBuilder;
use crate::config::LockConfig;
use crate::error::{Result, SyncError};
use crate::lock::{LockGuard, LockRegistry};
use crate::resolver::IdentityResolver;
use crate::unit_of_work::{ImportSummary, UnitOfWork};

/// What a run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created {
        inn: String,
        run_id: Uuid,
        summary: ImportSummary,
    },
    /// The organization already exists; nothing was written.
    Skipped { inn: String },
}

impl ImportOutcome {
    pub fn inn(&self) -> &str {
        match self {
            Self::Created { inn, .. } | Self::Skipped { inn } => inn,
        }
    }
}

pub struct Importer<S: EntityStore> {
    store: S,
    locks: LockRegistry,
    lock: LockConfig,
    resolver: IdentityResolver,
    uow: UnitOfWork,
}

impl<S: EntityStore> Importer<S> {
    /// Importers sharing `locks` serialize on the configured lock name.
    pub fn new(store: S, locks: LockRegistry, lock: LockConfig) -> Self {
        Self {
            store,
            locks,
            lock,
            resolver: IdentityResolver::new(),
            uow: UnitOfWork::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Entries left in the run cache. Zero between runs.
    pub fn cached_entries(&self) -> usize {
        self.resolver.len()
    }

    /// Entities left in the unit of work. Zero between runs.
    pub fn tracked_entities(&self) -> usize {
        self.uow.len()
    }

    /// Import one organization payload.
    pub async fn import(&mut self, payload: &Payload) -> Result<ImportOutcome> {
        let inn = payload.data.inn.trim().to_string();
        if inn.is_empty() {
            return Err(SyncError::Validation("payload has no inn".to_string()));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("import", %run_id, %inn);
        self.run(&payload.data, inn, run_id).instrument(span).await
    }

    async fn run(
        &mut self,
        data: &OrganizationData,
        inn: String,
        run_id: Uuid,
    ) -> Result<ImportOutcome> {
        let org_key = NaturalKey::Organization { inn: inn.clone() };
        if self.store.find(&org_key).await?.is_some() {
            tracing::info!("Organization already imported, skipping");
            return Ok(ImportOutcome::Skipped { inn });
        }

        let _guard = self.acquire_lock().await?;

        let statement_logging = self.store.statement_logging();
        self.store.set_statement_logging(false);

        let result = self.transact(data).await;

        self.resolver.clear();
        self.uow.clear();
        self.store.set_statement_logging(statement_logging);

        match result {
            Ok(summary) => {
                let created: usize = summary.created.values().sum();
                let attached: usize = summary.attached.values().sum();
                tracing::info!(created, attached, "Organization imported");
                Ok(ImportOutcome::Created {
                    inn,
                    run_id,
                    summary,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Import failed, changes rolled back");
                Err(e)
            }
        }
    }

    async fn acquire_lock(&self) -> Result<Option<LockGuard>> {
        if !self.lock.enabled {
            return Ok(None);
        }
        let guard = self
            .locks
            .acquire(&self.lock.name, self.lock.timeout())
            .await?;
        Ok(Some(guard))
    }

    /// Build, flush and commit inside one transaction; roll back on failure.
    async fn transact(&mut self, data: &OrganizationData) -> Result<ImportSummary> {
        self.store.begin().await?;

        let built = self.build_and_flush(data).await;
        let result = match built {
            Ok(summary) => self
                .store
                .commit()
                .await
                .map(|()| summary)
                .map_err(SyncError::from),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(rollback) = self.store.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
        }
        result
    }

    async fn build_and_flush(&mut self, data: &OrganizationData) -> Result<ImportSummary> {
        let mut builder = GraphBuilder::new(&mut self.store, &mut self.uow, &mut self.resolver);
        builder.build(data).await?;
        self.uow.flush(&mut self.store).await
    }
}
