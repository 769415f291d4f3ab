//! In-process [`EntityStore`] for dry runs and tests.
//!
//! One [`MemoryStore`] is one session on a shared database; [`MemoryStore::session`]
//! opens another session on the same data. Writes made inside a transaction
//! are staged per session and become visible to other sessions on commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use regsync_core::{Entity, EntityKind, NaturalKey};

use crate::client::GraphError;
use crate::store::EntityStore;

#[derive(Default)]
struct Database {
    rows: Vec<Entity>,
    index: HashMap<NaturalKey, usize>,
    failing: HashSet<EntityKind>,
}

impl Database {
    fn contains(&self, key: &NaturalKey) -> bool {
        self.index.contains_key(key)
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Insert(entity) => {
                self.index.insert(entity.key(), self.rows.len());
                self.rows.push(entity);
            }
            Write::Update(entity) => match self.index.get(&entity.key()) {
                Some(&slot) => self.rows[slot] = entity,
                None => {
                    self.index.insert(entity.key(), self.rows.len());
                    self.rows.push(entity);
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Write {
    Insert(Entity),
    Update(Entity),
}

impl Write {
    fn entity(&self) -> &Entity {
        match self {
            Write::Insert(e) | Write::Update(e) => e,
        }
    }
}

pub struct MemoryStore {
    db: Arc<Mutex<Database>>,
    staged: Option<Vec<Write>>,
    open: bool,
    statement_logging: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_database(Arc::new(Mutex::new(Database::default())))
    }

    fn with_database(db: Arc<Mutex<Database>>) -> Self {
        Self {
            db,
            staged: None,
            open: true,
            statement_logging: true,
        }
    }

    /// Open another session on the same data.
    pub fn session(&self) -> Self {
        Self::with_database(Arc::clone(&self.db))
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Fixtures & Inspection ────────────────────────────────────

    /// Write an entity directly as committed data, replacing any row with its key.
    pub fn seed(&self, entity: Entity) {
        self.lock().apply(Write::Update(entity));
    }

    /// Make every insert of `kind` fail, closing the session that attempted it.
    pub fn fail_inserts_of(&self, kind: EntityKind) {
        self.lock().failing.insert(kind);
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Simulate the backend dropping this session.
    pub fn close_session(&mut self) {
        self.open = false;
    }

    /// Committed row for `key`.
    pub fn get(&self, key: &NaturalKey) -> Option<Entity> {
        let db = self.lock();
        db.index.get(key).map(|&slot| db.rows[slot].clone())
    }

    /// Committed rows of `kind`, in insertion order.
    pub fn rows(&self, kind: EntityKind) -> Vec<Entity> {
        self.lock()
            .rows
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.lock().rows.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn total(&self) -> usize {
        self.lock().rows.len()
    }

    // ── Internals ────────────────────────────────────────────────

    fn staged_row(&self, key: &NaturalKey) -> Option<&Entity> {
        self.staged
            .as_ref()?
            .iter()
            .rev()
            .map(Write::entity)
            .find(|e| e.key() == *key)
    }

    fn log_write(&self, op: &str, entity: &Entity) {
        if self.statement_logging {
            tracing::debug!(op, key = %entity.key(), "Executing statement");
        }
    }

    fn stage_or_apply(&mut self, write: Write) {
        match self.staged.as_mut() {
            Some(staged) => staged.push(write),
            None => self.lock().apply(write),
        }
    }

    fn fail(&mut self, err: GraphError) -> Result<(), GraphError> {
        self.open = false;
        Err(err)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find(&mut self, key: &NaturalKey) -> Result<Option<Entity>, GraphError> {
        // Let concurrent sessions interleave the way network round-trips would.
        tokio::task::yield_now().await;

        if let Some(entity) = self.staged_row(key) {
            return Ok(Some(entity.clone()));
        }
        Ok(self.get(key))
    }

    async fn begin(&mut self) -> Result<(), GraphError> {
        if self.staged.is_none() {
            self.staged = Some(Vec::new());
        }
        Ok(())
    }

    async fn insert(&mut self, entity: &Entity) -> Result<(), GraphError> {
        if !self.open {
            return Err(GraphError::SessionClosed);
        }
        self.log_write("insert", entity);

        let key = entity.key();
        let (failing, exists) = {
            let db = self.lock();
            (db.failing.contains(&entity.kind()), db.contains(&key))
        };
        if failing {
            return self.fail(GraphError::Backend(format!(
                "injected failure inserting {key}"
            )));
        }
        if exists || self.staged_row(&key).is_some() {
            return self.fail(GraphError::ConstraintViolation {
                key: key.to_string(),
            });
        }

        self.stage_or_apply(Write::Insert(entity.clone()));
        Ok(())
    }

    async fn update(&mut self, entity: &Entity) -> Result<(), GraphError> {
        if !self.open {
            return Err(GraphError::SessionClosed);
        }
        self.log_write("update", entity);

        let key = entity.key();
        let exists = self.lock().contains(&key) || self.staged_row(&key).is_some();
        if !exists {
            return self.fail(GraphError::NotFound {
                key: key.to_string(),
            });
        }

        self.stage_or_apply(Write::Update(entity.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), GraphError> {
        let staged = self.staged.take().ok_or(GraphError::NoTransaction)?;
        if !self.open {
            return Err(GraphError::SessionClosed);
        }

        let mut db = self.lock();
        // Another session may have committed the same keys meanwhile.
        if let Some(conflict) = staged.iter().find_map(|w| match w {
            Write::Insert(e) if db.contains(&e.key()) => Some(e.key()),
            _ => None,
        }) {
            drop(db);
            self.open = false;
            return Err(GraphError::ConstraintViolation {
                key: conflict.to_string(),
            });
        }

        let writes = staged.len();
        for write in staged {
            db.apply(write);
        }
        tracing::debug!(writes, "Transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), GraphError> {
        if let Some(staged) = self.staged.take() {
            tracing::debug!(discarded = staged.len(), "Transaction rolled back");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn reopen(&mut self) -> Result<(), GraphError> {
        self.open = true;
        if let Some(staged) = self.staged.as_mut() {
            staged.clear();
        }
        Ok(())
    }

    fn statement_logging(&self) -> bool {
        self.statement_logging
    }

    fn set_statement_logging(&mut self, enabled: bool) {
        self.statement_logging = enabled;
    }
}
