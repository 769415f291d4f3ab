//! Run-scoped unit of work.
//!
//! Tracks every entity a run touches in a flat arena. New entities are
//! inserted on flush, attached ones (loaded from the store) are left alone
//! unless marked dirty. Handles are stable slot indices, valid until
//! [`UnitOfWork::clear`].

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use regsync_core::{Entity, EntityKind, NaturalKey};
use regsync_graph::EntityStore;

use crate::error::Result;

/// Stable reference to a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Created in this run; inserted on flush.
    New,
    /// Loaded from the store; never written back.
    Attached,
    /// Loaded from the store and modified; updated on flush.
    Dirty,
}

#[derive(Debug)]
struct Tracked {
    entity: Entity,
    state: EntityState,
}

/// Per-kind tally of what a flush wrote and what it reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub created: BTreeMap<EntityKind, usize>,
    pub attached: BTreeMap<EntityKind, usize>,
    pub updated: BTreeMap<EntityKind, usize>,
}

impl ImportSummary {
    pub fn created(&self, kind: EntityKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn attached(&self, kind: EntityKind) -> usize {
        self.attached.get(&kind).copied().unwrap_or(0)
    }

    pub fn updated(&self, kind: EntityKind) -> usize {
        self.updated.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct UnitOfWork {
    slots: Vec<Tracked>,
    index: HashMap<NaturalKey, Handle>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity created in this run.
    ///
    /// The first entity registered under a key wins: a later candidate with
    /// the same key, pending or attached, is dropped and the existing handle
    /// returned.
    pub fn persist(&mut self, entity: Entity) -> Handle {
        let key = entity.key();
        match self.index.get(&key) {
            Some(&handle) => {
                tracing::debug!(%key, "Entity already tracked, keeping first registration");
                handle
            }
            None => self.push(key, entity, EntityState::New),
        }
    }

    /// Track a row loaded from the store.
    ///
    /// A pending entity with the same key is discarded in favour of the row.
    pub fn attach(&mut self, entity: Entity) -> Handle {
        let key = entity.key();
        match self.index.get(&key) {
            Some(&handle) => {
                let slot = &mut self.slots[handle.0];
                if slot.state == EntityState::New {
                    tracing::debug!(%key, "Store row supersedes pending entity");
                    slot.entity = entity;
                    slot.state = EntityState::Attached;
                }
                handle
            }
            None => self.push(key, entity, EntityState::Attached),
        }
    }

    fn push(&mut self, key: NaturalKey, entity: Entity, state: EntityState) -> Handle {
        let handle = Handle(self.slots.len());
        self.slots.push(Tracked { entity, state });
        self.index.insert(key, handle);
        handle
    }

    /// Replace an attached entity's fields and schedule it for update.
    ///
    /// The replacement must keep the same natural key; otherwise nothing changes.
    pub fn mark_dirty(&mut self, handle: Handle, entity: Entity) -> bool {
        let Some(slot) = self.slots.get_mut(handle.0) else {
            return false;
        };
        if slot.entity.key() != entity.key() {
            tracing::warn!(key = %entity.key(), "Refusing to re-key a tracked entity");
            return false;
        }
        slot.entity = entity;
        if slot.state == EntityState::Attached {
            slot.state = EntityState::Dirty;
        }
        true
    }

    pub fn handle_of(&self, key: &NaturalKey) -> Option<Handle> {
        self.index.get(key).copied()
    }

    pub fn get(&self, handle: Handle) -> Option<&Entity> {
        self.slots.get(handle.0).map(|t| &t.entity)
    }

    pub fn state(&self, handle: Handle) -> Option<EntityState> {
        self.slots.get(handle.0).map(|t| t.state)
    }

    pub fn is_attached(&self, handle: Handle) -> bool {
        matches!(
            self.state(handle),
            Some(EntityState::Attached | EntityState::Dirty)
        )
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write pending changes in registration order. Everything tracked is
    /// attached afterwards.
    pub async fn flush<S>(&mut self, store: &mut S) -> Result<ImportSummary>
    where
        S: EntityStore + ?Sized,
    {
        let mut summary = ImportSummary::default();
        for tracked in &mut self.slots {
            let kind = tracked.entity.kind();
            match tracked.state {
                EntityState::New => {
                    store.insert(&tracked.entity).await?;
                    *summary.created.entry(kind).or_default() += 1;
                }
                EntityState::Dirty => {
                    store.update(&tracked.entity).await?;
                    *summary.updated.entry(kind).or_default() += 1;
                }
                EntityState::Attached => {
                    *summary.attached.entry(kind).or_default() += 1;
                }
            }
            tracked.state = EntityState::Attached;
        }
        Ok(summary)
    }

    /// Detach everything.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}
