//! Identity resolution by natural key.
//!
//! The store is the source of truth; the run cache only answers for entities
//! created earlier in the same run that the store cannot see yet.

use std::collections::HashMap;

use regsync_core::NaturalKey;
use regsync_graph::EntityStore;

use crate::error::Result;
use crate::unit_of_work::{Handle, UnitOfWork};

#[derive(Debug, Default)]
pub struct IdentityResolver {
    cache: HashMap<NaturalKey, Handle>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the entity identified by `key`.
    ///
    /// A cached entity that is already attached is returned as is. Otherwise
    /// the store is asked; a stored row is attached to `uow` (superseding any
    /// pending entity with the same key). Failing that, a pending entity from
    /// the cache is returned.
    pub async fn resolve<S>(
        &mut self,
        store: &mut S,
        uow: &mut UnitOfWork,
        key: &NaturalKey,
    ) -> Result<Option<Handle>>
    where
        S: EntityStore + ?Sized,
    {
        if let Some(&handle) = self.cache.get(key) {
            if uow.is_attached(handle) {
                return Ok(Some(handle));
            }
        }

        match store.find(key).await? {
            Some(row) => {
                let handle = uow.attach(row);
                if let Some(cached) = self.cache.get_mut(key) {
                    *cached = handle;
                }
                tracing::trace!(%key, "Resolved from store");
                Ok(Some(handle))
            }
            None => Ok(self.cache.get(key).copied()),
        }
    }

    /// Make a newly created entity findable for the rest of the run.
    pub fn remember(&mut self, key: NaturalKey, handle: Handle) {
        self.cache.insert(key, handle);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
