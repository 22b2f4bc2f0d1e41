//! In-process snapshot store.
//!
//! Used when no database path is configured, and by tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use log::warn;

use super::model::QuoteSnapshot;
use super::store::QuoteSnapshotStore;
use crate::errors::Result;

#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, QuoteSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, QuoteSnapshot>> {
        self.snapshots.read().unwrap_or_else(|poisoned| {
            warn!("Snapshot store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, QuoteSnapshot>> {
        self.snapshots.write().unwrap_or_else(|poisoned| {
            warn!("Snapshot store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl QuoteSnapshotStore for InMemorySnapshotStore {
    fn get(&self, symbol: &str) -> Result<Option<QuoteSnapshot>> {
        Ok(self.read().get(symbol).cloned())
    }

    async fn upsert(&self, snapshot: QuoteSnapshot) -> Result<QuoteSnapshot> {
        self.write()
            .insert(snapshot.symbol.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn clear(&self, symbol: &str) -> Result<usize> {
        Ok(usize::from(self.write().remove(symbol).is_some()))
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut snapshots = self.write();
        let removed = snapshots.len();
        snapshots.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read().len())
    }
}
