//! Funnel persistence. `save` is an optimistic compare-and-swap on the
//! funnel's `version`, so concurrent writers cannot silently overwrite each
//! other: the loser gets `CrmError::Conflict` and must reload.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use tailorbiz_core::error::{CrmError, CrmResult};
use tailorbiz_core::funnel::Funnel;

/// Funnel document store.
#[async_trait]
pub trait FunnelRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> CrmResult<Option<Funnel>>;
    /// Stores a new funnel. Fails if the id is already taken.
    async fn insert(&self, funnel: Funnel) -> CrmResult<Funnel>;
    /// Persists a mutated funnel loaded at `funnel.version`. Returns the
    /// stored copy, whose version is one higher.
    async fn save(&self, funnel: &Funnel) -> CrmResult<Funnel>;
    async fn list(&self) -> CrmResult<Vec<Funnel>>;
    async fn remove(&self, id: Uuid) -> CrmResult<bool>;
}

/// DashMap-backed repository for development, tests and the CLI.
#[derive(Default)]
pub struct InMemoryFunnelStore {
    funnels: DashMap<Uuid, Funnel>,
}

impl InMemoryFunnelStore {
    pub fn new() -> Self {
        Self {
            funnels: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.funnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funnels.is_empty()
    }
}

#[async_trait]
impl FunnelRepository for InMemoryFunnelStore {
    async fn get(&self, id: Uuid) -> CrmResult<Option<Funnel>> {
        Ok(self.funnels.get(&id).map(|r| r.value().clone()))
    }

    async fn insert(&self, funnel: Funnel) -> CrmResult<Funnel> {
        use dashmap::mapref::entry::Entry;

        funnel.validate()?;
        match self.funnels.entry(funnel.id) {
            Entry::Occupied(_) => Err(CrmError::InvalidInput(format!(
                "funnel {} already exists",
                funnel.id
            ))),
            Entry::Vacant(slot) => {
                info!(funnel_id = %funnel.id, name = %funnel.name, stages = funnel.stages.len(), "Funnel stored");
                slot.insert(funnel.clone());
                Ok(funnel)
            }
        }
    }

    async fn save(&self, funnel: &Funnel) -> CrmResult<Funnel> {
        funnel.validate()?;
        let mut entry = self
            .funnels
            .get_mut(&funnel.id)
            .ok_or(CrmError::FunnelNotFound(funnel.id))?;

        if entry.version != funnel.version {
            warn!(
                funnel_id = %funnel.id,
                expected = funnel.version,
                found = entry.version,
                "Rejected stale funnel write"
            );
            metrics::counter!("funnel.save_conflicts").increment(1);
            return Err(CrmError::Conflict {
                funnel_id: funnel.id,
                expected: funnel.version,
                found: entry.version,
            });
        }

        let mut stored = funnel.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();
        *entry = stored.clone();
        Ok(stored)
    }

    async fn list(&self) -> CrmResult<Vec<Funnel>> {
        let mut funnels: Vec<Funnel> = self.funnels.iter().map(|r| r.value().clone()).collect();
        funnels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(funnels)
    }

    async fn remove(&self, id: Uuid) -> CrmResult<bool> {
        let removed = self.funnels.remove(&id).is_some();
        if removed {
            info!(funnel_id = %id, "Funnel removed");
        }
        Ok(removed)
    }
}
