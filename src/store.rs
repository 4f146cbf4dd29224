//! Profile store collaborator
//!
//! The engine only ever reads a profile snapshot per request; the store owns
//! persistence and the process-wide cache. [`InMemoryProfileStore`] is the
//! reference implementation of the upward admin surface (set / load / remove /
//! list / count) and [`CachingProfileStore`] is the read-through cache layer
//! with invalidation on every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ChargingError;
use crate::models::account::AccountProfile;
use crate::traits::ProfileStore;
use crate::ChargingResult;

/// Window into a listing, adapted from the API pagination shape
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Pagination {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    fn apply(&self, mut ids: Vec<String>) -> Vec<String> {
        if self.offset >= ids.len() {
            return Vec::new();
        }
        ids.drain(..self.offset);
        if let Some(limit) = self.limit {
            ids.truncate(limit);
        }
        ids
    }
}

/// Mutating/administrative surface of a profile store
#[async_trait]
pub trait ProfileAdmin: Send + Sync {
    /// Creates or replaces a profile (keyed on `Tenant:ID`)
    async fn set(&self, profile: AccountProfile) -> ChargingResult<()>;

    /// Removes a profile; missing profiles are an error, like a failed load
    async fn remove(&self, tenant: &str, id: &str) -> ChargingResult<()>;

    /// Profile IDs of a tenant, sorted, paginated
    async fn profile_ids(&self, tenant: &str, page: Pagination) -> ChargingResult<Vec<String>>;

    /// Number of profiles stored for a tenant
    async fn profile_count(&self, tenant: &str) -> ChargingResult<usize>;
}

fn tenant_key(tenant: &str, id: &str) -> String {
    format!("{}:{}", tenant, id)
}

/// Process-local profile store
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, AccountProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, tenant: &str, id: &str) -> ChargingResult<AccountProfile> {
        self.profiles
            .read()
            .await
            .get(&tenant_key(tenant, id))
            .cloned()
            .ok_or_else(|| ChargingError::ProfileNotFound(tenant_key(tenant, id)))
    }

    async fn update_balance_units(
        &self,
        tenant: &str,
        id: &str,
        units: &[(String, Decimal)],
    ) -> ChargingResult<()> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&tenant_key(tenant, id))
            .ok_or_else(|| ChargingError::ProfileNotFound(tenant_key(tenant, id)))?;
        for (balance_id, value) in units {
            if let Some(blnc) = profile.balances.iter_mut().find(|b| &b.id == balance_id) {
                blnc.units = *value;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileAdmin for InMemoryProfileStore {
    async fn set(&self, profile: AccountProfile) -> ChargingResult<()> {
        profile.validate()?;
        let key = profile.tenant_id();
        debug!("Storing account profile {}", key);
        self.profiles.write().await.insert(key, profile);
        Ok(())
    }

    async fn remove(&self, tenant: &str, id: &str) -> ChargingResult<()> {
        self.profiles
            .write()
            .await
            .remove(&tenant_key(tenant, id))
            .map(|_| ())
            .ok_or_else(|| ChargingError::ProfileNotFound(tenant_key(tenant, id)))
    }

    async fn profile_ids(&self, tenant: &str, page: Pagination) -> ChargingResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .profiles
            .read()
            .await
            .values()
            .filter(|p| p.tenant == tenant)
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        Ok(page.apply(ids))
    }

    async fn profile_count(&self, tenant: &str) -> ChargingResult<usize> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .filter(|p| p.tenant == tenant)
            .count())
    }
}

/// Read-through cache in front of another profile store
///
/// Loads populate the cache; set/remove/unit flushes invalidate the entry so
/// the next load observes the mutation.
pub struct CachingProfileStore<S> {
    inner: Arc<S>,
    cache: RwLock<HashMap<String, AccountProfile>>,
}

impl<S> CachingProfileStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn invalidate(&self, key: &str) {
        self.cache.write().await.remove(key);
    }

    /// Number of cached entries, exposed for tests and introspection
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for CachingProfileStore<S> {
    async fn load(&self, tenant: &str, id: &str) -> ChargingResult<AccountProfile> {
        let key = tenant_key(tenant, id);
        if let Some(cached) = self.cache.read().await.get(&key) {
            debug!("Profile cache HIT for {}", key);
            return Ok(cached.clone());
        }
        let profile = self.inner.load(tenant, id).await?;
        self.cache.write().await.insert(key, profile.clone());
        Ok(profile)
    }

    async fn update_balance_units(
        &self,
        tenant: &str,
        id: &str,
        units: &[(String, Decimal)],
    ) -> ChargingResult<()> {
        self.inner.update_balance_units(tenant, id, units).await?;
        self.invalidate(&tenant_key(tenant, id)).await;
        Ok(())
    }
}

#[async_trait]
impl<S: ProfileStore + ProfileAdmin> ProfileAdmin for CachingProfileStore<S> {
    async fn set(&self, profile: AccountProfile) -> ChargingResult<()> {
        let key = profile.tenant_id();
        self.inner.set(profile).await?;
        self.invalidate(&key).await;
        Ok(())
    }

    async fn remove(&self, tenant: &str, id: &str) -> ChargingResult<()> {
        self.inner.remove(tenant, id).await?;
        self.invalidate(&tenant_key(tenant, id)).await;
        Ok(())
    }

    async fn profile_ids(&self, tenant: &str, page: Pagination) -> ChargingResult<Vec<String>> {
        self.inner.profile_ids(tenant, page).await
    }

    async fn profile_count(&self, tenant: &str) -> ChargingResult<usize> {
        self.inner.profile_count(tenant).await
    }
}
