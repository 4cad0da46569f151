//! Tenant Directory Cache
//!
//! Maps a tenant domain to its metadata row. Entries are served from memory
//! for `ttl`; after that the next `resolve` re-reads the backing store.
//! Lookups share a read lock and a refresh only takes the write lock for
//! the insert itself, never across the store query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::store::TenantStore;
use super::{Tenant, TenantError};

struct CacheEntry {
    tenant: Arc<Tenant>,
    refreshed_at: Instant,
}

pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn TenantStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TenantStore> {
        &self.store
    }

    /// Cached record if it is younger than the TTL, without any I/O
    pub async fn fresh(&self, domain: &str) -> Option<Arc<Tenant>> {
        let entries = self.entries.read().await;
        entries
            .get(domain)
            .filter(|entry| entry.refreshed_at.elapsed() < self.ttl)
            .map(|entry| entry.tenant.clone())
    }

    /// Cached record of any age, without any I/O
    pub async fn cached(&self, domain: &str) -> Option<Arc<Tenant>> {
        self.entries.read().await.get(domain).map(|entry| entry.tenant.clone())
    }

    /// Resolve a domain, reading the backing store on a miss or stale entry
    pub async fn resolve(&self, domain: &str) -> Result<Arc<Tenant>, TenantError> {
        if let Some(tenant) = self.fresh(domain).await {
            return Ok(tenant);
        }

        tracing::debug!("[Tenant] Cache miss for {}, reading tenant directory", domain);
        let found = self.store.find_by_domain(domain).await?;

        let mut entries = self.entries.write().await;
        match found {
            Some(tenant) => {
                let tenant = Arc::new(tenant);
                entries.insert(
                    domain.to_string(),
                    CacheEntry {
                        tenant: tenant.clone(),
                        refreshed_at: Instant::now(),
                    },
                );
                Ok(tenant)
            }
            None => {
                entries.remove(domain);
                Err(TenantError::NotFound {
                    domain: domain.to_string(),
                })
            }
        }
    }

    /// Flip the cached `migrated` flag after the schema was applied
    pub(crate) async fn mark_migrated(&self, domain: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(domain) {
            let mut tenant = (*entry.tenant).clone();
            tenant.migrated = true;
            entry.tenant = Arc::new(tenant);
        }
    }

    /// Drop the cached record; returns whether one was present
    pub async fn invalidate(&self, domain: &str) -> bool {
        self.entries.write().await.remove(domain).is_some()
    }
}
