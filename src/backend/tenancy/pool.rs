//! Connection Pool
//!
//! Hands out the live database handle of a tenant domain, opening it on
//! first use. Creation runs under a per-domain async gate, so a burst of
//! first requests for the same tenant performs one directory read and one
//! open. Requests for other tenants never wait on that gate.
//!
//! Handles are only dropped by `invalidate`; a stale metadata entry alone
//! does not evict the connection. A gate lives only while someone holds or
//! waits on it, so unknown hosts leave nothing behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::directory::TenantDirectory;
use super::store::{ConnectionOpener, TenantStore};
use super::vault::Vault;
use super::{Tenant, TenantCredentials, TenantError};

/// A resolved tenant and its database handle
#[derive(Debug, Clone)]
pub struct TenantConnection<H> {
    pub tenant: Arc<Tenant>,
    pub db: H,
}

pub struct TenantConnections<H: Clone + Send + Sync + 'static> {
    directory: TenantDirectory,
    opener: Arc<dyn ConnectionOpener<H>>,
    vault: Vault,
    handles: Mutex<HashMap<String, H>>,
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<H> TenantConnections<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn new(directory: TenantDirectory, opener: Arc<dyn ConnectionOpener<H>>, vault: Vault) -> Self {
        Self {
            directory,
            opener,
            vault,
            handles: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    pub fn store(&self) -> &Arc<dyn TenantStore> {
        self.directory.store()
    }

    /// Resolve `domain` to its tenant and live handle
    ///
    /// # Errors
    ///
    /// - `TenantError::NotFound` when no tenant owns the domain
    /// - `TenantError::Inactive` when the tenant is deactivated
    /// - any other variant for decryption, connection or directory failures
    pub async fn get_connection(&self, domain: &str) -> Result<TenantConnection<H>, TenantError> {
        if let Some(tenant) = self.directory.fresh(domain).await {
            ensure_active(&tenant)?;
            if let Some(db) = self.pooled(domain) {
                return Ok(TenantConnection { tenant, db });
            }
        }

        let gate = self.gate(domain);
        let _creating = gate.lock().await;

        let tenant = self.directory.resolve(domain).await?;
        ensure_active(&tenant)?;
        if let Some(db) = self.pooled(domain) {
            return Ok(TenantConnection { tenant, db });
        }

        let credentials = TenantCredentials::unseal(&tenant, &self.vault)?;
        let db = self
            .opener
            .open(&tenant, &credentials)
            .await
            .map_err(|source| TenantError::Connect {
                domain: domain.to_string(),
                source,
            })?;

        let tenant = if tenant.migrated {
            tenant
        } else {
            self.bootstrap_schema(domain, &tenant, &db).await?
        };

        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.to_string(), db.clone());
        tracing::info!("[Tenant] Opened database connection for {}", domain);

        Ok(TenantConnection { tenant, db })
    }

    /// Forget both the cached metadata and the pooled handle of `domain`
    ///
    /// Waits for an in-flight creation for the same domain so it cannot
    /// re-insert a handle afterwards.
    pub async fn invalidate(&self, domain: &str) -> bool {
        let gate = self.gate(domain);
        let _creating = gate.lock().await;

        let had_entry = self.directory.invalidate(domain).await;
        let had_handle = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(domain)
            .is_some();

        if had_entry || had_handle {
            tracing::info!("[Tenant] Invalidated {}", domain);
        }
        had_entry || had_handle
    }

    /// Number of domains with a creation or invalidation in flight
    pub fn gates_in_use(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of pooled handles
    pub fn open_connections(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn pooled(&self, domain: &str) -> Option<H> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
            .cloned()
    }

    fn gate(&self, domain: &str) -> GateLease<'_> {
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        GateLease {
            gates: &self.gates,
            domain: domain.to_string(),
            gate: Some(gate),
        }
    }

    async fn bootstrap_schema(&self, domain: &str, tenant: &Tenant, db: &H) -> Result<Arc<Tenant>, TenantError> {
        tracing::info!("[Tenant] Applying schema for {}", domain);
        self.opener.migrate(db).await.map_err(|source| TenantError::Migrate {
            domain: domain.to_string(),
            source,
        })?;
        self.directory.store().mark_migrated(tenant.id).await?;
        self.directory.mark_migrated(domain).await;

        let mut migrated = tenant.clone();
        migrated.migrated = true;
        Ok(Arc::new(migrated))
    }
}

/// A claim on the creation gate of one domain
///
/// Leases are taken and released under the gate map lock, so the last one
/// out sees a count of one and removes the entry.
struct GateLease<'a> {
    gates: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    domain: String,
    gate: Option<Arc<AsyncMutex<()>>>,
}

impl GateLease<'_> {
    async fn lock(&self) -> Option<OwnedMutexGuard<()>> {
        let gate = self.gate.clone()?;
        Some(gate.lock_owned().await)
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.gate.take());
        if gates.get(&self.domain).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(&self.domain);
        }
    }
}

fn ensure_active(tenant: &Tenant) -> Result<(), TenantError> {
    if tenant.is_active() {
        Ok(())
    } else {
        Err(TenantError::Inactive {
            domain: tenant.domain.clone(),
        })
    }
}
