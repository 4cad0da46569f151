//! Tenancy Module
//!
//! Routes every request to its tenant's own database.
//!
//! # Architecture
//!
//! - **`vault`** - AES-256-GCM sealing of tenant credentials
//! - **`directory`** - TTL cache of tenant metadata keyed by domain
//! - **`pool`** - One live database handle per tenant domain
//! - **`store`** - Admin table access and the connection opener
//!
//! ```text
//! tenancy/
//! ├── mod.rs       - Tenant record, credentials, errors
//! ├── vault.rs     - Credential Vault
//! ├── directory.rs - Tenant Directory Cache
//! ├── pool.rs      - Connection Pool
//! └── store.rs     - Backing store and opener traits, Postgres impls
//! ```
//!
//! Metadata caching and connection pooling have independent lifetimes:
//! a tenant whose cache entry went stale keeps its pooled connection.

pub mod directory;
pub mod pool;
pub mod store;
pub mod vault;

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use directory::TenantDirectory;
pub use pool::{TenantConnection, TenantConnections};
pub use store::{ConnectionOpener, PgConnector, PgTenantStore, TenantStore};
pub use vault::{Vault, VaultError};

/// Tenant row of the admin database
///
/// The `db_*` fields hold vault ciphertexts, not plain values.
#[derive(Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub db_host: String,
    pub db_port: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Tenant schema has been applied
    pub migrated: bool,
    /// `false` means the tenant is deactivated
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("migrated", &self.migrated)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Decrypted connection parameters of a tenant database
#[derive(Clone)]
pub struct TenantCredentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl TenantCredentials {
    /// Decrypt the sealed `db_*` columns of a tenant
    pub fn unseal(tenant: &Tenant, vault: &Vault) -> Result<Self, TenantError> {
        let open = |sealed: &str| {
            vault.decrypt(sealed).map_err(|source| TenantError::Vault {
                domain: tenant.domain.clone(),
                source,
            })
        };

        let port = open(&tenant.db_port)?;
        let port = port.trim().parse::<u16>().map_err(|_| TenantError::Credentials {
            domain: tenant.domain.clone(),
            reason: "port is not a valid number",
        })?;

        Ok(Self {
            host: open(&tenant.db_host)?,
            port,
            user: open(&tenant.db_user)?,
            password: open(&tenant.db_password)?,
            database: open(&tenant.db_name)?,
        })
    }
}

impl fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Errors raised while resolving a tenant connection
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant not found: {domain}")]
    NotFound { domain: String },

    #[error("tenant inactive: {domain}")]
    Inactive { domain: String },

    #[error("cannot decrypt credentials of tenant {domain}")]
    Vault {
        domain: String,
        #[source]
        source: VaultError,
    },

    #[error("invalid credentials for tenant {domain}: {reason}")]
    Credentials { domain: String, reason: &'static str },

    #[error("cannot connect to database of tenant {domain}")]
    Connect {
        domain: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("cannot migrate database of tenant {domain}")]
    Migrate {
        domain: String,
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    #[error("tenant directory query failed")]
    Store(#[from] sqlx::Error),
}

/// The three classes callers act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantErrorKind {
    NotFound,
    Inactive,
    Infrastructure,
}

impl TenantError {
    pub fn kind(&self) -> TenantErrorKind {
        match self {
            Self::NotFound { .. } => TenantErrorKind::NotFound,
            Self::Inactive { .. } => TenantErrorKind::Inactive,
            _ => TenantErrorKind::Infrastructure,
        }
    }
}
