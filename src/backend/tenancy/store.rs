//! Tenant backing store and connection opener
//!
//! Two seams keep the pool independent of Postgres: `TenantStore` reads
//! tenant rows from the admin database and `ConnectionOpener` turns
//! decrypted credentials into a live handle.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use super::{Tenant, TenantCredentials};

/// Read access to the admin tenants table
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, sqlx::Error>;

    /// Record that the tenant schema has been applied
    async fn mark_migrated(&self, tenant_id: Uuid) -> Result<(), sqlx::Error>;
}

/// Opens the database handle of one tenant
#[async_trait]
pub trait ConnectionOpener<H: Send + Sync + 'static>: Send + Sync {
    async fn open(&self, tenant: &Tenant, credentials: &TenantCredentials) -> Result<H, sqlx::Error>;

    /// Apply the tenant schema to a freshly opened handle
    async fn migrate(&self, _handle: &H) -> Result<(), sqlx::migrate::MigrateError> {
        Ok(())
    }
}

/// `TenantStore` over the admin database
#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, domain, db_host, db_port, db_user, db_password, db_name,
                   migrated, status, created_at, updated_at
            FROM tenants
            WHERE domain = $1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Tenant {
            id: r.get("id"),
            name: r.get("name"),
            domain: r.get("domain"),
            db_host: r.get("db_host"),
            db_port: r.get("db_port"),
            db_user: r.get("db_user"),
            db_password: r.get("db_password"),
            db_name: r.get("db_name"),
            migrated: r.get("migrated"),
            status: r.get("status"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn mark_migrated(&self, tenant_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tenants SET migrated = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Opens one `PgPool` per tenant database
#[derive(Debug, Clone)]
pub struct PgConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl ConnectionOpener<PgPool> for PgConnector {
    async fn open(&self, tenant: &Tenant, credentials: &TenantCredentials) -> Result<PgPool, sqlx::Error> {
        let options = PgConnectOptions::new()
            .host(&credentials.host)
            .port(credentials.port)
            .username(&credentials.user)
            .password(&credentials.password)
            .database(&credentials.database)
            .application_name("xfhub");

        tracing::debug!(
            "[Tenant] Opening pool for {} at {}:{}/{}",
            tenant.domain,
            credentials.host,
            credentials.port,
            credentials.database
        );

        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await
    }

    async fn migrate(&self, handle: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations/tenant").run(handle).await
    }
}
