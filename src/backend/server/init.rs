/**
 * Server Initialization
 *
 * 1. Build the credential vault from the configured key
 * 2. Connect to the admin database
 * 3. Assemble the tenant directory and connection pool
 * 4. Build the application state and router
 *
 * Any failure here is fatal; the server never starts half-configured.
 */
use axum::Router;
use std::sync::Arc;

use crate::backend::error::BackendError;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_admin_database;
use crate::backend::server::state::AppState;
use crate::backend::tenancy::{PgConnector, PgTenantStore, TenantConnections, TenantDirectory, Vault};
use crate::shared::ServerConfig;

/// Create and configure the Axum application
///
/// Returns the state too, so the caller can flush buffered writes on
/// shutdown.
pub async fn create_app(config: &ServerConfig) -> Result<(Router, AppState), BackendError> {
    tracing::info!("[Server] Initializing xfhub with {:?}", config);

    let vault = Vault::from_secret(config.encryption_key.as_bytes())
        .map_err(|err| BackendError::startup(format!("credential vault: {}", err)))?;

    let admin = load_admin_database(&config.admin_database_url)
        .await
        .map_err(|err| BackendError::startup(format!("admin database: {}", err)))?;

    let directory = TenantDirectory::new(Arc::new(PgTenantStore::new(admin)), config.tenant_cache_ttl);
    let tenants = Arc::new(TenantConnections::new(
        directory,
        Arc::new(PgConnector::new(config.tenant_pool_max_connections)),
        vault,
    ));

    let state = AppState::new(config, tenants);
    let app = create_router(state.clone());

    tracing::info!("[Server] Router configured");
    Ok((app, state))
}
