/**
 * Admin Database
 *
 * The admin database holds the tenant directory. It is required: without
 * it no request can be routed, so a failed connection aborts startup.
 * A failed migration is logged and startup continues, since the schema
 * may already be in place.
 */
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connect to the admin database and apply its migrations
pub async fn load_admin_database(database_url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::info!("[Server] Connecting to admin database...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!("[Server] Running admin database migrations...");
    match sqlx::migrate!("./migrations/admin").run(&pool).await {
        Ok(()) => tracing::info!("[Server] Admin database migrations completed"),
        Err(err) => {
            tracing::error!("[Server] Failed to run admin migrations: {}", err);
            tracing::warn!("[Server] Continuing; the tenants table might not be up to date");
        }
    }

    Ok(pool)
}
