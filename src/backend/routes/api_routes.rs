//! HTTP API endpoints
//!
//! - `GET /health` - returns `ok`
//! - `GET /v1/tenant` - the tenant the request resolved to

use axum::{routing::get, Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::middleware::TenantDb;
use crate::backend::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub id: Uuid,
    pub domain: String,
    pub migrated: bool,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn current_tenant(TenantDb(context): TenantDb) -> Json<TenantSummary> {
    Json(TenantSummary {
        id: context.tenant.id,
        domain: context.tenant.domain.clone(),
        migrated: context.tenant.migrated,
    })
}

pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/v1/tenant", get(current_tenant))
}
