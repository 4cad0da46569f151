//! Operator endpoints
//!
//! `POST /admin/tenants/{domain}/invalidate` drops the cached metadata and
//! the pooled connection of a tenant after its credentials or status were
//! changed in the admin database, and retires its buffered writers so they
//! reopen against the new connection. Requires
//! `Authorization: Bearer <ADMIN_TOKEN>`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use crate::backend::error::BackendError;
use crate::backend::middleware::auth::bearer_token;
use crate::backend::server::state::AppState;

pub async fn invalidate_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(domain): Path<String>,
) -> Result<Json<Value>, BackendError> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| BackendError::handler(StatusCode::NOT_FOUND, "not found"))?;
    if bearer_token(&headers).as_deref() != Some(expected) {
        tracing::warn!("[Admin] Rejected invalidate request for {}", domain);
        return Err(BackendError::handler(StatusCode::UNAUTHORIZED, "invalid admin token"));
    }

    let domain = domain.to_ascii_lowercase();
    if let Some(tenant) = state.tenants.directory().cached(&domain).await {
        state.writers.retire(tenant.id).await;
    }
    let invalidated = state.tenants.invalidate(&domain).await;

    tracing::info!("[Admin] Invalidated tenant {} (had state: {})", domain, invalidated);
    Ok(Json(json!({ "domain": domain, "invalidated": invalidated })))
}

pub fn configure_admin_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/admin/tenants/{domain}/invalidate", post(invalidate_tenant))
}
