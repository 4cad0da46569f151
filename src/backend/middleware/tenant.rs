/**
 * Tenant Resolution Middleware
 *
 * Every tenant-scoped request is bound to the tenant named by the first
 * label of its host (`acme.example.com:8080` belongs to `acme`). The
 * middleware resolves that tenant to its live database handle and stores
 * both in the request extensions as a `TenantContext`, which handlers read
 * back through the `TenantDb` extractor.
 *
 * Failures end the request:
 * - no host, or an unknown tenant: 404
 * - a deactivated tenant: 403
 * - anything else: 500, logged here and never shown to the client
 *
 * WebSocket handshakes get a bare status, since browsers do not expose the
 * body of a failed upgrade. Other requests get the JSON error body.
 */
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::backend::error::BackendError;
use crate::backend::tenancy::{Tenant, TenantConnections, TenantErrorKind};

/// The tenant a request belongs to and its database handle
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: Arc<Tenant>,
    pub db: PgPool,
}

/// Tenant key of a host: the first label, lowercased, without the port
pub fn tenant_key(host: &str) -> Option<String> {
    let host = host.trim();
    if host.starts_with('[') {
        return None;
    }
    let host = host.rsplit_once(':').map_or(host, |(name, _port)| name);
    let label = host.split('.').next()?.trim().to_ascii_lowercase();
    (!label.is_empty()).then_some(label)
}

/// Host of a request: the `Host` header, else the URI authority
pub fn request_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|authority| authority.as_str().to_string()))
}

pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("upgrade"));
    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
    connection_upgrade && upgrade_websocket
}

pub async fn tenant_middleware(
    State(tenants): State<Arc<TenantConnections<PgPool>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let upgrade = is_websocket_upgrade(request.headers());

    let Some(key) = request_host(&request).as_deref().and_then(tenant_key) else {
        tracing::debug!("[Tenant] Request without a usable host: {}", request.uri());
        return reject(StatusCode::NOT_FOUND, "tenant not found", upgrade);
    };

    match tenants.get_connection(&key).await {
        Ok(connection) => {
            request.extensions_mut().insert(TenantContext {
                tenant: connection.tenant,
                db: connection.db,
            });
            next.run(request).await
        }
        Err(err) => {
            let status = match err.kind() {
                TenantErrorKind::NotFound => {
                    tracing::debug!("[Tenant] {}", err);
                    StatusCode::NOT_FOUND
                }
                TenantErrorKind::Inactive => {
                    tracing::info!("[Tenant] {}", err);
                    StatusCode::FORBIDDEN
                }
                TenantErrorKind::Infrastructure => {
                    tracing::error!("[Tenant] Failed to resolve {}: {}", key, err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let message = BackendError::from(err).message();
            reject(status, &message, upgrade)
        }
    }
}

fn reject(status: StatusCode, message: &str, upgrade: bool) -> Response {
    if upgrade {
        status.into_response()
    } else {
        BackendError::handler(status, message).into_response()
    }
}

/// Extractor for the `TenantContext` stored by `tenant_middleware`
#[derive(Debug, Clone)]
pub struct TenantDb(pub TenantContext);

impl<S: Send + Sync> FromRequestParts<S> for TenantDb {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(TenantDb)
            .ok_or_else(|| {
                tracing::error!("[Tenant] Route {} is missing the tenant middleware", parts.uri.path());
                BackendError::handler(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            })
    }
}
