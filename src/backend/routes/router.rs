/**
 * Router Configuration
 *
 * Assembles every route into one Axum router:
 *
 * - `GET /health` - liveness probe, no tenant needed
 * - `GET /ws/chat`, `GET /ws/direct`, `GET /v1/tenant` - tenant scoped,
 *   behind `tenant_middleware`
 * - `POST /admin/tenants/{domain}/invalidate` - only mounted when an
 *   admin token is configured
 *
 * The tenant middleware is a route layer, so unknown paths answer 404
 * without resolving a tenant.
 */
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::backend::middleware::tenant_middleware;
use crate::backend::routes::admin_routes::configure_admin_routes;
use crate::backend::routes::api_routes::{configure_api_routes, health};
use crate::backend::routes::socket_routes::configure_socket_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let tenant_scoped = configure_api_routes(configure_socket_routes(Router::new()))
        .route_layer(middleware::from_fn_with_state(app_state.tenants.clone(), tenant_middleware));

    let router = Router::new().route("/health", get(health)).merge(tenant_scoped);

    let router = if app_state.admin_token.is_some() {
        configure_admin_routes(router)
    } else {
        tracing::info!("[Server] ADMIN_TOKEN not set; admin routes disabled");
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(app_state)
}
