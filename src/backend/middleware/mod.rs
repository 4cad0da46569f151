//! Middleware Module
//!
//! - **`tenant`** - Host to tenant resolution and the `TenantDb` extractor
//! - **`auth`** - Session token extraction and the `AuthUser` extractor

pub mod auth;
pub mod tenant;

pub use auth::{AuthUser, AuthenticatedUser};
pub use tenant::{tenant_middleware, TenantContext, TenantDb};
