/**
 * Authentication Extractor
 *
 * Resolves the caller of a request from its session token. Browsers cannot
 * set headers on a WebSocket handshake, so the token is read from the
 * `Authorization: Bearer` header first and the `token` query parameter
 * second.
 */
use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::auth::Sessions;

/// Authenticated user data extracted from JWT token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Token carried by a request, if any
pub fn request_token(parts: &Parts) -> Option<String> {
    bearer_token(&parts.headers).or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
    })
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Axum extractor for authenticated user
///
/// Rejects with 401 when the token is missing or does not verify.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<Sessions>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(AuthUser(user.clone()));
        }

        let token = request_token(parts).ok_or_else(|| {
            tracing::warn!("[Auth] Missing session token for {}", parts.uri.path());
            StatusCode::UNAUTHORIZED
        })?;

        let sessions = Arc::<Sessions>::from_ref(state);
        let user = sessions.authenticate(&token).map_err(|err| {
            tracing::warn!("[Auth] Rejected session token: {}", err);
            StatusCode::UNAUTHORIZED
        })?;

        parts.extensions.insert(user.clone());
        Ok(AuthUser(user))
    }
}
