use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::svr::AppState;
use crate::error::ApiError;

/// Proof that the request carried `Authorization: Bearer <api token>`.
///
/// Put it first in a handler's arguments so the check runs before the body
/// is read or a WebSocket upgrade is accepted.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

impl FromRequestParts<Arc<AppState>> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if authenticate(&parts.headers, state.api_token()) {
            return Ok(Authorized);
        }

        match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(remote)) => tracing::warn!(%remote, "auth error"),
            None => tracing::warn!("auth error"),
        }
        Err(ApiError::Unauthorized)
    }
}

/// An empty secret never authenticates anyone.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> bool {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => !secret.is_empty() && token == secret,
        _ => false,
    }
}
