//! Authentication boundary.
//!
//! The rest of the application consumes exactly one fact from here: the
//! resolved user identity attached to each request. Handlers read it via
//! `Extension<AuthUser>` and scope every query by it.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AuthMode;

/// Resolved identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

pub struct AuthService {
    mode: AuthMode,
    api_keys: Arc<HashMap<String, String>>,
}

impl AuthService {
    pub fn new(mode: AuthMode, api_keys: HashMap<String, String>) -> Self {
        Self {
            mode,
            api_keys: Arc::new(api_keys),
        }
    }

    /// Resolve the caller's identity, or `None` when the request cannot be
    /// authenticated.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<AuthUser> {
        match self.mode {
            // Development mode: trust the X-User-Id header.
            AuthMode::None => {
                let user = headers
                    .get("x-user-id")
                    .and_then(|h| h.to_str().ok())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("anonymous");
                Some(AuthUser(user.to_string()))
            }
            AuthMode::ApiKey => {
                let key = headers.get("x-api-key").and_then(|h| h.to_str().ok())?;
                self.api_keys.get(key).map(|user| AuthUser(user.clone()))
            }
        }
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(&headers) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid or missing API key" })),
        )
            .into_response(),
    }
}
