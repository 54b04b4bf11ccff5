use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::analytics::{extract_client_ip, GeoResolver};
use crate::models::{Device, NewClickEvent};
use crate::storage::{RedirectTarget, Storage};

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub geo: Arc<GeoResolver>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Resolve a public short code and redirect to its destination.
///
/// Expired and rate-limited links are refused before any write happens.
/// The click append and the usage-counter increment are two independent
/// best-effort writes; a failure in either is logged and does not abort
/// the redirect.
pub async fn redirect_short_link(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let target = match state.storage.find_for_redirect(&code).await {
        Ok(Some(target)) => target,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Short link not found"),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "redirect lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let now = Utc::now().timestamp();

    if let Some(expires_at) = target.expires_at {
        if now > expires_at {
            return error_response(StatusCode::GONE, "Short link has expired");
        }
    }

    if target.rate_limit > 0 && target.usage_count >= target.rate_limit {
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    }

    record_click(&state, &target, &headers, addr.ip(), now).await;

    if let Err(err) = state.storage.increment_usage(target.id).await {
        tracing::warn!(short_code = %code, error = %err, "failed to increment usage counter");
    }

    Redirect::temporary(&target.destination_url).into_response()
}

async fn record_click(
    state: &RedirectState,
    target: &RedirectTarget,
    headers: &HeaderMap,
    socket_ip: IpAddr,
    now: i64,
) {
    let client_ip = extract_client_ip(headers, socket_ip);
    let location = state.geo.lookup(client_ip);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ua| !ua.is_empty());

    let event = NewClickEvent {
        short_link_id: target.id,
        ip: client_ip.to_string(),
        country: location.country,
        region: location.region,
        city: location.city,
        device: Device::classify(user_agent).as_str().to_string(),
        browser: user_agent.unwrap_or("Unknown").to_string(),
        timestamp: now,
    };

    if let Err(err) = state.storage.record_click(&event).await {
        tracing::warn!(short_code = %target.short_code, error = %err, "failed to record click event");
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
