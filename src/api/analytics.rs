//! Analytics read endpoints: per short link, per destination, and the
//! per-user overview. Each accepts a lookback window in days and returns
//! the aggregated summary alongside the raw events it was computed from.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{aggregate, ClickSummary};
use crate::auth::AuthUser;
use crate::models::{ClickEvent, Destination, ShortLink};

use super::error::ApiError;
use super::handlers::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Lookback window in days.
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

fn window_start(days: i64) -> i64 {
    let days = days.clamp(1, 3650);
    Utc::now().timestamp() - days * 86_400
}

#[derive(Serialize)]
pub struct ShortLinkAnalyticsResponse {
    pub short_link: ShortLink,
    pub analytics: ClickSummary,
    pub raw_data: Vec<ClickEvent>,
}

/// Per-link row in the destination breakdown: lifetime usage counter plus
/// clicks inside the requested window.
#[derive(Serialize)]
pub struct ShortLinkBreakdown {
    pub id: i64,
    pub alias: String,
    pub short_code: String,
    pub usage_count: i64,
    pub clicks: u64,
}

#[derive(Serialize)]
pub struct DestinationAnalyticsResponse {
    pub destination: Destination,
    pub short_links: Vec<ShortLinkBreakdown>,
    pub analytics: ClickSummary,
    pub raw_data: Vec<ClickEvent>,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub total_destinations: usize,
    pub total_short_links: usize,
    pub total_clicks: u64,
    pub analytics: ClickSummary,
    pub raw_data: Vec<ClickEvent>,
}

pub async fn short_link_analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<ShortLinkAnalyticsResponse>, ApiError> {
    let link = state
        .storage
        .get_short_link(&user, id)
        .await?
        .ok_or(ApiError::NotFound("Short link"))?;

    let events = state
        .storage
        .clicks_since(&[link.id], window_start(params.days))
        .await?;

    Ok(Json(ShortLinkAnalyticsResponse {
        analytics: aggregate(&events),
        short_link: link,
        raw_data: events,
    }))
}

pub async fn destination_analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<DestinationAnalyticsResponse>, ApiError> {
    let destination = state
        .storage
        .get_destination(&user, id)
        .await?
        .ok_or(ApiError::NotFound("Destination"))?;

    let links = state.storage.list_short_links(destination.id).await?;
    let link_ids: Vec<i64> = links.iter().map(|l| l.id).collect();

    let events = state
        .storage
        .clicks_since(&link_ids, window_start(params.days))
        .await?;

    let short_links = links
        .iter()
        .map(|link| ShortLinkBreakdown {
            id: link.id,
            alias: link.alias.clone(),
            short_code: link.short_code.clone(),
            usage_count: link.usage_count,
            clicks: events.iter().filter(|e| e.short_link_id == link.id).count() as u64,
        })
        .collect();

    Ok(Json(DestinationAnalyticsResponse {
        destination,
        short_links,
        analytics: aggregate(&events),
        raw_data: events,
    }))
}

pub async fn overview_analytics(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let destinations = state.storage.list_destinations(&user).await?;
    let links = state.storage.list_short_links_for_user(&user).await?;
    let link_ids: Vec<i64> = links.iter().map(|l| l.id).collect();

    let events = state
        .storage
        .clicks_since(&link_ids, window_start(params.days))
        .await?;

    Ok(Json(OverviewResponse {
        total_destinations: destinations.len(),
        total_short_links: links.len(),
        total_clicks: events.len() as u64,
        analytics: aggregate(&events),
        raw_data: events,
    }))
}
