use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::models::{
    CreateDestinationRequest, CreateShortLinkRequest, Destination, ShortLink,
    UpdateDestinationRequest, UpdateShortLinkRequest,
};
use crate::qr;
use crate::storage::{Storage, StorageError};
use crate::validate;

use super::error::ApiError;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    /// Base URL short links resolve under, used for QR payloads.
    pub public_base_url: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

const SHORT_CODE_LEN: usize = 8;
const SHORT_CODE_ATTEMPTS: usize = 10;
const ALIAS_SUFFIX_ATTEMPTS: u32 = 100;

/// Generate a random alphanumeric short code.
fn generate_short_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

// Destinations

pub async fn list_destinations(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<Destination>>, ApiError> {
    let destinations = state.storage.list_destinations(&user).await?;
    Ok(Json(destinations))
}

pub async fn create_destination(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(payload): Json<CreateDestinationRequest>,
) -> Result<(StatusCode, Json<Destination>), ApiError> {
    validate::validate_label(&payload.label)?;
    validate::validate_destination_url(&payload.destination_url)?;

    let description = payload.description.unwrap_or_default();
    let destination = state
        .storage
        .create_destination(
            &user,
            payload.label.trim(),
            description.trim(),
            &payload.destination_url,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(destination)))
}

pub async fn get_destination(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Destination>, ApiError> {
    let destination = state
        .storage
        .get_destination(&user, id)
        .await?
        .ok_or(ApiError::NotFound("Destination"))?;

    Ok(Json(destination))
}

pub async fn update_destination(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDestinationRequest>,
) -> Result<Json<Destination>, ApiError> {
    if let Some(label) = &payload.label {
        validate::validate_label(label)?;
    }
    if let Some(url) = &payload.destination_url {
        validate::validate_destination_url(url)?;
    }

    let destination = state
        .storage
        .update_destination(
            &user,
            id,
            payload.label.as_deref().map(str::trim),
            payload.description.as_deref().map(str::trim),
            payload.destination_url.as_deref(),
        )
        .await?
        .ok_or(ApiError::NotFound("Destination"))?;

    Ok(Json(destination))
}

pub async fn delete_destination(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.storage.delete_destination(&user, id).await? {
        Ok(Json(SuccessResponse {
            message: "Destination deleted successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFound("Destination"))
    }
}

// Short links

pub async fn create_short_link(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(payload): Json<CreateShortLinkRequest>,
) -> Result<(StatusCode, Json<ShortLink>), ApiError> {
    // Ownership gate; a foreign destination is indistinguishable from an
    // absent one.
    let destination = state
        .storage
        .get_destination(&user, payload.destination_id)
        .await?
        .ok_or(ApiError::NotFound("Destination"))?;

    let rate_limit = payload.rate_limit.unwrap_or(0);
    if rate_limit < 0 {
        return Err(ApiError::Validation(
            "Rate limit cannot be negative".to_string(),
        ));
    }

    let alias = match &payload.alias {
        Some(raw) => {
            let alias = validate::normalize_alias(raw);
            validate::validate_alias(&alias)?;
            alias
        }
        None => derive_unique_alias(state.storage.as_ref(), &destination.label).await?,
    };

    // A fresh code is drawn on every conflict; a taken alias is surfaced to
    // the caller instead of retried.
    let mut attempts = 0;
    loop {
        let short_code = generate_short_code();
        match state
            .storage
            .create_short_link(
                destination.id,
                &alias,
                &short_code,
                payload.expires_at,
                rate_limit,
            )
            .await
        {
            Ok(link) => return Ok((StatusCode::CREATED, Json(link))),
            Err(StorageError::Conflict) => {
                if state.storage.alias_exists(&alias).await? {
                    return Err(ApiError::AliasExists);
                }
                attempts += 1;
                if attempts >= SHORT_CODE_ATTEMPTS {
                    return Err(ApiError::CodeExhausted);
                }
            }
            Err(StorageError::Other(e)) => return Err(ApiError::Internal(e)),
        }
    }
}

/// Derive an alias from the destination label, appending `-1`, `-2`, ...
/// until it no longer collides.
async fn derive_unique_alias(storage: &dyn Storage, label: &str) -> Result<String, ApiError> {
    let base = validate::derive_alias(label);

    if !storage.alias_exists(&base).await? {
        return Ok(base);
    }

    for n in 1..=ALIAS_SUFFIX_ATTEMPTS {
        let candidate = format!("{}-{}", base, n);
        if !storage.alias_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(ApiError::AliasExists)
}

pub async fn list_short_links(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(destination_id): Path<i64>,
) -> Result<Json<Vec<ShortLink>>, ApiError> {
    let destination = state
        .storage
        .get_destination(&user, destination_id)
        .await?
        .ok_or(ApiError::NotFound("Destination"))?;

    let links = state.storage.list_short_links(destination.id).await?;
    Ok(Json(links))
}

pub async fn get_short_link(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<ShortLink>, ApiError> {
    let link = state
        .storage
        .get_short_link(&user, id)
        .await?
        .ok_or(ApiError::NotFound("Short link"))?;

    Ok(Json(link))
}

pub async fn update_short_link(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateShortLinkRequest>,
) -> Result<Json<ShortLink>, ApiError> {
    let alias = match &payload.alias {
        Some(raw) => {
            let alias = validate::normalize_alias(raw);
            validate::validate_alias(&alias)?;
            Some(alias)
        }
        None => None,
    };

    if let Some(rate_limit) = payload.rate_limit {
        if rate_limit < 0 {
            return Err(ApiError::Validation(
                "Rate limit cannot be negative".to_string(),
            ));
        }
    }

    let link = state
        .storage
        .update_short_link(
            &user,
            id,
            alias.as_deref(),
            payload.expires_at,
            payload.rate_limit,
        )
        .await?
        .ok_or(ApiError::NotFound("Short link"))?;

    Ok(Json(link))
}

pub async fn delete_short_link(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.storage.delete_short_link(&user, id).await? {
        Ok(Json(SuccessResponse {
            message: "Short link deleted successfully".to_string(),
        }))
    } else {
        Err(ApiError::NotFound("Short link"))
    }
}

/// QR code for the public redirect URL of an owned short link.
pub async fn short_link_qr(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let link = state
        .storage
        .get_short_link(&user, id)
        .await?
        .ok_or(ApiError::NotFound("Short link"))?;

    let url = format!(
        "{}/{}",
        state.public_base_url.trim_end_matches('/'),
        link.short_code
    );
    let png = qr::encode_png(&url).map_err(|e| ApiError::Internal(e.into()))?;

    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"qr-{}.png\"", link.alias),
        ),
    ];

    Ok((headers, png))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
