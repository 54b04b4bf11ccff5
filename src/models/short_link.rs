use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A redirectable alias/short-code pair pointing at one destination.
///
/// `alias` is the human-chosen dashboard name; `short_code` is the
/// system-generated token resolved on the public redirect path. Both are
/// globally unique. `expires_at` of None means the link never expires and a
/// `rate_limit` of 0 means unlimited redirects.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShortLink {
    pub id: i64,
    pub destination_id: i64,
    pub alias: String,
    pub short_code: String,
    pub expires_at: Option<i64>,
    pub rate_limit: i64,
    pub usage_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateShortLinkRequest {
    pub destination_id: i64,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub rate_limit: Option<i64>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateShortLinkRequest {
    pub alias: Option<String>,
    pub expires_at: Option<i64>,
    pub rate_limit: Option<i64>,
}
