use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A long-form target URL registered by a user. Short links point at one of
/// these and are deleted along with it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Destination {
    pub id: i64,
    pub user_id: String,
    pub label: String,
    pub description: String,
    pub destination_url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateDestinationRequest {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub destination_url: String,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDestinationRequest {
    pub label: Option<String>,
    pub description: Option<String>,
    pub destination_url: Option<String>,
}
