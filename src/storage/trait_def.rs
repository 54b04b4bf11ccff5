use crate::models::{ClickEvent, Destination, NewClickEvent, ShortLink};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("alias or short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A short link joined with its destination URL, as needed by the public
/// redirect path.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RedirectTarget {
    pub id: i64,
    pub destination_id: i64,
    pub alias: String,
    pub short_code: String,
    pub expires_at: Option<i64>,
    pub rate_limit: i64,
    pub usage_count: i64,
    pub created_at: i64,
    pub destination_url: String,
}

/// Persistence boundary for destinations, short links and click events.
///
/// Every destination/short-link operation is scoped by the owning user;
/// records owned by someone else behave exactly like absent records. List
/// operations return newest-first.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    // Destinations

    async fn create_destination(
        &self,
        user_id: &str,
        label: &str,
        description: &str,
        destination_url: &str,
    ) -> Result<Destination>;

    async fn get_destination(&self, user_id: &str, id: i64) -> Result<Option<Destination>>;

    async fn list_destinations(&self, user_id: &str) -> Result<Vec<Destination>>;

    /// Partial update; `None` fields keep their stored value. Refreshes
    /// `updated_at`. Returns the updated record, or `None` if the caller
    /// owns no such destination.
    async fn update_destination(
        &self,
        user_id: &str,
        id: i64,
        label: Option<&str>,
        description: Option<&str>,
        destination_url: Option<&str>,
    ) -> Result<Option<Destination>>;

    /// Delete a destination and every short link referencing it, in one
    /// transaction. Returns false if the caller owns no such destination.
    /// Click events are left in place.
    async fn delete_destination(&self, user_id: &str, id: i64) -> Result<bool>;

    // Short links

    /// Insert a new short link. Alias and short-code uniqueness are
    /// enforced by the store; violations surface as
    /// [`StorageError::Conflict`].
    async fn create_short_link(
        &self,
        destination_id: i64,
        alias: &str,
        short_code: &str,
        expires_at: Option<i64>,
        rate_limit: i64,
    ) -> StorageResult<ShortLink>;

    /// Fetch a short link the given user owns (via its destination).
    async fn get_short_link(&self, user_id: &str, id: i64) -> Result<Option<ShortLink>>;

    async fn list_short_links(&self, destination_id: i64) -> Result<Vec<ShortLink>>;

    async fn list_short_links_for_user(&self, user_id: &str) -> Result<Vec<ShortLink>>;

    /// Partial update of alias/expiry/rate limit; `None` fields keep their
    /// stored value. A duplicate alias is a [`StorageError::Conflict`].
    async fn update_short_link(
        &self,
        user_id: &str,
        id: i64,
        alias: Option<&str>,
        expires_at: Option<i64>,
        rate_limit: Option<i64>,
    ) -> StorageResult<Option<ShortLink>>;

    /// Delete one short link; click events do not cascade.
    async fn delete_short_link(&self, user_id: &str, id: i64) -> Result<bool>;

    async fn alias_exists(&self, alias: &str) -> Result<bool>;

    /// Resolve a public short code to the link and its destination URL.
    async fn find_for_redirect(&self, short_code: &str) -> Result<Option<RedirectTarget>>;

    /// Atomic `usage_count = usage_count + 1`; never read-modify-write, so
    /// concurrent redirects cannot lose updates.
    async fn increment_usage(&self, id: i64) -> Result<()>;

    // Click events

    async fn record_click(&self, event: &NewClickEvent) -> Result<()>;

    /// All click events for the given short links at or after `since`,
    /// newest-first.
    async fn clicks_since(&self, short_link_ids: &[i64], since: i64) -> Result<Vec<ClickEvent>>;
}

/// Map a unique-constraint violation to `Conflict`; anything else stays a
/// generic storage failure.
pub(crate) fn map_write_error(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(ref db) = err {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StorageError::Conflict;
        }
    }
    StorageError::Other(err.into())
}
