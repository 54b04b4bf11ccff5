use crate::models::{ClickEvent, Destination, NewClickEvent, ShortLink};
use crate::storage::trait_def::map_write_error;
use crate::storage::{RedirectTarget, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS destinations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                label TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                destination_url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_destinations_user ON destinations(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                destination_id INTEGER NOT NULL,
                alias TEXT NOT NULL UNIQUE,
                short_code TEXT NOT NULL UNIQUE,
                expires_at INTEGER,
                rate_limit INTEGER NOT NULL DEFAULT 0,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_short_links_destination ON short_links(destination_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_link_id INTEGER NOT NULL,
                ip TEXT NOT NULL,
                country TEXT NOT NULL DEFAULT 'Unknown',
                region TEXT NOT NULL DEFAULT 'Unknown',
                city TEXT NOT NULL DEFAULT 'Unknown',
                device TEXT NOT NULL DEFAULT 'Unknown',
                browser TEXT NOT NULL DEFAULT 'Unknown',
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_click_events_link_time ON click_events(short_link_id, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_destination(
        &self,
        user_id: &str,
        label: &str,
        description: &str,
        destination_url: &str,
    ) -> Result<Destination> {
        let now = Utc::now().timestamp();

        let id = sqlx::query(
            r#"
            INSERT INTO destinations (user_id, label, description, destination_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(label)
        .bind(description)
        .bind(destination_url)
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?
        .last_insert_rowid();

        let destination = sqlx::query_as::<_, Destination>(
            r#"
            SELECT id, user_id, label, description, destination_url, created_at, updated_at
            FROM destinations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(destination)
    }

    async fn get_destination(&self, user_id: &str, id: i64) -> Result<Option<Destination>> {
        let destination = sqlx::query_as::<_, Destination>(
            r#"
            SELECT id, user_id, label, description, destination_url, created_at, updated_at
            FROM destinations
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(destination)
    }

    async fn list_destinations(&self, user_id: &str) -> Result<Vec<Destination>> {
        let destinations = sqlx::query_as::<_, Destination>(
            r#"
            SELECT id, user_id, label, description, destination_url, created_at, updated_at
            FROM destinations
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(destinations)
    }

    async fn update_destination(
        &self,
        user_id: &str,
        id: i64,
        label: Option<&str>,
        description: Option<&str>,
        destination_url: Option<&str>,
    ) -> Result<Option<Destination>> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE destinations
            SET label = COALESCE(?, label),
                description = COALESCE(?, description),
                destination_url = COALESCE(?, destination_url),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(label)
        .bind(description)
        .bind(destination_url)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_destination(user_id, id).await
    }

    async fn delete_destination(&self, user_id: &str, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM destinations WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if owned == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // Children first so no short link survives its destination.
        sqlx::query("DELETE FROM short_links WHERE destination_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM destinations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn create_short_link(
        &self,
        destination_id: i64,
        alias: &str,
        short_code: &str,
        expires_at: Option<i64>,
        rate_limit: i64,
    ) -> StorageResult<ShortLink> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO short_links (destination_id, alias, short_code, expires_at, rate_limit, usage_count, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(destination_id)
        .bind(alias)
        .bind(short_code)
        .bind(expires_at)
        .bind(rate_limit)
        .bind(now)
        .execute(self.pool.as_ref())
        .await
        .map_err(map_write_error)?;

        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT id, destination_id, alias, short_code, expires_at, rate_limit, usage_count, created_at
            FROM short_links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(link)
    }

    async fn get_short_link(&self, user_id: &str, id: i64) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT s.id, s.destination_id, s.alias, s.short_code, s.expires_at, s.rate_limit, s.usage_count, s.created_at
            FROM short_links s
            JOIN destinations d ON s.destination_id = d.id
            WHERE s.id = ? AND d.user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_short_links(&self, destination_id: i64) -> Result<Vec<ShortLink>> {
        let links = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT id, destination_id, alias, short_code, expires_at, rate_limit, usage_count, created_at
            FROM short_links
            WHERE destination_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(destination_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn list_short_links_for_user(&self, user_id: &str) -> Result<Vec<ShortLink>> {
        let links = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT s.id, s.destination_id, s.alias, s.short_code, s.expires_at, s.rate_limit, s.usage_count, s.created_at
            FROM short_links s
            JOIN destinations d ON s.destination_id = d.id
            WHERE d.user_id = ?
            ORDER BY s.created_at DESC, s.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn update_short_link(
        &self,
        user_id: &str,
        id: i64,
        alias: Option<&str>,
        expires_at: Option<i64>,
        rate_limit: Option<i64>,
    ) -> StorageResult<Option<ShortLink>> {
        if self.get_short_link(user_id, id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE short_links
            SET alias = COALESCE(?, alias),
                expires_at = COALESCE(?, expires_at),
                rate_limit = COALESCE(?, rate_limit)
            WHERE id = ?
            "#,
        )
        .bind(alias)
        .bind(expires_at)
        .bind(rate_limit)
        .bind(id)
        .execute(self.pool.as_ref())
        .await
        .map_err(map_write_error)?;

        Ok(self.get_short_link(user_id, id).await?)
    }

    async fn delete_short_link(&self, user_id: &str, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM short_links
            WHERE id = ? AND destination_id IN (SELECT id FROM destinations WHERE user_id = ?)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM short_links WHERE alias = ?")
            .bind(alias)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn find_for_redirect(&self, short_code: &str) -> Result<Option<RedirectTarget>> {
        let target = sqlx::query_as::<_, RedirectTarget>(
            r#"
            SELECT s.id, s.destination_id, s.alias, s.short_code, s.expires_at, s.rate_limit, s.usage_count, s.created_at,
                   d.destination_url
            FROM short_links s
            JOIN destinations d ON s.destination_id = d.id
            WHERE s.short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(target)
    }

    async fn increment_usage(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE short_links SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn record_click(&self, event: &NewClickEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO click_events (short_link_id, ip, country, region, city, device, browser, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.short_link_id)
        .bind(&event.ip)
        .bind(&event.country)
        .bind(&event.region)
        .bind(&event.city)
        .bind(&event.device)
        .bind(&event.browser)
        .bind(event.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn clicks_since(&self, short_link_ids: &[i64], since: i64) -> Result<Vec<ClickEvent>> {
        if short_link_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; short_link_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT id, short_link_id, ip, country, region, city, device, browser, timestamp
            FROM click_events
            WHERE short_link_id IN ({}) AND timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
            placeholders
        );

        let mut query = sqlx::query_as::<_, ClickEvent>(&sql);
        for id in short_link_ids {
            query = query.bind(id);
        }

        let events = query.bind(since).fetch_all(self.pool.as_ref()).await?;
        Ok(events)
    }
}
