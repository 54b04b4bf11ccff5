use crate::models::{ClickEvent, Destination, NewClickEvent, ShortLink};
use crate::storage::trait_def::map_write_error;
use crate::storage::{RedirectTarget, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS destinations (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                label TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                destination_url TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
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
                id BIGSERIAL PRIMARY KEY,
                destination_id BIGINT NOT NULL,
                alias TEXT NOT NULL UNIQUE,
                short_code TEXT NOT NULL UNIQUE,
                expires_at BIGINT,
                rate_limit BIGINT NOT NULL DEFAULT 0,
                usage_count BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
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
                id BIGSERIAL PRIMARY KEY,
                short_link_id BIGINT NOT NULL,
                ip TEXT NOT NULL,
                country TEXT NOT NULL DEFAULT 'Unknown',
                region TEXT NOT NULL DEFAULT 'Unknown',
                city TEXT NOT NULL DEFAULT 'Unknown',
                device TEXT NOT NULL DEFAULT 'Unknown',
                browser TEXT NOT NULL DEFAULT 'Unknown',
                timestamp BIGINT NOT NULL
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

        let destination = sqlx::query_as::<_, Destination>(
            r#"
            INSERT INTO destinations (user_id, label, description, destination_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, label, description, destination_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(label)
        .bind(description)
        .bind(destination_url)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(destination)
    }

    async fn get_destination(&self, user_id: &str, id: i64) -> Result<Option<Destination>> {
        let destination = sqlx::query_as::<_, Destination>(
            r#"
            SELECT id, user_id, label, description, destination_url, created_at, updated_at
            FROM destinations
            WHERE id = $1 AND user_id = $2
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
            WHERE user_id = $1
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

        let destination = sqlx::query_as::<_, Destination>(
            r#"
            UPDATE destinations
            SET label = COALESCE($1, label),
                description = COALESCE($2, description),
                destination_url = COALESCE($3, destination_url),
                updated_at = $4
            WHERE id = $5 AND user_id = $6
            RETURNING id, user_id, label, description, destination_url, created_at, updated_at
            "#,
        )
        .bind(label)
        .bind(description)
        .bind(destination_url)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(destination)
    }

    async fn delete_destination(&self, user_id: &str, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM destinations WHERE id = $1 AND user_id = $2",
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
        sqlx::query("DELETE FROM short_links WHERE destination_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM destinations WHERE id = $1")
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

        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            INSERT INTO short_links (destination_id, alias, short_code, expires_at, rate_limit, usage_count, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING id, destination_id, alias, short_code, expires_at, rate_limit, usage_count, created_at
            "#,
        )
        .bind(destination_id)
        .bind(alias)
        .bind(short_code)
        .bind(expires_at)
        .bind(rate_limit)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_write_error)?;

        Ok(link)
    }

    async fn get_short_link(&self, user_id: &str, id: i64) -> Result<Option<ShortLink>> {
        let link = sqlx::query_as::<_, ShortLink>(
            r#"
            SELECT s.id, s.destination_id, s.alias, s.short_code, s.expires_at, s.rate_limit, s.usage_count, s.created_at
            FROM short_links s
            JOIN destinations d ON s.destination_id = d.id
            WHERE s.id = $1 AND d.user_id = $2
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
            WHERE destination_id = $1
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
            WHERE d.user_id = $1
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
            SET alias = COALESCE($1, alias),
                expires_at = COALESCE($2, expires_at),
                rate_limit = COALESCE($3, rate_limit)
            WHERE id = $4
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
            WHERE id = $1 AND destination_id IN (SELECT id FROM destinations WHERE user_id = $2)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn alias_exists(&self, alias: &str) -> Result<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM short_links WHERE alias = $1")
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
            WHERE s.short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(target)
    }

    async fn increment_usage(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE short_links SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn record_click(&self, event: &NewClickEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO click_events (short_link_id, ip, country, region, city, device, browser, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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

        let events = sqlx::query_as::<_, ClickEvent>(
            r#"
            SELECT id, short_link_id, ip, country, region, city, device, browser, timestamp
            FROM click_events
            WHERE short_link_id = ANY($1) AND timestamp >= $2
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(short_link_ids)
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }
}
