use std::str::FromStr as _;

use tracing::{debug, error};

use super::{IdPage, RecordId, RecordQuery, RecordSink, RecordSource, ResultChannel};
use crate::migrate::MigrationResult;

const LAST_RESULT: &str = "last_migration_result";

pub struct LocalDatabase {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("update rejected: record {0} does not exist")]
    UpdateRejected(RecordId),
    #[error("failed to encode {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode stored result: {0}")]
    DecodeResult(serde_json::Error),
}

pub struct Client {
    pool: sqlx::SqlitePool,
}

impl LocalDatabase {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open record db"))?
            .create_if_missing(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open record db"))?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_type TEXT NOT NULL,
                post_status TEXT NOT NULL DEFAULT 'publish',
                post_content TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS postmeta(
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                meta_key TEXT NOT NULL,
                meta_value TEXT,
                PRIMARY KEY(post_id, meta_key)
            );

            CREATE TABLE IF NOT EXISTS transients(
                name TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await
        .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to record db"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub fn client(&self) -> Client {
        Client {
            pool: self.pool.clone(),
        }
    }

    pub async fn insert_post(
        &self,
        post_type: &str,
        post_status: &str,
        post_content: &str,
    ) -> Result<RecordId, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO posts(post_type, post_status, post_content) VALUES (?, ?, ?)",
        )
        .bind(post_type)
        .bind(post_status)
        .bind(post_content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_meta(
        &self,
        post_id: RecordId,
        meta_key: &str,
        meta_value: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO postmeta(post_id, meta_key, meta_value)
            VALUES (?, ?, ?)
            ON CONFLICT(post_id, meta_key)
            DO UPDATE SET
                meta_value = EXCLUDED.meta_value
        "#,
        )
        .bind(post_id)
        .bind(meta_key)
        .bind(meta_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl RecordSource for Client {
    type Error = Error;

    async fn list_ids(
        &self,
        query: &RecordQuery<'_>,
        page: u32,
        per_page: u32,
    ) -> Result<IdPage, Self::Error> {
        let post_types = serde_json::to_string(query.post_types).map_err(Error::Encode)?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE
                post_type IN (SELECT value FROM json_each(?))
                AND EXISTS (
                    SELECT 1 FROM postmeta
                    WHERE postmeta.post_id = posts.id AND postmeta.meta_key = ?
                )
        "#,
        )
        .bind(&post_types)
        .bind(query.meta_key)
        .fetch_one(&self.pool)
        .await?;
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let ids = sqlx::query_scalar::<_, RecordId>(
            r#"
            SELECT id FROM posts
            WHERE
                post_type IN (SELECT value FROM json_each(?))
                AND EXISTS (
                    SELECT 1 FROM postmeta
                    WHERE postmeta.post_id = posts.id AND postmeta.meta_key = ?
                )
            ORDER BY id ASC
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(&post_types)
        .bind(query.meta_key)
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        debug!(page, per_page, total, found = ids.len(), "listed records");
        Ok(IdPage {
            ids,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn marker(&self, id: RecordId, meta_key: &str) -> Result<Option<String>, Self::Error> {
        let value = sqlx::query_scalar::<_, Option<String>>(
            "SELECT meta_value FROM postmeta WHERE post_id = ? AND meta_key = ?",
        )
        .bind(id)
        .bind(meta_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.flatten())
    }

    async fn content(&self, id: RecordId) -> Result<Option<String>, Self::Error> {
        let content = sqlx::query_scalar::<_, String>("SELECT post_content FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(content)
    }
}

impl RecordSink for Client {
    type Error = Error;

    async fn update_content(&self, id: RecordId, content: &str) -> Result<(), Self::Error> {
        let result = sqlx::query("UPDATE posts SET post_content = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::UpdateRejected(id));
        }
        Ok(())
    }
}

impl ResultChannel for Client {
    type Error = Error;

    async fn put_result(&self, result: &MigrationResult, ttl_secs: u64) -> Result<(), Self::Error> {
        let value = serde_json::to_string(result).map_err(Error::Encode)?;
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at = chrono::Utc::now().timestamp().saturating_add(ttl);
        sqlx::query(
            r#"
            INSERT INTO transients(name, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name)
            DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
        "#,
        )
        .bind(LAST_RESULT)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_result(&self) -> Result<Option<MigrationResult>, Self::Error> {
        let row = sqlx::query_as::<_, (String, i64)>(
            "DELETE FROM transients WHERE name = ? RETURNING value, expires_at",
        )
        .bind(LAST_RESULT)
        .fetch_optional(&self.pool)
        .await?;
        let Some((value, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= chrono::Utc::now().timestamp() {
            debug!(expires_at, "stored migration result expired");
            return Ok(None);
        }
        serde_json::from_str(&value)
            .map(Some)
            .map_err(Error::DecodeResult)
    }
}
