use async_trait::async_trait;
use jiff::Timestamp;
use linkhop_core::repository::Result;
use linkhop_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, trace};

/// DDL for the `urls` table. Safe to run repeatedly.
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// Postgres implementation of the repository contract.
///
/// Records live in the `urls` table (see `ddl/postgres/urls.sql`). The
/// unique index on `short_code` is the final authority on collisions;
/// violations surface as [`StorageError::Conflict`]. `created_at` is stored
/// as unix seconds.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `urls` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("Ensured urls schema");
        Ok(())
    }
}

fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let id: i64 = row.try_get("id").map_err(map_sqlx_error)?;
    let origin_url: String = row.try_get("origin_url").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        id,
        origin_url,
        short_code: ShortCode::new_unchecked(short_code),
        created_at: parse_created_at(created_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        trace!(code = %code, "Fetching URL record from Postgres");

        let row = sqlx::query(
            r#"
            SELECT id, origin_url, short_code, created_at
            FROM urls
            WHERE short_code = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_codes(&self) -> Result<Vec<ShortCode>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT short_code FROM urls")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(count = codes.len(), "Listed short codes from Postgres");
        Ok(codes.into_iter().map(ShortCode::new_unchecked).collect())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create(&self, origin_url: &str, code: &ShortCode) -> Result<UrlRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (origin_url, short_code, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, origin_url, short_code, created_at
            "#,
        )
        .bind(origin_url)
        .bind(code.as_str())
        .bind(Timestamp::now().as_second())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => record_from_row(&row),
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict(code.to_string())),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn update_code(
        &self,
        code: &ShortCode,
        new_code: &ShortCode,
    ) -> Result<Option<UrlRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET short_code = $2
            WHERE short_code = $1
            RETURNING id, origin_url, short_code, created_at
            "#,
        )
        .bind(code.as_str())
        .bind(new_code.as_str())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.as_ref().map(record_from_row).transpose(),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(new_code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let result = sqlx::query("DELETE FROM urls WHERE short_code = $1")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
