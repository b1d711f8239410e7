use async_trait::async_trait;
use linkhop_core::filter::Result;
use linkhop_core::{FilterError, MembershipFilter, ShortCode};
use tracing::{debug, trace, warn};

/// Default RedisBloom key holding the short-code filter.
pub const DEFAULT_FILTER_KEY: &str = "url-filter";

/// A [`MembershipFilter`] backed by the RedisBloom module.
///
/// `reserve` maps to `BF.ADD`, which is atomic on the server: when several
/// instances race on the same code exactly one of them sees `1`.
/// `may_exist` maps to `BF.EXISTS`.
#[derive(Debug, Clone)]
pub struct RedisBloomFilter {
    conn: redis::aio::MultiplexedConnection,
    key: String,
}

pub(crate) fn map_redis_error(operation: &str, err: redis::RedisError) -> FilterError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        FilterError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        FilterError::Unavailable(message)
    } else {
        FilterError::Operation(message)
    }
}

impl RedisBloomFilter {
    /// Creates a filter on the default key.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_key(conn, DEFAULT_FILTER_KEY)
    }

    /// Creates a filter on a custom key.
    pub fn with_key(conn: redis::aio::MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Creates the filter with explicit sizing via `BF.RESERVE`.
    ///
    /// Without this, `BF.ADD` auto-creates the key with the module's default
    /// capacity and error rate. An already existing key is left untouched.
    pub async fn ensure_reserved(&self, capacity: usize, error_rate: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("BF.RESERVE")
            .arg(&self.key)
            .arg(error_rate)
            .arg(capacity)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                debug!(key = %self.key, capacity, error_rate, "Reserved RedisBloom filter");
                Ok(())
            }
            Err(e) if e.to_string().to_ascii_lowercase().contains("item exists") => {
                debug!(key = %self.key, "RedisBloom filter already exists");
                Ok(())
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to reserve RedisBloom filter");
                Err(map_redis_error("failed to reserve bloom filter", e))
            }
        }
    }
}

#[async_trait]
impl MembershipFilter for RedisBloomFilter {
    async fn reserve(&self, code: &ShortCode) -> Result<bool> {
        trace!(code = %code, "Reserving code in RedisBloom");

        let mut conn = self.conn.clone();
        redis::cmd("BF.ADD")
            .arg(&self.key)
            .arg(code.as_str())
            .query_async::<bool>(&mut conn)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "RedisBloom error on BF.ADD");
                map_redis_error("failed to add code to bloom filter", e)
            })
    }

    async fn may_exist(&self, code: &ShortCode) -> Result<bool> {
        trace!(code = %code, "Checking code in RedisBloom");

        let mut conn = self.conn.clone();
        redis::cmd("BF.EXISTS")
            .arg(&self.key)
            .arg(code.as_str())
            .query_async::<bool>(&mut conn)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "RedisBloom error on BF.EXISTS");
                map_redis_error("failed to check code in bloom filter", e)
            })
    }
}
