use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Identifier assigned by the durable store.
    pub id: i64,
    /// The original URL that was shortened.
    pub origin_url: String,
    /// The short code currently bound to this record.
    pub short_code: ShortCode,
    /// When the record was created.
    pub created_at: Timestamp,
}

/// A read-only view of a repository.
///
/// This trait provides only the read operations from [`Repository`],
/// allowing the resolver to have read-only access.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the URL record for a given short code.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Lists every short code currently stored.
    ///
    /// Used to warm in-process membership filters on startup.
    async fn list_codes(&self) -> Result<Vec<ShortCode>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Persists a new record. Returns `Err(Conflict)` if the code is taken.
    async fn create(&self, origin_url: &str, code: &ShortCode) -> Result<UrlRecord>;

    /// Rebinds the record at `code` to `new_code`.
    ///
    /// Returns `None` if no record exists at `code`, and `Err(Conflict)`
    /// if `new_code` is already taken.
    async fn update_code(
        &self,
        code: &ShortCode,
        new_code: &ShortCode,
    ) -> Result<Option<UrlRecord>>;

    /// Deletes the record for a given short code.
    /// Returns `true` if the record existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        (**self).get(code).await
    }

    async fn list_codes(&self) -> Result<Vec<ShortCode>> {
        (**self).list_codes().await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn create(&self, origin_url: &str, code: &ShortCode) -> Result<UrlRecord> {
        (**self).create(origin_url, code).await
    }

    async fn update_code(
        &self,
        code: &ShortCode,
        new_code: &ShortCode,
    ) -> Result<Option<UrlRecord>> {
        (**self).update_code(code, new_code).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        (**self).delete(code).await
    }
}
