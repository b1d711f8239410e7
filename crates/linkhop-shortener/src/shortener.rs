use crate::Result;
use async_trait::async_trait;
use linkhop_core::{RequestContext, ShortCode, UrlRecord};

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Stores `origin_url` under a freshly reserved short code.
    async fn shorten(&self, ctx: &RequestContext, origin_url: &str) -> Result<UrlRecord>;

    /// Moves the record at `code` to a freshly reserved code.
    /// Returns `None` if no record exists at `code`.
    async fn update_code(&self, ctx: &RequestContext, code: &ShortCode)
        -> Result<Option<UrlRecord>>;

    /// Removes the record at `code`.
    /// Returns `true` if the record existed and was removed.
    async fn delete(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool>;
}
