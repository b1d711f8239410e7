use crate::Result;
use async_trait::async_trait;
use linkhop_core::{RequestContext, ShortCode, UrlRecord};

#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Resolves a short code to its stored URL record.
    /// Returns `None` if the code does not exist.
    async fn resolve(&self, ctx: &RequestContext, code: &ShortCode) -> Result<Option<UrlRecord>>;
}
