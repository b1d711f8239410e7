use crate::error::FilterError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for membership filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// A probabilistic set of every short code ever created.
///
/// Implementations must never report a false negative: once `reserve`
/// has been called for a code, `may_exist` returns `true` for it forever.
/// False positives are allowed and bounded by the backend's error rate.
/// Codes are never removed.
#[async_trait]
pub trait MembershipFilter: Send + Sync + 'static {
    /// Adds `code` to the filter.
    ///
    /// Returns `true` if the filter had no record of `code` before this
    /// call, meaning this caller is the first to claim it. Returns `false`
    /// on a genuine collision or a false positive. The add-if-absent must
    /// be atomic at the backend.
    async fn reserve(&self, code: &ShortCode) -> Result<bool>;

    /// Returns `false` only if `code` is certainly absent.
    async fn may_exist(&self, code: &ShortCode) -> Result<bool>;
}

#[async_trait]
impl<T: MembershipFilter + ?Sized> MembershipFilter for Arc<T> {
    async fn reserve(&self, code: &ShortCode) -> Result<bool> {
        (**self).reserve(code).await
    }

    async fn may_exist(&self, code: &ShortCode) -> Result<bool> {
        (**self).may_exist(code).await
    }
}
