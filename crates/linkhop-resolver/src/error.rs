use linkhop_core::{CacheError, Canceled, FilterError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(StorageError),
    /// Only returned under [`FilterFailurePolicy::Fail`](crate::FilterFailurePolicy::Fail).
    #[error("membership filter unavailable: {0}")]
    FilterUnavailable(FilterError),
    /// Only returned by [`ResolverService::invalidate`](crate::ResolverService::invalidate);
    /// cache failures while resolving count as misses.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(CacheError),
    #[error(transparent)]
    Canceled(#[from] Canceled),
}
