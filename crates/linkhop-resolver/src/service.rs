use crate::resolver::Resolver;
use crate::{ResolveError, Result};
use async_trait::async_trait;
use linkhop_core::{
    MembershipFilter, ReadRepository, RequestContext, ShortCode, UrlCache, UrlRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Cache entries live for one hour.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// What to do when the membership filter cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterFailurePolicy {
    /// Log and continue to the cache and store as if the code may exist.
    #[default]
    FallThrough,
    /// Fail the resolution with [`ResolveError::FilterUnavailable`].
    Fail,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolverConfig {
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
    #[builder(default)]
    pub filter_failure_policy: FilterFailurePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Service for resolving short codes.
///
/// Lookups run filter first, then cache, then store. A code the filter
/// rules out never reaches the cache or the store; a store hit is written
/// back to the cache before the call returns.
#[derive(Debug)]
pub struct ResolverService<R, F, C> {
    repository: Arc<R>,
    filter: Arc<F>,
    cache: Arc<C>,
    config: ResolverConfig,
}

impl<R, F, C> Clone for ResolverService<R, F, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            filter: Arc::clone(&self.filter),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<R, F, C> ResolverService<R, F, C>
where
    R: ReadRepository,
    F: MembershipFilter,
    C: UrlCache,
{
    pub fn new(repository: R, filter: F, cache: C) -> Self {
        Self::with_config(repository, filter, cache, ResolverConfig::default())
    }

    pub fn with_config(repository: R, filter: F, cache: C, config: ResolverConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            filter: Arc::new(filter),
            cache: Arc::new(cache),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Resolves a short code to its original URL.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The record if the code is stored
    /// * `Ok(None)` - If the code was never issued or has been deleted
    /// * `Err(e)` - If the store failed, the context ended, or the filter
    ///   failed under [`FilterFailurePolicy::Fail`]
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        code: &ShortCode,
    ) -> Result<Option<UrlRecord>> {
        Resolver::resolve(self, ctx, code).await
    }

    /// Drops the cached entry for `code`, if any.
    pub async fn invalidate(&self, ctx: &RequestContext, code: &ShortCode) -> Result<()> {
        trace!(code = %code, "invalidating cached record");

        ctx.run(self.cache.del(code))
            .await?
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to invalidate cached record");
                ResolveError::CacheUnavailable(e)
            })
    }

    async fn may_exist(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        match ctx.run(self.filter.may_exist(code)).await? {
            Ok(may_exist) => Ok(may_exist),
            Err(e) => match self.config.filter_failure_policy {
                FilterFailurePolicy::FallThrough => {
                    warn!(code = %code, error = %e, "Membership filter failed, falling through");
                    Ok(true)
                }
                FilterFailurePolicy::Fail => {
                    warn!(code = %code, error = %e, "Membership filter failed");
                    Err(ResolveError::FilterUnavailable(e))
                }
            },
        }
    }
}

#[async_trait]
impl<R, F, C> Resolver for ResolverService<R, F, C>
where
    R: ReadRepository,
    F: MembershipFilter,
    C: UrlCache,
{
    async fn resolve(&self, ctx: &RequestContext, code: &ShortCode) -> Result<Option<UrlRecord>> {
        trace!(code = %code, "resolving short code");

        if !self.may_exist(ctx, code).await? {
            debug!(code = %code, "Short code ruled out by membership filter");
            return Ok(None);
        }

        match ctx.run(self.cache.get_url(code)).await? {
            Ok(Some(record)) => {
                debug!(code = %code, url = %record.origin_url, "Resolved short code from cache");
                return Ok(Some(record));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(code = %code, error = %e, "Cache read failed, falling back to store");
            }
        }

        let record = ctx
            .run(self.repository.get(code))
            .await?
            .map_err(ResolveError::StoreUnavailable)?;

        let Some(record) = record else {
            trace!(code = %code, "Short code not found");
            return Ok(None);
        };

        let ttl = self.config.cache_ttl;
        let populated = ctx.run(self.cache.set_url(code, &record, ttl)).await?;
        if let Err(e) = populated {
            warn!(code = %code, error = %e, "Failed to populate cache");
        }

        debug!(code = %code, url = %record.origin_url, "Resolved short code");
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhop_cache::MokaUrlCache;
    use linkhop_core::{CacheError, Canceled, FilterError, Repository, StorageError};
    use linkhop_filter::{BloomFilterConfig, BloomMembershipFilter};
    use linkhop_storage::InMemoryRepository;
    use linkhop_test_infra::doubles::{
        FixedFilter, RecordingCache, RecordingFilter, RecordingRepository,
    };

    type Repo = RecordingRepository<InMemoryRepository>;
    type Cache = RecordingCache<MokaUrlCache>;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn bloom() -> BloomMembershipFilter {
        let config = BloomFilterConfig::builder().expected_items(1_000).build();
        BloomMembershipFilter::new(config).unwrap()
    }

    fn service_with<F: MembershipFilter>(
        filter: F,
        config: ResolverConfig,
    ) -> ResolverService<Repo, RecordingFilter<F>, Cache> {
        ResolverService::with_config(
            RecordingRepository::new(InMemoryRepository::new()),
            RecordingFilter::new(filter),
            RecordingCache::new(MokaUrlCache::new()),
            config,
        )
    }

    /// Stores and reserves `c` the way the create path would.
    async fn seed<F: MembershipFilter>(
        service: &ResolverService<Repo, RecordingFilter<F>, Cache>,
        c: &ShortCode,
        url: &str,
    ) -> UrlRecord {
        service.filter().inner().reserve(c).await.unwrap();
        service.repository().inner().create(url, c).await.unwrap()
    }

    #[tokio::test]
    async fn never_issued_code_touches_neither_cache_nor_store() {
        let service = service_with(bloom(), ResolverConfig::default());

        let result = service
            .resolve(&RequestContext::background(), &code("zzzzzz"))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(service.filter().lookups(), 1);
        assert_eq!(service.cache().gets(), 0);
        assert_eq!(service.repository().gets(), 0);
    }

    #[tokio::test]
    async fn store_hit_populates_cache_and_second_lookup_skips_store() {
        let service = service_with(bloom(), ResolverConfig::default());
        let c = code("abc123");
        let created = seed(&service, &c, "https://example.com/a").await;
        let ctx = RequestContext::background();

        let first = service.resolve(&ctx, &c).await.unwrap();
        assert_eq!(first.as_ref(), Some(&created));
        assert_eq!(service.repository().gets(), 1);
        assert_eq!(service.cache().sets(), 1);

        let second = service.resolve(&ctx, &c).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(service.repository().gets(), 1);
        assert_eq!(service.cache().gets(), 2);
    }

    #[tokio::test]
    async fn repeated_resolution_is_stable() {
        let service = service_with(bloom(), ResolverConfig::default());
        let c = code("same12");
        seed(&service, &c, "https://example.com/same").await;
        let ctx = RequestContext::background();

        for _ in 0..5 {
            let record = service.resolve(&ctx, &c).await.unwrap().unwrap();
            assert_eq!(record.origin_url, "https://example.com/same");
        }
    }

    #[tokio::test]
    async fn false_positive_costs_one_store_read() {
        let service = service_with(FixedFilter::permissive(), ResolverConfig::default());

        let result = service
            .resolve(&RequestContext::background(), &code("ghost1"))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(service.cache().gets(), 1);
        assert_eq!(service.repository().gets(), 1);
        assert_eq!(service.cache().sets(), 0);
    }

    #[tokio::test]
    async fn cache_failure_degrades_to_store() {
        let service = service_with(bloom(), ResolverConfig::default());
        let c = code("abc123");
        seed(&service, &c, "https://example.com").await;
        let refused = CacheError::Unavailable("connection refused".to_string());
        service.cache().fail_all(Some(refused));
        let ctx = RequestContext::background();

        for _ in 0..2 {
            let record = service.resolve(&ctx, &c).await.unwrap();
            assert_eq!(record.unwrap().origin_url, "https://example.com");
        }
        assert_eq!(service.repository().gets(), 2);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let service = service_with(FixedFilter::permissive(), ResolverConfig::default());
        let reset = StorageError::Unavailable("connection reset".to_string());
        service.repository().fail_gets(Some(reset));

        let err = service
            .resolve(&RequestContext::background(), &code("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::StoreUnavailable(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn filter_failure_falls_through_by_default() {
        let service = service_with(FixedFilter::unavailable(), ResolverConfig::default());
        let c = code("abc123");
        service
            .repository()
            .inner()
            .create("https://example.com", &c)
            .await
            .unwrap();

        let record = service
            .resolve(&RequestContext::background(), &c)
            .await
            .unwrap();

        assert_eq!(record.unwrap().origin_url, "https://example.com");
        assert_eq!(service.repository().gets(), 1);
    }

    #[tokio::test]
    async fn filter_failure_can_fail_the_lookup() {
        let config = ResolverConfig::builder()
            .filter_failure_policy(FilterFailurePolicy::Fail)
            .build();
        let service = service_with(FixedFilter::unavailable(), config);

        let err = service
            .resolve(&RequestContext::background(), &code("abc123"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::FilterUnavailable(FilterError::Unavailable(_))
        ));
        assert_eq!(service.cache().gets(), 0);
        assert_eq!(service.repository().gets(), 0);
    }

    #[tokio::test]
    async fn canceled_context_is_reported() {
        let service = service_with(FixedFilter::permissive(), ResolverConfig::default());
        let ctx = RequestContext::background();
        ctx.cancel();

        let err = service.resolve(&ctx, &code("abc123")).await.unwrap_err();

        assert!(matches!(err, ResolveError::Canceled(Canceled::Canceled)));
        assert_eq!(service.filter().lookups(), 0);
        assert_eq!(service.repository().gets(), 0);
    }

    #[tokio::test]
    async fn deleted_record_is_stale_until_ttl_expires() {
        let config = ResolverConfig::builder()
            .cache_ttl(Duration::from_millis(50))
            .build();
        let service = service_with(bloom(), config);
        let c = code("del123");
        seed(&service, &c, "https://example.com/gone").await;
        let ctx = RequestContext::background();

        assert!(service.resolve(&ctx, &c).await.unwrap().is_some());
        assert!(service.repository().inner().delete(&c).await.unwrap());

        // Still served from the cache.
        assert!(service.resolve(&ctx, &c).await.unwrap().is_some());
        assert_eq!(service.repository().gets(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(service.resolve(&ctx, &c).await.unwrap().is_none());
        assert_eq!(service.repository().gets(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_store_read() {
        let service = service_with(bloom(), ResolverConfig::default());
        let c = code("inv123");
        seed(&service, &c, "https://example.com/inv").await;
        let ctx = RequestContext::background();

        service.resolve(&ctx, &c).await.unwrap();
        service.invalidate(&ctx, &c).await.unwrap();
        service.resolve(&ctx, &c).await.unwrap();

        assert_eq!(service.repository().gets(), 2);
    }

    #[tokio::test]
    async fn invalidate_reports_cache_failure() {
        let service = service_with(bloom(), ResolverConfig::default());
        service
            .cache()
            .fail_all(Some(CacheError::Timeout("slow".to_string())));

        let err = service
            .invalidate(&RequestContext::background(), &code("inv123"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::CacheUnavailable(CacheError::Timeout(_))
        ));
    }

    #[test]
    fn default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(
            config.filter_failure_policy,
            FilterFailurePolicy::FallThrough
        );
    }
}
