use crate::shortener::Shortener;
use crate::{Result, ShortenerError};
use async_trait::async_trait;
use linkhop_core::{
    MembershipFilter, ReadRepository, Repository, RequestContext, ShortCode, StorageError,
    UrlRecord,
};
use linkhop_generator::{CodeGenerator, Generator};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

/// A concrete implementation of the [`Shortener`] trait.
///
/// Codes come from a [`CodeGenerator`], which reserves them in the
/// membership filter before the record is written. The store's uniqueness
/// constraint has the final word: a conflict on write regenerates the code,
/// bounded by the generator's attempt limit.
///
/// The cache is never touched here; a new record is cached on its first
/// resolution.
#[derive(Debug)]
pub struct ShortenerService<R, G, F> {
    repository: Arc<R>,
    generator: Arc<CodeGenerator<G, F>>,
}

impl<R, G, F> Clone for ShortenerService<R, G, F> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<R, G, F> ShortenerService<R, G, F>
where
    R: Repository,
    G: Generator,
    F: MembershipFilter,
{
    pub fn new(repository: R, generator: CodeGenerator<G, F>) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Accepts absolute `http`/`https` URLs with a non-empty host.
    pub fn validate_url(origin_url: &str) -> Result<Url> {
        if origin_url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(origin_url)
            .map_err(|e| ShortenerError::InvalidUrl(format!("{origin_url}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ShortenerError::InvalidUrl(format!(
                    "URL scheme must be http or https: {scheme}"
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a host: {origin_url}"
            )));
        }

        Ok(url)
    }

    /// Repeats `write` with fresh codes while the store reports a conflict.
    async fn with_fresh_code<T, W, Fut>(&self, ctx: &RequestContext, mut write: W) -> Result<T>
    where
        W: FnMut(ShortCode) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, StorageError>>,
    {
        let attempts = self.generator.max_attempts();

        for attempt in 1..=attempts {
            let code = self.generator.generate(ctx).await?;

            match ctx.run(write(code.clone())).await? {
                Ok(value) => return Ok(value),
                Err(StorageError::Conflict(message)) => {
                    warn!(
                        code = %code,
                        attempt,
                        error = %message,
                        "Reserved code already stored, regenerating"
                    );
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "Store write failed");
                    return Err(ShortenerError::StoreUnavailable(e));
                }
            }
        }

        Err(ShortenerError::CodeSpaceExhausted { attempts })
    }
}

#[async_trait]
impl<R, G, F> Shortener for ShortenerService<R, G, F>
where
    R: Repository,
    G: Generator,
    F: MembershipFilter,
{
    async fn shorten(&self, ctx: &RequestContext, origin_url: &str) -> Result<UrlRecord> {
        trace!(url = %origin_url, "shortening url");
        Self::validate_url(origin_url)?;

        let repository = &self.repository;
        let record = self
            .with_fresh_code(ctx, |code| async move {
                repository.create(origin_url, &code).await
            })
            .await?;

        debug!(code = %record.short_code, url = %record.origin_url, "Created short url");
        Ok(record)
    }

    async fn update_code(
        &self,
        ctx: &RequestContext,
        code: &ShortCode,
    ) -> Result<Option<UrlRecord>> {
        trace!(code = %code, "assigning a new short code");

        let existing = ctx
            .run(self.repository.get(code))
            .await?
            .map_err(ShortenerError::StoreUnavailable)?;
        if existing.is_none() {
            trace!(code = %code, "Short code not found");
            return Ok(None);
        }

        let repository = &self.repository;
        let updated = self
            .with_fresh_code(ctx, |new_code| async move {
                repository.update_code(code, &new_code).await
            })
            .await?;

        match &updated {
            Some(record) => debug!(old = %code, new = %record.short_code, "Reassigned short code"),
            None => trace!(code = %code, "Short code not found"),
        }
        Ok(updated)
    }

    async fn delete(&self, ctx: &RequestContext, code: &ShortCode) -> Result<bool> {
        trace!(code = %code, "deleting short url");

        let removed = ctx
            .run(self.repository.delete(code))
            .await?
            .map_err(ShortenerError::StoreUnavailable)?;

        debug!(code = %code, removed, "Delete finished");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhop_core::{Canceled, FilterError};
    use linkhop_filter::{BloomFilterConfig, BloomMembershipFilter};
    use linkhop_generator::RandomGenerator;
    use linkhop_storage::InMemoryRepository;
    use linkhop_test_infra::doubles::{FixedFilter, RecordingFilter, RecordingRepository};
    use std::collections::HashSet;

    type TestService<F> =
        ShortenerService<RecordingRepository<InMemoryRepository>, RandomGenerator, F>;

    fn bloom() -> BloomMembershipFilter {
        let config = BloomFilterConfig::builder().expected_items(10_000).build();
        BloomMembershipFilter::new(config).unwrap()
    }

    fn service_with<F: MembershipFilter>(filter: F) -> TestService<F> {
        ShortenerService::new(
            RecordingRepository::new(InMemoryRepository::new()),
            CodeGenerator::new(RandomGenerator::new(), filter),
        )
    }

    fn test_service() -> TestService<BloomMembershipFilter> {
        service_with(bloom())
    }

    fn conflict() -> StorageError {
        StorageError::Conflict("short code already exists".to_string())
    }

    #[tokio::test]
    async fn shorten_stores_record_under_six_char_code() {
        let service = test_service();
        let ctx = RequestContext::background();

        let record = service
            .shorten(&ctx, "https://example.com/a")
            .await
            .unwrap();

        assert_eq!(record.short_code.len(), 6);
        assert_eq!(record.origin_url, "https://example.com/a");

        let stored = service.repository().get(&record.short_code).await.unwrap();
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn shorten_with_invalid_url_fails() {
        let service = test_service();
        let ctx = RequestContext::background();

        let invalid = [
            "",
            "not-a-valid-url",
            "ftp://example.com",
            "http://",
            "mailto:a@b.c",
        ];
        for url in invalid {
            let err = service.shorten(&ctx, url).await.unwrap_err();
            assert!(
                matches!(err, ShortenerError::InvalidUrl(_)),
                "{url} should be rejected"
            );
        }
        assert_eq!(service.repository().creates(), 0);
    }

    #[test]
    fn validate_accepts_http_and_https() {
        type S = TestService<FixedFilter>;
        assert!(S::validate_url("http://example.com").is_ok());
        assert!(S::validate_url("https://example.com/path?q=1#frag").is_ok());
        assert!(S::validate_url("HTTPS://EXAMPLE.COM").is_ok());
    }

    #[tokio::test]
    async fn store_conflict_regenerates_code() {
        let service = test_service();
        service
            .repository()
            .fail_next_creates([conflict(), conflict()]);

        let record = service
            .shorten(&RequestContext::background(), "https://example.com")
            .await
            .unwrap();

        assert_eq!(service.repository().creates(), 3);
        let stored = service.repository().get(&record.short_code).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn persistent_conflict_exhausts_attempts() {
        let service = test_service();
        let conflicts = std::iter::repeat_with(conflict).take(10);
        service.repository().fail_next_creates(conflicts);

        let err = service
            .shorten(&RequestContext::background(), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::CodeSpaceExhausted { attempts: 5 }
        ));
        assert_eq!(service.repository().creates(), 5);
    }

    #[tokio::test]
    async fn store_failure_is_not_retried() {
        let service = test_service();
        let reset = StorageError::Unavailable("connection reset".to_string());
        service.repository().fail_next_creates([reset]);

        let err = service
            .shorten(&RequestContext::background(), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::StoreUnavailable(StorageError::Unavailable(_))
        ));
        assert_eq!(service.repository().creates(), 1);
    }

    #[tokio::test]
    async fn filter_failure_aborts_create() {
        let service = service_with(FixedFilter::unavailable());

        let err = service
            .shorten(&RequestContext::background(), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::FilterUnavailable(FilterError::Unavailable(_))
        ));
        assert_eq!(service.repository().creates(), 0);
    }

    #[tokio::test]
    async fn saturated_filter_exhausts_code_space() {
        let service = service_with(FixedFilter::always_present());

        let err = service
            .shorten(&RequestContext::background(), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::CodeSpaceExhausted { attempts: 5 }
        ));
        assert_eq!(service.repository().creates(), 0);
    }

    #[tokio::test]
    async fn canceled_context_writes_nothing() {
        let service = test_service();
        let ctx = RequestContext::background();
        ctx.cancel();

        let err = service
            .shorten(&ctx, "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::Canceled(Canceled::Canceled)));
        assert_eq!(service.repository().creates(), 0);
    }

    #[tokio::test]
    async fn concurrent_creates_never_share_a_code() {
        let service = test_service();

        let mut handles = Vec::new();
        for i in 0..64 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let url = format!("https://example.com/{i}");
                service.shorten(&RequestContext::background(), &url).await
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert!(codes.insert(record.short_code));
        }
        assert_eq!(codes.len(), 64);
        assert_eq!(service.repository().inner().len(), 64);
    }

    #[tokio::test]
    async fn update_code_moves_record() {
        let service = test_service();
        let ctx = RequestContext::background();
        let created = service
            .shorten(&ctx, "https://example.com/u")
            .await
            .unwrap();

        let updated = service
            .update_code(&ctx, &created.short_code)
            .await
            .unwrap()
            .expect("record should exist");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.origin_url, created.origin_url);
        assert_ne!(updated.short_code, created.short_code);
        let old = service.repository().get(&created.short_code).await.unwrap();
        assert!(old.is_none());
        let new = service.repository().get(&updated.short_code).await.unwrap();
        assert!(new.is_some());
    }

    #[tokio::test]
    async fn update_missing_code_returns_none() {
        let filter = Arc::new(RecordingFilter::new(bloom()));
        let service = service_with(Arc::clone(&filter));
        let missing = ShortCode::new_unchecked("nope12");

        let updated = service
            .update_code(&RequestContext::background(), &missing)
            .await
            .unwrap();

        assert!(updated.is_none());
        assert_eq!(filter.reserves(), 0);
        assert_eq!(service.repository().gets(), 1);
    }

    #[tokio::test]
    async fn update_code_lookup_failure_reserves_nothing() {
        let filter = Arc::new(RecordingFilter::new(bloom()));
        let service = service_with(Arc::clone(&filter));
        let reset = StorageError::Unavailable("connection reset".to_string());
        service.repository().fail_gets(Some(reset));
        let code = ShortCode::new_unchecked("abc123");

        let err = service
            .update_code(&RequestContext::background(), &code)
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::StoreUnavailable(_)));
        assert_eq!(filter.reserves(), 0);
    }

    #[tokio::test]
    async fn delete_removes_record_once() {
        let service = test_service();
        let ctx = RequestContext::background();
        let created = service
            .shorten(&ctx, "https://example.com/d")
            .await
            .unwrap();

        assert!(service.delete(&ctx, &created.short_code).await.unwrap());
        assert!(!service.delete(&ctx, &created.short_code).await.unwrap());
        let stored = service.repository().get(&created.short_code).await.unwrap();
        assert!(stored.is_none());
    }
}
