use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use linkhop::app::{SharedCache, SharedFilter, SharedRepository};
use linkhop::{App, AppOptions};
use linkhop_cache::MokaUrlCache;
use linkhop_core::{Canceled, Repository, RequestContext, ShortCode};
use linkhop_filter::{BloomFilterConfig, BloomMembershipFilter};
use linkhop_resolver::{ResolveError, ResolverConfig};
use linkhop_shortener::ShortenerError;
use linkhop_storage::InMemoryRepository;
use linkhop_test_infra::doubles::{RecordingCache, RecordingFilter, RecordingRepository};

struct Harness {
    app: App,
    repository: Arc<RecordingRepository<InMemoryRepository>>,
    filter: Arc<RecordingFilter<BloomMembershipFilter>>,
    cache: Arc<RecordingCache<MokaUrlCache>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_options(AppOptions::default())
    }

    fn with_cache_ttl(ttl: Duration) -> Self {
        let resolver = ResolverConfig::builder().cache_ttl(ttl).build();
        let options = AppOptions::builder().resolver(resolver).build();
        Self::with_options(options)
    }

    fn with_options(options: AppOptions) -> Self {
        let repository = Arc::new(RecordingRepository::new(InMemoryRepository::new()));
        let config = BloomFilterConfig::builder().expected_items(10_000).build();
        let bloom = BloomMembershipFilter::new(config).expect("bloom filter");
        let filter = Arc::new(RecordingFilter::new(bloom));
        let cache = Arc::new(RecordingCache::new(MokaUrlCache::new()));

        let app = App::from_parts(
            Arc::clone(&repository) as SharedRepository,
            Arc::clone(&filter) as SharedFilter,
            Arc::clone(&cache) as SharedCache,
            options,
        )
        .expect("wire app");

        Self {
            app,
            repository,
            filter,
            cache,
        }
    }
}

fn ctx() -> RequestContext {
    RequestContext::background()
}

#[tokio::test]
async fn created_url_resolves_to_its_origin() {
    let h = Harness::new();

    let record = h.app.create(&ctx(), "https://example.com/a").await.unwrap();
    assert_eq!(record.short_code.len(), 6);
    let code = record.short_code.as_str();
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    let resolved = h.app.resolve(&ctx(), &record.short_code).await.unwrap();
    let origin = resolved.map(|r| r.origin_url);
    assert_eq!(origin.as_deref(), Some("https://example.com/a"));
}

#[tokio::test]
async fn unknown_code_never_reaches_cache_or_store() {
    let h = Harness::new();
    h.app.create(&ctx(), "https://example.com/a").await.unwrap();

    let resolved = h
        .app
        .resolve(&ctx(), &ShortCode::new("zzzzzz").unwrap())
        .await
        .unwrap();

    assert!(resolved.is_none());
    assert_eq!(h.repository.gets(), 0);
    assert_eq!(h.cache.gets(), 0);
    assert_eq!(h.filter.lookups(), 1);
}

#[tokio::test]
async fn second_resolution_is_served_from_cache() {
    let h = Harness::new();
    let record = h.app.create(&ctx(), "https://example.com/c").await.unwrap();

    h.app.resolve(&ctx(), &record.short_code).await.unwrap();
    assert_eq!(h.repository.gets(), 1);

    let again = h.app.resolve(&ctx(), &record.short_code).await.unwrap();
    assert_eq!(again, Some(record));
    assert_eq!(h.repository.gets(), 1);
    assert_eq!(h.cache.gets(), 2);
}

#[tokio::test]
async fn create_does_not_touch_the_cache() {
    let h = Harness::new();

    h.app.create(&ctx(), "https://example.com").await.unwrap();

    assert_eq!(h.cache.sets(), 0);
    assert_eq!(h.cache.gets(), 0);
    assert_eq!(h.filter.reserves(), 1);
    assert_eq!(h.repository.creates(), 1);
}

#[tokio::test]
async fn repeated_resolution_returns_the_same_url() {
    let h = Harness::new();
    let record = h.app.create(&ctx(), "https://example.com/r").await.unwrap();

    for _ in 0..10 {
        let resolved = h.app.resolve(&ctx(), &record.short_code).await.unwrap();
        assert_eq!(resolved.unwrap().origin_url, "https://example.com/r");
    }
}

#[tokio::test]
async fn concurrent_creates_produce_distinct_codes() {
    let h = Harness::new();

    let mut handles = Vec::new();
    for i in 0..100 {
        let app = h.app.clone();
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            let url = format!("https://example.com/{i}");
            app.create(&ctx, &url).await
        }));
    }

    let mut codes = HashSet::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        assert!(codes.insert(record.short_code.clone()));
    }
    assert_eq!(codes.len(), 100);
    assert_eq!(h.repository.inner().len(), 100);

    for code in &codes {
        assert!(h.app.resolve(&ctx(), code).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn deleted_record_may_be_stale_until_ttl_expires() {
    let h = Harness::with_cache_ttl(Duration::from_millis(50));
    let record = h
        .app
        .create(&ctx(), "https://example.com/gone")
        .await
        .unwrap();
    let code = record.short_code.clone();

    assert!(h.app.resolve(&ctx(), &code).await.unwrap().is_some());

    // Bypass the app so the cache entry is not evicted.
    assert!(h.repository.inner().delete(&code).await.unwrap());
    assert!(h.app.resolve(&ctx(), &code).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(h.app.resolve(&ctx(), &code).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_evicts_the_cached_record() {
    let h = Harness::new();
    let record = h.app.create(&ctx(), "https://example.com/d").await.unwrap();
    let code = record.short_code.clone();
    h.app.resolve(&ctx(), &code).await.unwrap();

    assert!(h.app.delete(&ctx(), &code).await.unwrap());

    assert!(h.app.resolve(&ctx(), &code).await.unwrap().is_none());
    assert!(!h.app.delete(&ctx(), &code).await.unwrap());
}

#[tokio::test]
async fn update_moves_the_url_to_a_new_code() {
    let h = Harness::new();
    let record = h.app.create(&ctx(), "https://example.com/u").await.unwrap();
    h.app.resolve(&ctx(), &record.short_code).await.unwrap();

    let updated = h
        .app
        .update(&ctx(), &record.short_code)
        .await
        .unwrap()
        .expect("record should exist");

    assert_ne!(updated.short_code, record.short_code);
    let stale = h.app.resolve(&ctx(), &record.short_code).await.unwrap();
    assert!(stale.is_none());
    let moved = h.app.resolve(&ctx(), &updated.short_code).await.unwrap();
    assert_eq!(moved.unwrap().origin_url, "https://example.com/u");
}

#[tokio::test]
async fn invalid_url_is_rejected() {
    let h = Harness::new();

    let err = h
        .app
        .create(&ctx(), "example.com/no-scheme")
        .await
        .unwrap_err();

    assert!(matches!(err, ShortenerError::InvalidUrl(_)));
    assert_eq!(h.filter.reserves(), 0);
}

#[tokio::test]
async fn expired_deadline_cancels_both_paths() {
    let h = Harness::new();
    let expired = RequestContext::with_timeout(Duration::ZERO);

    let err = h
        .app
        .create(&expired, "https://example.com")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShortenerError::Canceled(Canceled::DeadlineExceeded)
    ));

    let err = h
        .app
        .resolve(&expired, &ShortCode::new("abc123").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Canceled(Canceled::DeadlineExceeded)
    ));
    assert_eq!(h.repository.creates(), 0);
}
