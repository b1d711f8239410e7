//! Backend selection and service wiring.
//!
//! One adapter per capability is constructed and shared, behind an `Arc`,
//! by the shortener and the resolver.

use crate::config::{
    CacheBackendArg, FilterBackendArg, FilterFailurePolicyArg, Settings, StorageBackendArg,
};
use linkhop_cache::{MokaUrlCache, RedisUrlCache};
use linkhop_core::{
    FilterError, MembershipFilter, ReadRepository, Repository, RequestContext, ShortCode,
    StorageError, UrlCache, UrlRecord,
};
use linkhop_filter::{BloomFilterConfig, BloomMembershipFilter, RedisBloomFilter};
use linkhop_generator::{
    CodeGenerator, InvalidConfig, RandomGenerator, RandomGeneratorConfig, DEFAULT_CODE_LENGTH,
    DEFAULT_MAX_ATTEMPTS,
};
use linkhop_resolver::{FilterFailurePolicy, ResolveError, ResolverConfig, ResolverService};
use linkhop_shortener::{Shortener, ShortenerError, ShortenerService};
use linkhop_storage::{InMemoryRepository, PostgresRepository};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub type SharedRepository = Arc<dyn Repository>;
pub type SharedFilter = Arc<dyn MembershipFilter>;
pub type SharedCache = Arc<dyn UrlCache>;

pub type AppShortener = ShortenerService<SharedRepository, RandomGenerator, SharedFilter>;
pub type AppResolver = ResolverService<SharedRepository, SharedFilter, SharedCache>;

/// Startup failures. Request-time failures use the service error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("filter setup failed: {0}")]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Generator(#[from] InvalidConfig),
    #[error("redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),
}

/// Knobs for the services, independent of backend choice.
#[derive(Debug, Clone, TypedBuilder)]
pub struct AppOptions {
    #[builder(default = DEFAULT_CODE_LENGTH)]
    pub code_length: usize,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
    /// Fixed generator seed, for reproducible runs.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
    #[builder(default)]
    pub resolver: ResolverConfig,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        let policy = match settings.filter_failure_policy {
            FilterFailurePolicyArg::FallThrough => FilterFailurePolicy::FallThrough,
            FilterFailurePolicyArg::Fail => FilterFailurePolicy::Fail,
        };

        AppOptions::builder()
            .code_length(settings.code_length)
            .max_attempts(settings.max_attempts)
            .resolver(
                ResolverConfig::builder()
                    .cache_ttl(settings.cache_ttl())
                    .filter_failure_policy(policy)
                    .build(),
            )
            .build()
    }
}

/// The create and resolve paths over one set of backends.
#[derive(Clone)]
pub struct App {
    shortener: AppShortener,
    resolver: AppResolver,
}

impl App {
    /// Wires the services over already constructed backends.
    pub fn from_parts(
        repository: SharedRepository,
        filter: SharedFilter,
        cache: SharedCache,
        options: AppOptions,
    ) -> Result<Self, AppError> {
        let mut generator_config = RandomGeneratorConfig::builder()
            .length(options.code_length)
            .build();
        generator_config.seed = options.seed;
        let source = RandomGenerator::with_config(generator_config)?;

        let generator =
            CodeGenerator::with_max_attempts(source, Arc::clone(&filter), options.max_attempts);

        Ok(Self {
            shortener: ShortenerService::new(Arc::clone(&repository), generator),
            resolver: ResolverService::with_config(repository, filter, cache, options.resolver),
        })
    }

    /// In-memory store, in-process bloom filter and moka cache.
    pub fn in_memory(options: AppOptions) -> Result<Self, AppError> {
        let filter = BloomMembershipFilter::new(BloomFilterConfig::default())?;
        Self::from_parts(
            Arc::new(InMemoryRepository::new()),
            Arc::new(filter),
            Arc::new(MokaUrlCache::new()),
            options,
        )
    }

    /// Connects the backends chosen in `settings`.
    ///
    /// An in-process filter is warmed with every code already in the store,
    /// so codes issued by earlier runs are never ruled out.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        let repository = connect_repository(settings).await?;

        let redis = match (settings.needs_redis(), settings.redis_url.as_deref()) {
            (false, _) => None,
            (true, Some(url)) => Some(connect_redis(url).await?),
            (true, None) => return Err(AppError::MissingSetting("redis url")),
        };

        let filter: SharedFilter = match (settings.filter, &redis) {
            (FilterBackendArg::InMemory, _) => {
                let config = BloomFilterConfig::builder()
                    .expected_items(settings.filter_capacity)
                    .false_positive_rate(settings.filter_error_rate)
                    .build();
                let filter = BloomMembershipFilter::new(config)?;
                let codes = repository.list_codes().await?;
                let warmed = filter.warm(codes.iter());
                info!(codes = warmed, "Warmed in-process membership filter");
                Arc::new(filter)
            }
            (FilterBackendArg::Redis, Some(conn)) => {
                let filter = RedisBloomFilter::with_key(conn.clone(), settings.filter_key.as_str());
                filter
                    .ensure_reserved(settings.filter_capacity, settings.filter_error_rate)
                    .await?;
                Arc::new(filter)
            }
            (FilterBackendArg::Redis, None) => return Err(AppError::MissingSetting("redis url")),
        };

        let cache: SharedCache = match (settings.cache, &redis) {
            (CacheBackendArg::Moka, _) => {
                Arc::new(MokaUrlCache::with_capacity(settings.cache_max_capacity))
            }
            (CacheBackendArg::Redis, Some(conn)) => Arc::new(RedisUrlCache::with_prefix(
                conn.clone(),
                settings.cache_key_prefix.as_str(),
            )),
            (CacheBackendArg::Redis, None) => return Err(AppError::MissingSetting("redis url")),
        };

        info!(
            storage = %settings.storage,
            filter = %settings.filter,
            cache = %settings.cache,
            "Backends ready"
        );

        Self::from_parts(repository, filter, cache, AppOptions::from(settings))
    }

    pub fn shortener(&self) -> &AppShortener {
        &self.shortener
    }

    pub fn resolver(&self) -> &AppResolver {
        &self.resolver
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        origin_url: &str,
    ) -> Result<UrlRecord, ShortenerError> {
        self.shortener.shorten(ctx, origin_url).await
    }

    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        code: &ShortCode,
    ) -> Result<Option<UrlRecord>, ResolveError> {
        self.resolver.resolve(ctx, code).await
    }

    /// Moves the record at `code` to a new code and evicts the old cache
    /// entry.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        code: &ShortCode,
    ) -> Result<Option<UrlRecord>, ShortenerError> {
        let updated = self.shortener.update_code(ctx, code).await?;
        if updated.is_some() {
            self.evict(ctx, code).await;
        }
        Ok(updated)
    }

    /// Deletes the record at `code` and evicts its cache entry.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        code: &ShortCode,
    ) -> Result<bool, ShortenerError> {
        let removed = self.shortener.delete(ctx, code).await?;
        if removed {
            self.evict(ctx, code).await;
        }
        Ok(removed)
    }

    /// The store change already happened; a failed eviction only leaves a
    /// stale entry until its TTL runs out.
    async fn evict(&self, ctx: &RequestContext, code: &ShortCode) {
        match self.resolver.invalidate(ctx, code).await {
            Ok(()) => debug!(code = %code, "Evicted cached record"),
            Err(e) => warn!(code = %code, error = %e, "Cached record left to expire"),
        }
    }
}

async fn connect_repository(settings: &Settings) -> Result<SharedRepository, AppError> {
    match settings.storage {
        StorageBackendArg::InMemory => Ok(Arc::new(InMemoryRepository::new())),
        StorageBackendArg::Postgres => {
            let dsn = settings
                .postgres_dsn
                .as_deref()
                .ok_or(AppError::MissingSetting("postgres dsn"))?;
            let repository = PostgresRepository::connect(dsn).await?;
            repository.ensure_schema().await?;
            Ok(Arc::new(repository))
        }
    }
}

async fn connect_redis(url: &str) -> Result<redis::aio::MultiplexedConnection, AppError> {
    let client = redis::Client::open(url)?;
    Ok(client.get_multiplexed_async_connection().await?)
}
