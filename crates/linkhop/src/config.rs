use clap::{Args, Parser, Subcommand, ValueEnum};
use linkhop_core::RequestContext;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const STORAGE_BACKEND_ENV: &str = "LINKHOP_STORAGE_BACKEND";
pub const POSTGRES_DSN_ENV: &str = "LINKHOP_POSTGRES_DSN";
pub const FILTER_BACKEND_ENV: &str = "LINKHOP_FILTER_BACKEND";
pub const CACHE_BACKEND_ENV: &str = "LINKHOP_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "LINKHOP_REDIS_URL";
pub const CACHE_TTL_SECS_ENV: &str = "LINKHOP_CACHE_TTL_SECS";
pub const CACHE_MAX_CAPACITY_ENV: &str = "LINKHOP_CACHE_MAX_CAPACITY";
pub const CACHE_KEY_PREFIX_ENV: &str = "LINKHOP_CACHE_KEY_PREFIX";
pub const FILTER_KEY_ENV: &str = "LINKHOP_FILTER_KEY";
pub const FILTER_CAPACITY_ENV: &str = "LINKHOP_FILTER_CAPACITY";
pub const FILTER_ERROR_RATE_ENV: &str = "LINKHOP_FILTER_ERROR_RATE";
pub const FILTER_FAILURE_POLICY_ENV: &str = "LINKHOP_FILTER_FAILURE_POLICY";
pub const MAX_ATTEMPTS_ENV: &str = "LINKHOP_MAX_ATTEMPTS";
pub const CODE_LENGTH_ENV: &str = "LINKHOP_CODE_LENGTH";
pub const TIMEOUT_MS_ENV: &str = "LINKHOP_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "LINKHOP_LOG_FORMAT";

pub const DEFAULT_CACHE_TTL_SECS: u64 = linkhop_resolver::DEFAULT_CACHE_TTL.as_secs();
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = linkhop_cache::moka::DEFAULT_MAX_CAPACITY;
pub const DEFAULT_CACHE_KEY_PREFIX: &str = linkhop_cache::redis::DEFAULT_KEY_PREFIX;
pub const DEFAULT_FILTER_KEY: &str = linkhop_filter::redis::DEFAULT_FILTER_KEY;
pub const DEFAULT_FILTER_CAPACITY: usize = 1_000_000;
pub const DEFAULT_FILTER_ERROR_RATE: f64 = 0.01;
pub const DEFAULT_MAX_ATTEMPTS: usize = linkhop_generator::DEFAULT_MAX_ATTEMPTS;
pub const DEFAULT_CODE_LENGTH: usize = linkhop_generator::DEFAULT_CODE_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for FilterBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterBackendArg::InMemory => write!(f, "in-memory"),
            FilterBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "moka")]
    Moka,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::Moka => write!(f, "moka"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterFailurePolicyArg {
    #[value(name = "fall-through")]
    FallThrough,
    #[value(name = "fail")]
    Fail,
}

impl Display for FilterFailurePolicyArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterFailurePolicyArg::FallThrough => write!(f, "fall-through"),
            FilterFailurePolicyArg::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkhop", about = "Create and resolve short URLs")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Shorten a URL and print the stored record.
    Create { url: String },
    /// Look up a short code.
    Resolve { code: String },
    /// Move a record to a freshly generated short code.
    Update { code: String },
    /// Delete the record behind a short code.
    Delete { code: String },
}

#[derive(Debug, Clone, Args)]
pub struct Settings {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = POSTGRES_DSN_ENV, required_if_eq("storage", "postgres"))]
    pub postgres_dsn: Option<String>,

    #[arg(
        long,
        env = FILTER_BACKEND_ENV,
        value_enum,
        default_value_t = FilterBackendArg::InMemory
    )]
    pub filter: FilterBackendArg,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::Moka
    )]
    pub cache: CacheBackendArg,

    #[arg(
        long,
        env = REDIS_URL_ENV,
        required_if_eq_any([("filter", "redis"), ("cache", "redis")])
    )]
    pub redis_url: Option<String>,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,

    #[arg(
        long,
        env = CACHE_MAX_CAPACITY_ENV,
        default_value_t = DEFAULT_CACHE_MAX_CAPACITY
    )]
    pub cache_max_capacity: u64,

    #[arg(
        long,
        env = CACHE_KEY_PREFIX_ENV,
        default_value = DEFAULT_CACHE_KEY_PREFIX
    )]
    pub cache_key_prefix: String,

    #[arg(long, env = FILTER_KEY_ENV, default_value = DEFAULT_FILTER_KEY)]
    pub filter_key: String,

    #[arg(long, env = FILTER_CAPACITY_ENV, default_value_t = DEFAULT_FILTER_CAPACITY)]
    pub filter_capacity: usize,

    #[arg(
        long,
        env = FILTER_ERROR_RATE_ENV,
        default_value_t = DEFAULT_FILTER_ERROR_RATE
    )]
    pub filter_error_rate: f64,

    #[arg(
        long,
        env = FILTER_FAILURE_POLICY_ENV,
        value_enum,
        default_value_t = FilterFailurePolicyArg::FallThrough
    )]
    pub filter_failure_policy: FilterFailurePolicyArg,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = DEFAULT_CODE_LENGTH)]
    pub code_length: usize,

    /// Per-command deadline in milliseconds. Unbounded when unset.
    #[arg(long, env = TIMEOUT_MS_ENV)]
    pub timeout_ms: Option<u64>,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

impl Settings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// A fresh context carrying the configured deadline.
    pub fn request_context(&self) -> RequestContext {
        match self.timeout_ms {
            Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
            None => RequestContext::background(),
        }
    }

    pub fn needs_redis(&self) -> bool {
        self.filter == FilterBackendArg::Redis || self.cache == CacheBackendArg::Redis
    }
}
