//! Short-code resolution through the filter, cache and store layers.

pub mod error;
pub mod resolver;
pub mod service;

pub use error::{ResolveError, Result};
pub use resolver::Resolver;
pub use service::{FilterFailurePolicy, ResolverConfig, ResolverService, DEFAULT_CACHE_TTL};
