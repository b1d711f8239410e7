//! In-process Bloom filter for short-code membership.
//!
//! A Bloom filter is a space-efficient probabilistic data structure that can
//! tell you with certainty if an item is NOT in a set, or that it MIGHT be
//! in the set (with a configurable false positive rate).
//!
//! - `reserve()` sets the code's bits and reports whether any were unset
//!   before, under a single write lock so concurrent reservations of the
//!   same code have exactly one winner.
//! - `may_exist()` only takes the read lock.
//!
//! Bloom filters do not support deletion. A process that restarts against a
//! populated store must [`warm`](BloomMembershipFilter::warm) the filter
//! before serving reads, otherwise existing codes would be rejected.

use async_trait::async_trait;
use linkhop_core::filter::Result;
use linkhop_core::{FilterError, MembershipFilter, ShortCode};
use parking_lot::RwLock;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Configuration for the Bloom filter.
///
/// The Bloom filter is a probabilistic data structure that trades a small
/// false positive rate for significant memory savings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BloomFilterConfig {
    /// Expected number of codes to be inserted into the filter.
    ///
    /// Setting this too low will increase the false positive rate, which on
    /// the create path shows up as extra generation attempts.
    #[builder(default = 1_000_000)]
    pub expected_items: usize,

    /// Desired false positive rate as a probability between 0.0 and 1.0.
    ///
    /// For example, a value of 0.01 means approximately 1% false positive rate.
    /// Lower values use more memory but reduce false positives.
    #[builder(default = 0.01)]
    pub false_positive_rate: f64,
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A [`MembershipFilter`] backed by an in-process Bloom filter.
///
/// # Example
///
/// ```rust
/// use linkhop_filter::{BloomFilterConfig, BloomMembershipFilter};
///
/// let config = BloomFilterConfig::builder()
///     .expected_items(100_000)
///     .false_positive_rate(0.001)
///     .build();
///
/// let filter = BloomMembershipFilter::new(config).unwrap();
/// ```
pub struct BloomMembershipFilter {
    bloom: RwLock<bloomfilter::Bloom<ShortCode>>,
}

impl BloomMembershipFilter {
    /// Creates an empty filter sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Initialization` if the sizing is rejected
    /// (zero items or a rate outside `(0, 1)`).
    pub fn new(config: BloomFilterConfig) -> Result<Self> {
        if !(config.false_positive_rate > 0.0 && config.false_positive_rate < 1.0) {
            return Err(FilterError::Initialization(format!(
                "false positive rate must be in (0, 1), got {}",
                config.false_positive_rate
            )));
        }

        let rate = config.false_positive_rate;
        let bloom = bloomfilter::Bloom::new_for_fp_rate(config.expected_items, rate)
            .map_err(|e| FilterError::Initialization(e.to_string()))?;
        Ok(Self {
            bloom: RwLock::new(bloom),
        })
    }

    /// Adds every code in `codes` to the filter.
    ///
    /// Returns the number of codes that were not already present.
    pub fn warm<'a>(&self, codes: impl IntoIterator<Item = &'a ShortCode>) -> usize {
        let mut guard = self.bloom.write();
        let mut added = 0;
        for code in codes {
            if !guard.check_and_set(code) {
                added += 1;
            }
        }
        debug!(added, "Warmed Bloom filter");
        added
    }
}

#[async_trait]
impl MembershipFilter for BloomMembershipFilter {
    async fn reserve(&self, code: &ShortCode) -> Result<bool> {
        let was_present = self.bloom.write().check_and_set(code);
        trace!(code = %code, inserted = !was_present, "Reserved code in Bloom filter");
        Ok(!was_present)
    }

    async fn may_exist(&self, code: &ShortCode) -> Result<bool> {
        let present = self.bloom.read().check(code);
        trace!(code = %code, present, "Checked Bloom filter");
        Ok(present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn small_filter() -> BloomMembershipFilter {
        let config = BloomFilterConfig::builder()
            .expected_items(1_000)
            .false_positive_rate(0.01)
            .build();
        BloomMembershipFilter::new(config).unwrap()
    }

    #[tokio::test]
    async fn first_reservation_wins() {
        let filter = small_filter();

        assert!(filter.reserve(&code("abc123")).await.unwrap());
        assert!(!filter.reserve(&code("abc123")).await.unwrap());
    }

    #[tokio::test]
    async fn reserved_code_may_exist() {
        let filter = small_filter();
        let c = code("abc123");

        assert!(!filter.may_exist(&c).await.unwrap());
        filter.reserve(&c).await.unwrap();
        assert!(filter.may_exist(&c).await.unwrap());
    }

    #[tokio::test]
    async fn no_false_negatives() {
        let filter = small_filter();
        let codes: Vec<_> = (0..500).map(|i| code(&format!("c{:05}", i))).collect();

        for c in &codes {
            filter.reserve(c).await.unwrap();
        }

        for c in &codes {
            let present = filter.may_exist(c).await.unwrap();
            assert!(present, "false negative for {c}");
        }
    }

    #[tokio::test]
    async fn false_positive_rate_is_bounded() {
        let filter = small_filter();
        for i in 0..1_000 {
            filter.reserve(&code(&format!("in{:05}", i))).await.unwrap();
        }

        let mut false_positives = 0;
        for i in 0..1_000 {
            let candidate = code(&format!("out{i:05}"));
            if filter.may_exist(&candidate).await.unwrap() {
                false_positives += 1;
            }
        }

        // ~1% expected; allow generous slack for hash variance.
        assert!(false_positives < 50, "{false_positives} false positives");
    }

    #[tokio::test]
    async fn warm_loads_existing_codes() {
        let filter = small_filter();
        let codes = vec![code("aaa111"), code("bbb222"), code("aaa111")];

        let added = filter.warm(&codes);
        assert_eq!(added, 2);

        assert!(filter.may_exist(&code("aaa111")).await.unwrap());
        assert!(filter.may_exist(&code("bbb222")).await.unwrap());
        assert!(!filter.reserve(&code("bbb222")).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_reservations_have_one_winner() {
        let filter = Arc::new(small_filter());
        let mut handles = vec![];

        for _ in 0..16 {
            let filter = Arc::clone(&filter);
            handles.push(tokio::spawn(async move {
                filter.reserve(&code("race00")).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn rejects_invalid_rate() {
        let config = BloomFilterConfig::builder()
            .expected_items(1_000)
            .false_positive_rate(1.5)
            .build();
        assert!(matches!(
            BloomMembershipFilter::new(config),
            Err(FilterError::Initialization(_))
        ));
    }

    #[test]
    fn default_config_matches_deployment_defaults() {
        let config = BloomFilterConfig::default();
        assert_eq!(config.expected_items, 1_000_000);
        assert_eq!(config.false_positive_rate, 0.01);
    }
}
