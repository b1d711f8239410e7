//! Call-counting and failure-injecting wrappers around the capability traits.
//!
//! Each recorder delegates to a real inner implementation and counts the
//! calls that reach it, so tests can assert which layers a request touched.

use async_trait::async_trait;
use linkhop_core::{
    CacheError, FilterError, MembershipFilter, ReadRepository, Repository, ShortCode,
    StorageError, UrlCache, UrlRecord,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Repository wrapper counting reads and writes.
#[derive(Debug, Default)]
pub struct RecordingRepository<R> {
    inner: R,
    gets: AtomicUsize,
    creates: AtomicUsize,
    create_failures: Mutex<VecDeque<StorageError>>,
    get_failure: Mutex<Option<StorageError>>,
}

impl<R> RecordingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            create_failures: Mutex::new(VecDeque::new()),
            get_failure: Mutex::new(None),
        }
    }

    /// Queues errors returned by the next `create` calls, in order,
    /// before delegating again.
    pub fn fail_next_creates(&self, errors: impl IntoIterator<Item = StorageError>) {
        self.create_failures.lock().extend(errors);
    }

    /// Makes every `get` fail with `error` until cleared with `None`.
    pub fn fail_gets(&self, error: Option<StorageError>) {
        *self.get_failure.lock() = error;
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: ReadRepository> ReadRepository for RecordingRepository<R> {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let failure = self.get_failure.lock().clone();
        if let Some(error) = failure {
            return Err(error);
        }
        self.inner.get(code).await
    }

    async fn list_codes(&self) -> Result<Vec<ShortCode>, StorageError> {
        self.inner.list_codes().await
    }
}

#[async_trait]
impl<R: Repository> Repository for RecordingRepository<R> {
    async fn create(&self, origin_url: &str, code: &ShortCode) -> Result<UrlRecord, StorageError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let failure = self.create_failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }
        self.inner.create(origin_url, code).await
    }

    async fn update_code(
        &self,
        code: &ShortCode,
        new_code: &ShortCode,
    ) -> Result<Option<UrlRecord>, StorageError> {
        self.inner.update_code(code, new_code).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool, StorageError> {
        self.inner.delete(code).await
    }
}

/// Filter wrapper counting reservations and lookups.
#[derive(Debug, Default)]
pub struct RecordingFilter<F> {
    inner: F,
    reserves: AtomicUsize,
    lookups: AtomicUsize,
}

impl<F> RecordingFilter<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            reserves: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn reserves(&self) -> usize {
        self.reserves.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: MembershipFilter> MembershipFilter for RecordingFilter<F> {
    async fn reserve(&self, code: &ShortCode) -> Result<bool, FilterError> {
        self.reserves.fetch_add(1, Ordering::SeqCst);
        self.inner.reserve(code).await
    }

    async fn may_exist(&self, code: &ShortCode) -> Result<bool, FilterError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.may_exist(code).await
    }
}

/// A filter that gives the same answer to every call.
#[derive(Debug, Clone)]
pub struct FixedFilter {
    reserve: Result<bool, FilterError>,
    may_exist: Result<bool, FilterError>,
}

impl FixedFilter {
    pub fn new(reserve: Result<bool, FilterError>, may_exist: Result<bool, FilterError>) -> Self {
        Self { reserve, may_exist }
    }

    /// Every code looks taken; every lookup says "maybe".
    pub fn always_present() -> Self {
        Self::new(Ok(false), Ok(true))
    }

    /// Reservations succeed and every lookup says "maybe", like a filter
    /// that has saturated.
    pub fn permissive() -> Self {
        Self::new(Ok(true), Ok(true))
    }

    pub fn unavailable() -> Self {
        let error = FilterError::Unavailable("connection refused".to_string());
        Self::new(Err(error.clone()), Err(error))
    }
}

#[async_trait]
impl MembershipFilter for FixedFilter {
    async fn reserve(&self, _code: &ShortCode) -> Result<bool, FilterError> {
        self.reserve.clone()
    }

    async fn may_exist(&self, _code: &ShortCode) -> Result<bool, FilterError> {
        self.may_exist.clone()
    }
}

/// Cache wrapper counting gets and sets, optionally failing every call.
#[derive(Debug, Default)]
pub struct RecordingCache<C> {
    inner: C,
    gets: AtomicUsize,
    sets: AtomicUsize,
    failure: Mutex<Option<CacheError>>,
}

impl<C> RecordingCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Makes every call fail with `error` until cleared with `None`.
    pub fn fail_all(&self, error: Option<CacheError>) {
        *self.failure.lock() = error;
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn failure(&self) -> Option<CacheError> {
        self.failure.lock().clone()
    }
}

#[async_trait]
impl<C: UrlCache> UrlCache for RecordingCache<C> {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlRecord>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure() {
            return Err(error);
        }
        self.inner.get_url(code).await
    }

    async fn set_url(
        &self,
        code: &ShortCode,
        record: &UrlRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure() {
            return Err(error);
        }
        self.inner.set_url(code, record, ttl).await
    }

    async fn del(&self, code: &ShortCode) -> Result<(), CacheError> {
        if let Some(error) = self.failure() {
            return Err(error);
        }
        self.inner.del(code).await
    }
}
