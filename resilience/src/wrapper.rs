//! Resilient call wrapper: retry + cache + error normalization behind one entry point

use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use shared::{Clock, ResilienceSettings, ServiceError};

use crate::cache::{CacheConfig, TtlCache};
use crate::normalizer::{enhance, RawError};
use crate::retry::{self, RetryConfig};

/// Per-service call wrapper, generic over the result type it caches.
///
/// The cache belongs to this instance alone. Concurrent misses on the same key
/// each invoke their operation; no in-flight deduplication is performed.
pub struct ResilientCallWrapper<T> {
    service_id: String,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<T>>,
    retry_config: RetryConfig,
    cache_config: CacheConfig,
}

impl<T> ResilientCallWrapper<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(service_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service_id: service_id.into(),
            cache: Mutex::new(TtlCache::new(clock.clone())),
            clock,
            retry_config: RetryConfig::default(),
            cache_config: CacheConfig::default(),
        }
    }

    pub fn from_settings(
        service_id: impl Into<String>,
        clock: Arc<dyn Clock>,
        settings: &ResilienceSettings,
    ) -> Self {
        Self::new(service_id, clock)
            .with_retry_config(RetryConfig::from_settings(settings))
            .with_cache_config(CacheConfig::from_settings(settings))
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache_config
    }

    /// Service-scoped cache key built with the default config's key generator
    pub fn cache_key(&self, operation_name: &str, params: &[Value]) -> String {
        format!(
            "{}:{}:{}",
            self.service_id,
            operation_name,
            (self.cache_config.key_generator)(params)
        )
    }

    /// Retry `operation` with this service's identity. Not cached, so any result type is allowed.
    pub async fn with_retry<U, E, F, Fut>(
        &self,
        operation: F,
        config: Option<&RetryConfig>,
    ) -> Result<U, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<U, E>>,
        E: Into<RawError>,
    {
        let config = config.unwrap_or(&self.retry_config);
        retry::with_retry(self.clock.as_ref(), &self.service_id, config, operation).await
    }

    /// Serve `key` from cache, or invoke `operation` once and cache its success.
    ///
    /// Failures are normalized and never cached.
    pub async fn with_cache<E, F, Fut>(
        &self,
        key: &str,
        operation: F,
        config: Option<&CacheConfig>,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawError>,
    {
        let config = config.unwrap_or(&self.cache_config);

        if let Some(hit) = self.cache.lock().await.get(key) {
            tracing::debug!(service = %self.service_id, key, "cache hit");
            return Ok(hit);
        }

        tracing::debug!(service = %self.service_id, key, "cache miss");
        // The lock is released while the operation runs
        let value = operation().await.map_err(|raw| enhance(raw.into(), &self.service_id))?;
        self.cache.lock().await.set(key, value.clone(), config);
        Ok(value)
    }

    /// `with_cache(key, || with_retry(operation))`
    pub async fn with_retry_and_cache<E, F, Fut>(
        &self,
        key: &str,
        operation: F,
        retry_config: Option<&RetryConfig>,
        cache_config: Option<&CacheConfig>,
    ) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawError>,
    {
        self.with_cache(key, || self.with_retry(operation, retry_config), cache_config)
            .await
    }

    /// Drop every cached entry, or only those whose key matches `pattern`
    pub async fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.lock().await.clear(pattern);
        tracing::debug!(
            service = %self.service_id,
            pattern = pattern.unwrap_or("*"),
            removed,
            "cache cleared"
        );
        removed
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_cached(&self, key: &str) -> bool {
        self.cache.lock().await.contains_key(key)
    }
}

/// One page as returned by a paginated backend call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSlice<I> {
    pub items: Vec<I>,
    pub total_count: u64,
}

/// Page plus derived paging metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<I> {
    pub data: Vec<I>,
    pub total_count: u64,
    pub page: u32,
    pub total_pages: u64,
}

impl<I> ResilientCallWrapper<PageSlice<I>>
where
    I: Clone + Send + 'static,
{
    /// Fetch 1-based `page` of `limit` items through the cache.
    ///
    /// `operation` receives `(offset, limit)`; the cache key is derived from the same pair.
    pub async fn with_pagination<E, F, Fut>(
        &self,
        operation_name: &str,
        page: u32,
        limit: u32,
        operation: F,
    ) -> Result<Paginated<I>, ServiceError>
    where
        F: FnOnce(u64, u32) -> Fut,
        Fut: Future<Output = Result<PageSlice<I>, E>>,
        E: Into<RawError>,
    {
        if page == 0 || limit == 0 {
            return Err(ServiceError::invalid_input("page and limit must both be at least 1")
                .with_context("service", self.service_id.as_str())
                .with_context("page", page)
                .with_context("limit", limit));
        }

        let offset = u64::from(page - 1) * u64::from(limit);
        let key = self.cache_key(operation_name, &[json!(offset), json!(limit)]);
        let slice = self.with_cache(&key, || operation(offset, limit), None).await?;

        Ok(Paginated {
            total_pages: slice.total_count.div_ceil(u64::from(limit)),
            total_count: slice.total_count,
            data: slice.items,
            page,
        })
    }
}
