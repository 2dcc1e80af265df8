//! Resilience layer for backend calls
//!
//! Wraps arbitrary asynchronous operations with bounded exponential-backoff
//! retry, a typed TTL cache and error normalization. Transport-agnostic: the
//! operation itself is always supplied by the caller.

pub mod cache;
pub mod normalizer;
pub mod retry;
pub mod wrapper;

#[cfg(test)]
mod tests;

pub use cache::{
    create_cache_key, default_key_generator, CacheConfig, CacheEntry, KeyGenerator, TtlCache,
};
pub use normalizer::{enhance, RawError, CONFLICT_CODES};
pub use retry::{default_retry_condition, with_retry, RetryCondition, RetryConfig};
pub use wrapper::{PageSlice, Paginated, ResilientCallWrapper};
