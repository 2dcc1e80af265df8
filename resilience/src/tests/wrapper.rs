//! Tests for the resilient call wrapper

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use shared::{ErrorCode, ManualClock, ServiceError};
use super::CallCounter;
use crate::cache::CacheConfig;
use crate::normalizer::RawError;
use crate::retry::RetryConfig;
use crate::wrapper::{PageSlice, ResilientCallWrapper};

fn wrapper<T: Clone + Send + 'static>(service: &str) -> (ResilientCallWrapper<T>, ManualClock) {
    let clock = ManualClock::new();
    let wrapper = ResilientCallWrapper::new(service, Arc::new(clock.clone()))
        .with_retry_config(
            RetryConfig::default()
                .with_max_attempts(3)
                .with_delays(Duration::from_millis(10), Duration::from_millis(100)),
        )
        .with_cache_config(
            CacheConfig::default()
                .with_ttl(Duration::from_secs(30))
                .with_max_size(8),
        );
    (wrapper, clock)
}

async fn fetch_value(calls: CallCounter, value: u64) -> Result<u64, RawError> {
    calls.hit();
    Ok(value)
}

#[tokio::test]
async fn test_cache_hit_skips_operation_until_ttl_elapses() {
    let (kpis, clock) = wrapper::<u64>("kpis");
    let calls = CallCounter::new();
    let key = kpis.cache_key("revenue", &[json!("2024")]);

    let first = kpis.with_cache(&key, || fetch_value(calls.clone(), 7), None).await;
    let second = kpis.with_cache(&key, || fetch_value(calls.clone(), 8), None).await;
    assert_eq!(assert_ok!(first), 7);
    assert_eq!(assert_ok!(second), 7);
    assert_eq!(calls.count(), 1);

    clock.advance(Duration::from_secs(31));
    let third = kpis.with_cache(&key, || fetch_value(calls.clone(), 9), None).await;
    assert_eq!(assert_ok!(third), 9);
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_failures_are_never_cached() {
    let (kpis, _clock) = wrapper::<u64>("kpis");
    let calls = CallCounter::new();

    let failed = kpis
        .with_cache(
            "kpis:churn:[]",
            || async {
                calls.hit();
                Err::<u64, RawError>(RawError::type_mismatch("Failed to fetch"))
            },
            None,
        )
        .await;
    let error = assert_err!(failed);
    assert_eq!(error.code, ErrorCode::NetworkError);
    assert_eq!(error.context["service"], "kpis");
    assert_eq!(kpis.cache_len().await, 0);

    let recovered = kpis.with_cache("kpis:churn:[]", || fetch_value(calls.clone(), 3), None).await;
    assert_eq!(assert_ok!(recovered), 3);
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_retry_and_cache_retries_once_then_serves_cached() {
    let (charts, clock) = wrapper::<Vec<u32>>("charts");
    let calls = CallCounter::new();
    let operation = || {
        let calls = calls.clone();
        async move {
            if calls.hit() < 2 {
                Err(RawError::Http { status: 503, message: "warming up".to_string() })
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    };

    let first = charts.with_retry_and_cache("charts:daily:[]", operation, None, None).await;
    assert_eq!(assert_ok!(first), vec![1, 2, 3]);
    assert_eq!(calls.count(), 2);
    assert_eq!(clock.recorded_sleeps(), vec![Duration::from_millis(10)]);

    let second = charts.with_retry_and_cache("charts:daily:[]", operation, None, None).await;
    assert_eq!(assert_ok!(second), vec![1, 2, 3]);
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_surface_final_error_and_cache_nothing() {
    let (charts, _clock) = wrapper::<Vec<u32>>("charts");
    let calls = CallCounter::new();
    let retry = RetryConfig::default()
        .with_max_attempts(2)
        .with_delays(Duration::from_millis(1), Duration::from_millis(1));

    let result = charts
        .with_retry_and_cache(
            "charts:hourly:[]",
            || {
                let calls = calls.clone();
                async move {
                    calls.hit();
                    Err::<Vec<u32>, RawError>(RawError::Timeout { message: "slow".to_string() })
                }
            },
            Some(&retry),
            None,
        )
        .await;

    assert_eq!(assert_err!(result).code, ErrorCode::Timeout);
    assert_eq!(calls.count(), 2);
    assert!(!charts.is_cached("charts:hourly:[]").await);
}

#[tokio::test]
async fn test_concurrent_misses_both_invoke_operation() {
    let (kpis, _clock) = wrapper::<u64>("kpis");
    let calls = CallCounter::new();

    let (a, b) = tokio::join!(
        kpis.with_cache("kpis:total:[]", || async {
            calls.hit();
            tokio::task::yield_now().await;
            Ok::<u64, RawError>(1)
        }, None),
        kpis.with_cache("kpis:total:[]", || async {
            calls.hit();
            tokio::task::yield_now().await;
            Ok::<u64, RawError>(2)
        }, None),
    );

    assert_ok!(a);
    assert_ok!(b);
    assert_eq!(calls.count(), 2);
}

#[tokio::test]
async fn test_clear_cache_by_pattern() {
    let (kpis, _clock) = wrapper::<u64>("kpis");
    let calls = CallCounter::new();

    for (op, value) in [("revenue", 1), ("churn", 2), ("revenueByRegion", 3)] {
        let key = kpis.cache_key(op, &[]);
        assert_ok!(kpis.with_cache(&key, || fetch_value(calls.clone(), value), None).await);
    }

    assert_eq!(kpis.clear_cache(Some("revenue")).await, 2);
    assert_eq!(kpis.cache_len().await, 1);
    assert_eq!(kpis.clear_cache(None).await, 1);
}

#[tokio::test]
async fn test_custom_key_generator_applies_to_service_keys() {
    let clock = ManualClock::new();
    let wrapper: ResilientCallWrapper<u64> = ResilientCallWrapper::new("kpis", Arc::new(clock))
        .with_cache_config(
            CacheConfig::default().with_key_generator(|params| params.len().to_string()),
        );

    assert_eq!(wrapper.cache_key("revenue", &[json!(1), json!(2)]), "kpis:revenue:2");
}

#[tokio::test]
async fn test_pagination_computes_offset_and_pages() {
    let (orders, _clock) = wrapper::<PageSlice<String>>("orders");
    let calls = CallCounter::new();

    let page = orders
        .with_pagination("list", 3, 20, |offset, limit| {
            let calls = calls.clone();
            async move {
                calls.hit();
                assert_eq!((offset, limit), (40, 20));
                Ok::<_, RawError>(PageSlice {
                    items: vec!["order-41".to_string(), "order-42".to_string()],
                    total_count: 42,
                })
            }
        })
        .await;

    let page = assert_ok!(page);
    assert_eq!(page.page, 3);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.total_count, 42);
    assert_eq!(page.data.len(), 2);
    assert!(orders.is_cached(&orders.cache_key("list", &[json!(40), json!(20)])).await);

    let again = orders
        .with_pagination("list", 3, 20, |_, _| async {
            calls.hit();
            Ok::<_, RawError>(PageSlice { items: Vec::new(), total_count: 0 })
        })
        .await;
    assert_eq!(assert_ok!(again).data.len(), 2);
    assert_eq!(calls.count(), 1);
}

#[tokio::test]
async fn test_pagination_rejects_zero_page_or_limit() {
    let (orders, _clock) = wrapper::<PageSlice<String>>("orders");

    let result = orders
        .with_pagination("list", 0, 20, |_, _| async {
            Ok::<_, ServiceError>(PageSlice { items: Vec::new(), total_count: 0 })
        })
        .await;

    assert_eq!(assert_err!(result).code, ErrorCode::InvalidInput);
}
