//! # simtox-guard
//!
//! Rate limiting, response caching, and in-flight request coalescing for
//! simtox provider calls.
//!
//! Every provider call goes through [`ProviderGuard::execute`]:
//!
//! 1. An unexpired cached response for the key is returned directly, without
//!    spending a rate-limit token.
//! 2. If another task is already fetching the same key, the caller waits for
//!    that result instead of issuing a duplicate request. If the fetching task
//!    is dropped before finishing, one waiter takes over the fetch.
//! 3. Otherwise the caller takes a token from the provider's bucket (waiting
//!    up to the configured budget), runs the fetch under the upstream
//!    deadline, caches a successful result, and publishes the outcome to any
//!    waiters.
//!
//! One guard exists per provider (each has its own quota); guards may share
//! one [`ResponseCache`], since keys are prefixed with the provider name.

pub mod bucket;
pub mod cache;

pub use bucket::TokenBucket;
pub use cache::{CacheEntry, ResponseCache};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use simtox_core::ProviderError;
use tokio::sync::watch;

type Outcome = Result<Arc<Value>, ProviderError>;
type InFlight = Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>;

/// Limits applied by one [`ProviderGuard`].
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Sustained request rate.
    pub per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// Longest a call waits for a token.
    pub max_wait: Duration,
    /// Deadline for the wrapped upstream call.
    pub upstream_timeout: Duration,
}

/// Counters for observing guard behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    /// Calls answered from the cache.
    pub cache_hits: u64,
    /// Calls that reached the upstream provider.
    pub upstream_calls: u64,
    /// Calls that waited on an identical in-flight request.
    pub coalesced: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    upstream_calls: AtomicU64,
    coalesced: AtomicU64,
}

enum Role {
    Cached(Arc<Value>),
    Follower(watch::Receiver<Option<Outcome>>),
    Leader(watch::Sender<Option<Outcome>>),
}

/// Rate limiter, cache, and request coalescer for one provider.
pub struct ProviderGuard {
    provider: String,
    bucket: TokenBucket,
    cache: Arc<ResponseCache>,
    in_flight: InFlight,
    max_wait: Duration,
    upstream_timeout: Duration,
    counters: Counters,
}

impl ProviderGuard {
    #[must_use]
    pub fn new(provider: &str, settings: &GuardSettings, cache: Arc<ResponseCache>) -> Self {
        Self {
            provider: provider.to_string(),
            bucket: TokenBucket::new(settings.per_second, settings.burst),
            cache,
            in_flight: Mutex::new(HashMap::new()),
            max_wait: settings.max_wait,
            upstream_timeout: settings.upstream_timeout,
            counters: Counters::default(),
        }
    }

    /// Burst size of this provider's token bucket.
    #[must_use]
    pub fn burst(&self) -> u32 {
        self.bucket.burst()
    }

    #[must_use]
    pub fn stats(&self) -> GuardStats {
        GuardStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            upstream_calls: self.counters.upstream_calls.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Run `fetch` for `key` under this guard's cache, coalescing, rate
    /// limit, and deadline.
    ///
    /// # Errors
    ///
    /// Returns the fetch's own [`ProviderError`], or
    /// [`ProviderError::RateLimitExceeded`] when no token arrives in time, or
    /// [`ProviderError::UpstreamTimeout`] when the fetch exceeds the deadline.
    pub async fn execute<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let key = format!("{}:{key}", self.provider);

        // A call that waits more than once, after a dropped leader, counts once.
        let mut coalesced = false;
        let sender = loop {
            match self.join(&key) {
                Role::Cached(value) => {
                    self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(%key, "cache hit");
                    return self.decode(&value);
                }
                Role::Follower(mut receiver) => {
                    if !coalesced {
                        coalesced = true;
                        self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::debug!(%key, "waiting on in-flight request");
                    let published = receiver
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|outcome| (*outcome).clone());
                    match published {
                        Some(outcome) => return outcome.and_then(|value| self.decode(&value)),
                        // The leading task was dropped; try again, possibly as leader.
                        None => continue,
                    }
                }
                Role::Leader(sender) => break sender,
            }
        };

        let _slot = SlotGuard {
            in_flight: &self.in_flight,
            key: &key,
        };
        let outcome = self.fetch_upstream(&key, fetch).await;
        if let Ok(value) = &outcome {
            self.cache.insert(&key, Arc::clone(value));
        }
        sender.send_replace(Some(outcome.clone()));
        outcome.and_then(|value| self.decode(&value))
    }

    /// Decide this caller's role under the in-flight lock.
    fn join(&self, key: &str) -> Role {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = self.cache.get(key) {
            return Role::Cached(Arc::clone(&entry.value));
        }
        if let Some(receiver) = in_flight.get(key) {
            return Role::Follower(receiver.clone());
        }
        let (sender, receiver) = watch::channel(None);
        in_flight.insert(key.to_string(), receiver);
        Role::Leader(sender)
    }

    async fn fetch_upstream<T, F, Fut>(&self, key: &str, fetch: F) -> Outcome
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.bucket
            .acquire(self.max_wait)
            .await
            .map_err(|exhausted| ProviderError::RateLimitExceeded {
                provider: self.provider.clone(),
                waited: exhausted.waited,
            })?;

        self.counters.upstream_calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%key, "calling upstream");

        let value = tokio::time::timeout(self.upstream_timeout, fetch())
            .await
            .map_err(|_| ProviderError::UpstreamTimeout {
                provider: self.provider.clone(),
                after: self.upstream_timeout,
            })??;

        serde_json::to_value(&value).map(Arc::new).map_err(|e| {
            ProviderError::upstream(&self.provider, format!("encode response: {e}"))
        })
    }

    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T, ProviderError> {
        T::deserialize(value).map_err(|e| {
            ProviderError::upstream(&self.provider, format!("decode cached response: {e}"))
        })
    }
}

/// Removes the in-flight entry when the leading call finishes or is dropped.
struct SlotGuard<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn settings() -> GuardSettings {
        GuardSettings {
            per_second: 5.0,
            burst: 10,
            max_wait: Duration::from_secs(30),
            upstream_timeout: Duration::from_secs(10),
        }
    }

    fn guard_with(settings: &GuardSettings) -> ProviderGuard {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(3600), 64));
        ProviderGuard::new("stub", settings, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn identical_keys_within_ttl_hit_upstream_once() {
        let guard = guard_with(&settings());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<String> = guard
                .execute("events:aspirin", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["headache".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["headache".to_string()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            guard.stats(),
            GuardStats {
                cache_hits: 2,
                upstream_calls: 1,
                coalesced: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cached_calls_do_not_spend_tokens() {
        let guard = guard_with(&GuardSettings {
            burst: 1,
            per_second: 0.001,
            max_wait: Duration::ZERO,
            ..settings()
        });

        let first: u32 = guard.execute("k", || async { Ok(7) }).await.unwrap();
        let second: u32 = guard.execute("k", || async { Ok(8) }).await.unwrap();
        assert_eq!((first, second), (7, 7));

        let err = guard
            .execute::<u32, _, _>("other", || async { Ok(9) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimitExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_calls_are_coalesced() {
        let guard = guard_with(&settings());
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("CHEMBL25".to_string())
        };
        let (a, b, c) = tokio::join!(
            guard.execute::<String, _, _>("compound", fetch),
            guard.execute::<String, _, _>("compound", fetch),
            guard.execute::<String, _, _>("compound", fetch),
        );

        assert_eq!(a.unwrap(), "CHEMBL25");
        assert_eq!(b.unwrap(), "CHEMBL25");
        assert_eq!(c.unwrap(), "CHEMBL25");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.stats().coalesced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_but_not_cached() {
        let guard = guard_with(&settings());
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<u32, _>(ProviderError::not_found("stub", "nothing"))
        };
        let (a, b) = tokio::join!(guard.execute("k", fetch), guard.execute("k", fetch));
        assert!(matches!(a, Err(ProviderError::NotFound { .. })));
        assert!(matches!(b, Err(ProviderError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _ = guard.execute("k", fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out() {
        let guard = guard_with(&GuardSettings {
            upstream_timeout: Duration::from_secs(1),
            ..settings()
        });

        let err = guard
            .execute::<u32, _, _>("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UpstreamTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn follower_takes_over_when_leader_is_dropped() {
        let guard = guard_with(&settings());

        let leader = guard.execute::<u32, _, _>("k", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        });
        let follower = async {
            // Let the leader register first.
            tokio::time::sleep(Duration::from_millis(10)).await;
            guard.execute::<u32, _, _>("k", || async { Ok(2) }).await
        };

        // Dropping the leader after 100ms abandons its fetch.
        let leader = async {
            let _ = tokio::time::timeout(Duration::from_millis(100), leader).await;
        };
        let ((), value) = tokio::join!(leader, follower);
        assert_eq!(value.unwrap(), 2);
        assert_eq!(guard.stats().coalesced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_again_after_takeover_counts_once() {
        let guard = guard_with(&settings());
        let calls = AtomicUsize::new(0);

        let leader = async {
            let abandoned = guard.execute::<u32, _, _>("k", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            });
            let _ = tokio::time::timeout(Duration::from_millis(100), abandoned).await;
        };
        // Both followers wake when the leader is dropped; one takes over and
        // the other waits a second time.
        let follower = |delay: u64| {
            let calls = &calls;
            let guard = &guard;
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                guard
                    .execute::<u32, _, _>("k", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(2)
                    })
                    .await
            }
        };

        let ((), a, b) = tokio::join!(leader, follower(10), follower(20));
        assert_eq!((a.unwrap(), b.unwrap()), (2, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            guard.stats(),
            GuardStats {
                cache_hits: 0,
                upstream_calls: 2,
                coalesced: 2,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn guards_sharing_a_cache_do_not_collide() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(3600), 64));
        let structure = ProviderGuard::new("chembl", &settings(), Arc::clone(&cache));
        let events = ProviderGuard::new("openfda", &settings(), Arc::clone(&cache));

        let a: String = structure.execute("aspirin", || async { Ok("a".into()) }).await.unwrap();
        let b: String = events.execute("aspirin", || async { Ok("b".into()) }).await.unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("a", "b"));
        assert_eq!(cache.len(), 2);
    }
}
