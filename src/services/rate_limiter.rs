// src/services/rate_limiter.rs
use crate::errors::SolaError;
use crate::models::{RateDecision, RateRecord};
use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RatePolicy {
    pub fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(3600),
        }
    }

    fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Backing storage for rate records. Implementations need not be atomic
/// across a get/set pair.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SolaError>;
    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SolaError>;
}

/// Process-local store. Records are never evicted.
#[derive(Default)]
pub struct InMemoryRateStore {
    records: Mutex<HashMap<String, RateRecord>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records are plain values, so a panic elsewhere cannot leave one half
    /// written; a poisoned lock is taken over rather than failing every
    /// later request.
    fn records(&self) -> MutexGuard<'_, HashMap<String, RateRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("rate store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateStore {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SolaError> {
        Ok(self.records().get(key).copied())
    }

    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SolaError> {
        self.records().insert(key.to_string(), record);
        Ok(())
    }
}

/// Fixed-window request counter keyed by client identifier.
pub struct RateLimiter {
    namespace: &'static str,
    policy: RatePolicy,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(namespace: &'static str, policy: RatePolicy, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            namespace,
            policy,
            store,
        }
    }

    pub fn in_memory(namespace: &'static str, policy: RatePolicy) -> Self {
        Self::new(namespace, policy, Arc::new(InMemoryRateStore::new()))
    }

    pub async fn check(&self, client_id: &str) -> RateDecision {
        self.check_at(client_id, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// Counts one request at `now_ms`. Store failures allow the request.
    pub async fn check_at(&self, client_id: &str, now_ms: i64) -> RateDecision {
        let key = format!("ratelimit:{}:{}", self.namespace, client_id);
        let limit = self.policy.limit;

        let existing = match self.store.get(&key).await {
            Ok(record) => record,
            Err(e) => {
                warn!("[{}] rate store read failed, allowing: {}", self.namespace, e);
                return RateDecision {
                    allowed: true,
                    remaining: limit.saturating_sub(1),
                };
            }
        };

        let record = match existing {
            Some(record) if now_ms <= record.reset_time_ms => {
                if record.count >= limit {
                    return RateDecision {
                        allowed: false,
                        remaining: 0,
                    };
                }
                RateRecord {
                    count: record.count + 1,
                    ..record
                }
            }
            _ => RateRecord {
                count: 1,
                reset_time_ms: now_ms + self.policy.window_ms(),
            },
        };

        if let Err(e) = self.store.set(&key, record).await {
            warn!("[{}] rate store write failed: {}", self.namespace, e);
        }

        RateDecision {
            allowed: true,
            remaining: limit.saturating_sub(record.count),
        }
    }
}
