// src/services/redis_service.rs
use crate::errors::SolaError;
use crate::models::RateRecord;
use crate::services::rate_limiter::RateLimitStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

/// Shared rate store so several instances see the same counters.
pub struct RedisRateStore {
    client: Client,
}

impl RedisRateStore {
    pub async fn new(redis_url: &str) -> Result<Self, SolaError> {
        let client = Client::open(redis_url).map_err(|e| SolaError::Redis(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        Ok(Self { client })
    }
}

/// Seconds until the record's window closes, at least one.
fn ttl_secs(record: &RateRecord, now_ms: i64) -> usize {
    let remaining_ms = (record.reset_time_ms - now_ms).max(0);
    (remaining_ms / 1000 + 1) as usize
}

#[async_trait]
impl RateLimitStore for RedisRateStore {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SolaError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        value
            .map(|v| serde_json::from_str(&v).map_err(|e| SolaError::Serialization(e.to_string())))
            .transpose()
    }

    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SolaError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        let value =
            serde_json::to_string(&record).map_err(|e| SolaError::Serialization(e.to_string()))?;
        let ttl = ttl_secs(&record, chrono::Utc::now().timestamp_millis());

        conn.set_ex::<_, _, ()>(key, value, ttl)
            .await
            .map_err(|e| SolaError::Redis(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_covers_rest_of_window() {
        let record = RateRecord {
            count: 1,
            reset_time_ms: 3_600_000,
        };
        assert_eq!(ttl_secs(&record, 0), 3601);
        assert_eq!(ttl_secs(&record, 3_600_000), 1);
        assert_eq!(ttl_secs(&record, 9_999_999), 1);
    }

    #[test]
    fn records_serialize_with_epoch_field() {
        let record = RateRecord {
            count: 4,
            reset_time_ms: 42,
        };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json, serde_json::json!({"count": 4, "resetTimeEpochMs": 42}));
    }
}
