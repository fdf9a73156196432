use chrono::{DateTime, Utc};
use log::warn;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::services::error_reporter::ErrorReporter;
use crate::services::usage_storage::UsageStorage;
use crate::utils::with_backend_timeout;

/// Retention of a daily unique caller set: 8 days, refreshed on every write.
pub const UNIQUE_CALLER_EXPIRY: Duration = Duration::from_secs(691_200);

/// `apiuser:{view_type}:{label}:{YYYY-MM-DD}` for the UTC day of `now`.
pub fn unique_caller_key(view_type: &str, label: &str, now: DateTime<Utc>) -> String {
    format!("apiuser:{}:{}:{}", view_type, label, now.format("%Y-%m-%d"))
}

/// Best-effort tracking of distinct caller addresses per key and day.
#[derive(Clone)]
pub struct UniqueCallerTracker {
    storage: Arc<dyn UsageStorage>,
    reporter: Arc<dyn ErrorReporter>,
    timeout: Duration,
}

impl UniqueCallerTracker {
    pub fn new(
        storage: Arc<dyn UsageStorage>,
        reporter: Arc<dyn ErrorReporter>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            reporter,
            timeout,
        }
    }

    /// Adds `address` to the set at `key`. Failures are reported and
    /// swallowed; the return value only says whether the write landed.
    pub async fn record(&self, key: &str, address: IpAddr) -> bool {
        let member = address.to_string();
        let result = with_backend_timeout(
            self.timeout,
            "unique_caller_record",
            self.storage.add_unique(key, &member, UNIQUE_CALLER_EXPIRY),
        )
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to record unique caller for {}: {}", key, e);
                self.reporter.report("unique_callers", &e);
                false
            }
        }
    }

    /// Approximate number of distinct addresses recorded at `key`.
    pub async fn estimate(&self, key: &str) -> Result<u64, AppError> {
        with_backend_timeout(self.timeout, "unique_caller_count", self.storage.count_unique(key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error_reporter::RecordingErrorReporter;
    use crate::services::usage_storage::MemoryUsageStorage;
    use crate::utils::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct SlowStorage;

    #[async_trait]
    impl UsageStorage for SlowStorage {
        async fn incr_with_expiry(&self, _key: &str, _ttl: Duration) -> Result<u64, AppError> {
            Ok(1)
        }

        async fn add_unique(&self, _key: &str, _member: &str, _ttl: Duration) -> Result<(), AppError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn count_unique(&self, _key: &str) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    fn tracker_with_clock() -> (UniqueCallerTracker, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
        ));
        let tracker = UniqueCallerTracker::new(
            Arc::new(MemoryUsageStorage::new(clock.clone())),
            Arc::new(RecordingErrorReporter::new()),
            Duration::from_millis(200),
        );
        (tracker, clock)
    }

    #[test]
    fn test_unique_caller_key_format() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 1).unwrap();
        assert_eq!(
            unique_caller_key("locate", "partner", now),
            "apiuser:locate:partner:2024-07-01"
        );
    }

    #[tokio::test]
    async fn test_same_address_twice_counts_once() {
        let (tracker, _) = tracker_with_clock();
        let address: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(tracker.record("apiuser:locate:p:2024-07-01", address).await);
        let before = tracker.estimate("apiuser:locate:p:2024-07-01").await.unwrap();
        assert!(tracker.record("apiuser:locate:p:2024-07-01", address).await);
        let after = tracker.estimate("apiuser:locate:p:2024-07-01").await.unwrap();

        assert_eq!(before, 1);
        assert!(after <= before + 1);
        assert_eq!(after, 1);
    }

    #[tokio::test]
    async fn test_set_is_gone_after_eight_idle_days() {
        let (tracker, clock) = tracker_with_clock();
        let address: IpAddr = "2001:db8::7".parse().unwrap();

        tracker.record("apiuser:locate:p:2024-07-01", address).await;
        clock.advance(chrono::Duration::days(8));

        assert_eq!(tracker.estimate("apiuser:locate:p:2024-07-01").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slow_backend_is_reported_not_raised() {
        let reporter = Arc::new(RecordingErrorReporter::new());
        let tracker = UniqueCallerTracker::new(
            Arc::new(SlowStorage),
            reporter.clone(),
            Duration::from_millis(20),
        );

        assert!(!tracker.record("k", "10.0.0.1".parse().unwrap()).await);
        assert_eq!(reporter.contexts(), vec!["unique_callers"]);
    }
}
