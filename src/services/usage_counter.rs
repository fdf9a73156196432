use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::services::error_reporter::ErrorReporter;
use crate::services::usage_storage::UsageStorage;
use crate::utils::with_backend_timeout;

/// Lifetime of a daily counter, counted from its first increment.
pub const RATE_LIMIT_EXPIRY: Duration = Duration::from_secs(86_400);

/// `apilimit:{credential}:{YYYYMMDD}` for the UTC day of `now`.
pub fn rate_limit_key(credential: &str, now: DateTime<Utc>) -> String {
    format!("apilimit:{}:{}", credential, now.format("%Y%m%d"))
}

/// Daily request quota enforcement on top of a shared counter backend.
#[derive(Clone)]
pub struct UsageCounter {
    storage: Arc<dyn UsageStorage>,
    reporter: Arc<dyn ErrorReporter>,
    timeout: Duration,
}

impl UsageCounter {
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

    /// Counts one request against `key` and returns whether the count is now
    /// above `limit`.
    ///
    /// A `limit` of 0 means unlimited: the request is still counted but never
    /// exceeds. If the backend is unreachable the request is not limited.
    pub async fn check_and_increment(&self, key: &str, limit: u64) -> bool {
        let result = with_backend_timeout(
            self.timeout,
            "rate_limit_increment",
            self.storage.incr_with_expiry(key, RATE_LIMIT_EXPIRY),
        )
        .await;

        match result {
            Ok(count) => {
                debug!("Usage counter {} at {} (limit {})", key, count, limit);
                limit > 0 && count > limit
            }
            Err(e) => {
                warn!("Usage counter {} unavailable, not limiting: {}", key, e);
                self.reporter.report("rate_limit", &e);
                false
            }
        }
    }
}
