use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::models::ApiKey;
use crate::services::error_reporter::ErrorReporter;
use crate::utils::with_backend_timeout;

/// Persistent store of caller records, addressed by the presented key.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_valid_key(&self, valid_key: &str) -> Result<Option<ApiKey>, AppError>;
}

/// Identity store kept in process. Used when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    keys: DashMap<String, ApiKey>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: impl IntoIterator<Item = ApiKey>) -> Self {
        let store = Self::new();
        for key in keys {
            store.insert(key);
        }
        store
    }

    pub fn insert(&self, key: ApiKey) {
        self.keys.insert(key.valid_key.clone(), key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_valid_key(&self, valid_key: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self.keys.get(valid_key).map(|entry| entry.value().clone()))
    }
}

/// Result of resolving a credential. `Degraded` is a "not found" produced by
/// a failing store rather than by an unknown key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(ApiKey),
    NotFound,
    Degraded,
}

/// Identity lookups that never fail: store errors and timeouts are reported
/// once and collapse to `Degraded`.
#[derive(Clone)]
pub struct IdentityClient {
    store: Arc<dyn IdentityStore>,
    reporter: Arc<dyn ErrorReporter>,
    timeout: Duration,
}

impl IdentityClient {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        reporter: Arc<dyn ErrorReporter>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            reporter,
            timeout,
        }
    }

    pub async fn lookup(&self, credential: Option<&str>) -> LookupOutcome {
        let Some(credential) = credential else {
            return LookupOutcome::NotFound;
        };

        let result = with_backend_timeout(
            self.timeout,
            "identity_lookup",
            self.store.find_by_valid_key(credential),
        )
        .await;

        match result {
            Ok(Some(key)) => {
                debug!("Resolved API key to '{}'", key.name);
                LookupOutcome::Found(key)
            }
            Ok(None) => LookupOutcome::NotFound,
            Err(e) => {
                // if we cannot reach the identity store, treat the key as unknown
                warn!("Identity lookup failed, treating key as unresolved: {}", e);
                self.reporter.report("identity_lookup", &e);
                LookupOutcome::Degraded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::error_reporter::RecordingErrorReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityStore for FailingStore {
        async fn find_by_valid_key(&self, _valid_key: &str) -> Result<Option<ApiKey>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Database("connection refused".to_string()))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl IdentityStore for SlowStore {
        async fn find_by_valid_key(&self, _valid_key: &str) -> Result<Option<ApiKey>, AppError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    fn client(store: Arc<dyn IdentityStore>, reporter: Arc<RecordingErrorReporter>) -> IdentityClient {
        IdentityClient::new(store, reporter, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_lookup_found_and_not_found() {
        let store = Arc::new(InMemoryIdentityStore::with_keys(vec![ApiKey::new(
            "abc", "partner", 10,
        )]));
        let reporter = Arc::new(RecordingErrorReporter::new());
        let client = client(store, reporter.clone());

        match client.lookup(Some("abc")).await {
            LookupOutcome::Found(key) => assert_eq!(key.name, "partner"),
            other => panic!("Expected Found, got: {:?}", other),
        }
        assert_eq!(client.lookup(Some("nope")).await, LookupOutcome::NotFound);
        assert_eq!(reporter.count(), 0);
    }

    #[tokio::test]
    async fn test_absent_credential_skips_store() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let reporter = Arc::new(RecordingErrorReporter::new());
        let client = client(store.clone(), reporter.clone());

        assert_eq!(client.lookup(None).await, LookupOutcome::NotFound);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_once_and_degrades() {
        let store = Arc::new(FailingStore {
            calls: AtomicUsize::new(0),
        });
        let reporter = Arc::new(RecordingErrorReporter::new());
        let client = client(store, reporter.clone());

        let outcome = client.lookup(Some("abc")).await;
        assert_eq!(outcome, LookupOutcome::Degraded);
        assert_eq!(reporter.count(), 1);
        assert_eq!(reporter.contexts(), vec!["identity_lookup"]);
    }

    #[tokio::test]
    async fn test_store_timeout_degrades() {
        let reporter = Arc::new(RecordingErrorReporter::new());
        let client = client(Arc::new(SlowStore), reporter.clone());

        assert_eq!(client.lookup(Some("abc")).await, LookupOutcome::Degraded);
        assert_eq!(reporter.count(), 1);
    }
}
