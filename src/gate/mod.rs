//! Request gatekeeping for key-protected endpoints.
//!
//! [`Gatekeeper::check`] resolves the `key` query parameter to a caller,
//! enforces that caller's daily quota and records usage telemetry. Backend
//! failures on the way are reported and absorbed; only a [`GateRejection`]
//! ever reaches the caller.

pub mod endpoint;
pub mod preprocess;
pub mod schema;

use bytes::Bytes;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::GateRejection;
use crate::models::{AnonymousReason, CallerIdentity};
use crate::services::{
    rate_limit_key, unique_caller_key, ErrorReporter, IdentityClient, IdentityStore,
    LookupOutcome, StatsClient, UniqueCallerTracker, UsageCounter, UsageStorage,
};
use crate::utils::{parse_client_ip, Clock};

pub use endpoint::{read_raw_body, run_gated, ApiEndpoint, MAX_BODY_BYTES};
pub use preprocess::{preprocess, BodyError};
pub use schema::{Field, FieldKind, SchemaInvalid, Shape};

/// Metric label for requests without a `key` parameter.
pub const LABEL_NONE: &str = "none";
/// Metric label for requests whose key did not resolve.
pub const LABEL_INVALID: &str = "invalid";

/// Per-endpoint gate settings, declared next to the route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiViewConfig {
    /// Category used in metric names and unique caller keys, e.g. `locate`.
    pub view_type: String,
    /// Dotted URL path used as a metric tag, e.g. `v1.geolocate`.
    pub metric_path: String,
    pub check_api_key: bool,
    pub error_on_invalid_key: bool,
}

impl ApiViewConfig {
    pub fn new(view_type: &str, metric_path: &str) -> Self {
        Self {
            view_type: view_type.to_string(),
            metric_path: metric_path.to_string(),
            check_api_key: true,
            error_on_invalid_key: true,
        }
    }

    pub fn check_api_key(mut self, check: bool) -> Self {
        self.check_api_key = check;
        self
    }

    pub fn error_on_invalid_key(mut self, error: bool) -> Self {
        self.error_on_invalid_key = error;
        self
    }

    fn metric_name(&self) -> String {
        format!("{}.request", self.view_type)
    }
}

/// The parts of an inbound request the gate looks at.
#[derive(Clone, Debug, Default)]
pub struct GateRequest {
    pub api_key: Option<String>,
    pub client_addr: Option<String>,
    pub content_encoding: Option<String>,
    pub body: Bytes,
}

impl GateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_client_addr(mut self, addr: &str) -> Self {
        self.client_addr = Some(addr.to_string());
        self
    }

    pub fn with_content_encoding(mut self, encoding: &str) -> Self {
        self.content_encoding = Some(encoding.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

pub struct Gatekeeper {
    identities: IdentityClient,
    counter: UsageCounter,
    unique_callers: UniqueCallerTracker,
    stats: Arc<dyn StatsClient>,
    clock: Arc<dyn Clock>,
}

impl Gatekeeper {
    pub fn new(
        identity_store: Arc<dyn IdentityStore>,
        usage_storage: Arc<dyn UsageStorage>,
        stats: Arc<dyn StatsClient>,
        reporter: Arc<dyn ErrorReporter>,
        clock: Arc<dyn Clock>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            identities: IdentityClient::new(identity_store, reporter.clone(), backend_timeout),
            counter: UsageCounter::new(usage_storage.clone(), reporter.clone(), backend_timeout),
            unique_callers: UniqueCallerTracker::new(usage_storage, reporter, backend_timeout),
            stats,
            clock,
        }
    }

    pub fn unique_callers(&self) -> &UniqueCallerTracker {
        &self.unique_callers
    }

    /// Decides whether `request` may reach the handler of `view`, and as whom.
    pub async fn check(
        &self,
        view: &ApiViewConfig,
        request: &GateRequest,
    ) -> Result<CallerIdentity, GateRejection> {
        if !view.check_api_key {
            return Ok(CallerIdentity::Anonymous(AnonymousReason::KeyCheckDisabled));
        }

        let Some(credential) = request.api_key.as_deref() else {
            self.log_count(view, LABEL_NONE, false, request.client_addr.as_deref())
                .await;
            if view.error_on_invalid_key {
                debug!("Rejecting {} request without API key", view.metric_path);
                return Err(GateRejection::InvalidCredential);
            }
            return Ok(CallerIdentity::Anonymous(AnonymousReason::MissingKey));
        };

        match self.identities.lookup(Some(credential)).await {
            LookupOutcome::Found(api_key) => {
                self.log_count(
                    view,
                    &api_key.name,
                    api_key.log_usage,
                    request.client_addr.as_deref(),
                )
                .await;

                let window = rate_limit_key(credential, self.clock.now());
                if self
                    .counter
                    .check_and_increment(&window, api_key.max_requests_per_day)
                    .await
                {
                    debug!("API key '{}' is over its daily limit", api_key.name);
                    return Err(GateRejection::QuotaExceeded);
                }

                Ok(CallerIdentity::Resolved(api_key))
            }
            LookupOutcome::NotFound | LookupOutcome::Degraded => {
                self.log_count(view, LABEL_INVALID, false, request.client_addr.as_deref())
                    .await;
                if view.error_on_invalid_key {
                    debug!("Rejecting {} request with unknown API key", view.metric_path);
                    return Err(GateRejection::InvalidCredential);
                }
                Ok(CallerIdentity::Anonymous(AnonymousReason::UnknownKey))
            }
        }
    }

    /// Bumps the request counter for `label` and, for keys that opted in,
    /// adds the caller address to the day's unique caller set.
    async fn log_count(
        &self,
        view: &ApiViewConfig,
        label: &str,
        log_usage: bool,
        client_addr: Option<&str>,
    ) {
        self.stats.incr(
            &view.metric_name(),
            &[
                format!("path:{}", view.metric_path),
                format!("key:{}", label),
            ],
        );

        if !log_usage {
            return;
        }
        let Some(address) = client_addr.and_then(parse_client_ip) else {
            return;
        };

        let key = unique_caller_key(&view.view_type, label, self.clock.now());
        self.unique_callers.record(&key, address).await;
    }
}
