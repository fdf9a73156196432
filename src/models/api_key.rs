use serde::{Deserialize, Serialize};

/// A caller record resolved from a presented `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub valid_key: String,
    /// Short label used in metrics and unique caller keys.
    pub name: String,
    /// Daily request quota, 0 means unlimited.
    pub max_requests_per_day: u64,
    pub log_usage: bool,
    pub allow_fallback: bool,
}

impl ApiKey {
    pub fn new(valid_key: &str, name: &str, max_requests_per_day: u64) -> Self {
        let name = if name.is_empty() { valid_key } else { name };
        Self {
            valid_key: valid_key.to_string(),
            name: name.to_string(),
            max_requests_per_day,
            log_usage: false,
            allow_fallback: false,
        }
    }

    pub fn with_log_usage(mut self, log_usage: bool) -> Self {
        self.log_usage = log_usage;
        self
    }

    pub fn with_allow_fallback(mut self, allow_fallback: bool) -> Self {
        self.allow_fallback = allow_fallback;
        self
    }
}

/// Why a request carries no resolved key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymousReason {
    /// The endpoint does not check keys at all.
    KeyCheckDisabled,
    /// No `key` query parameter was sent.
    MissingKey,
    /// A key was sent but did not resolve, or the identity store was down.
    UnknownKey,
}

/// The identity handed to a gated handler. Never optional: callers without a
/// resolved key get an explicit `Anonymous` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallerIdentity {
    Resolved(ApiKey),
    Anonymous(AnonymousReason),
}

impl CallerIdentity {
    pub fn name(&self) -> &str {
        match self {
            CallerIdentity::Resolved(key) => &key.name,
            CallerIdentity::Anonymous(_) => "",
        }
    }

    pub fn valid_key(&self) -> Option<&str> {
        match self {
            CallerIdentity::Resolved(key) => Some(&key.valid_key),
            CallerIdentity::Anonymous(_) => None,
        }
    }

    pub fn max_requests_per_day(&self) -> u64 {
        match self {
            CallerIdentity::Resolved(key) => key.max_requests_per_day,
            CallerIdentity::Anonymous(_) => 0,
        }
    }

    pub fn log_usage(&self) -> bool {
        match self {
            CallerIdentity::Resolved(key) => key.log_usage,
            CallerIdentity::Anonymous(_) => false,
        }
    }

    pub fn allow_fallback(&self) -> bool {
        match self {
            CallerIdentity::Resolved(key) => key.allow_fallback,
            CallerIdentity::Anonymous(_) => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, CallerIdentity::Resolved(_))
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        match self {
            CallerIdentity::Resolved(key) => Some(key),
            CallerIdentity::Anonymous(_) => None,
        }
    }
}
