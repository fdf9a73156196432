pub mod api_key;
pub mod runtime_config;

pub use api_key::{AnonymousReason, ApiKey, CallerIdentity};
pub use runtime_config::AppState;
