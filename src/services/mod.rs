pub mod error_reporter;
pub mod identity_store;
pub mod stats_client;
pub mod unique_callers;
pub mod usage_counter;
pub mod usage_storage;

// Re-export commonly used types
pub use error_reporter::{ErrorReporter, LogErrorReporter, RecordingErrorReporter};
pub use identity_store::{IdentityClient, IdentityStore, InMemoryIdentityStore, LookupOutcome};
pub use stats_client::{InMemoryStatsClient, LogStatsClient, StatsClient};
pub use unique_callers::{unique_caller_key, UniqueCallerTracker, UNIQUE_CALLER_EXPIRY};
pub use usage_counter::{rate_limit_key, UsageCounter, RATE_LIMIT_EXPIRY};
pub use usage_storage::{create_usage_storage, MemoryUsageStorage, RedisUsageStorage, UsageStorage};
