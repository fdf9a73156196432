use sqlx::error::Error as SqlxError;
use std::error::Error as StdError;
use std::fmt;

pub mod api_error;

pub use api_error::GateRejection;

/// Infrastructure failures. These never reach a caller of a gated endpoint
/// directly; the gatekeeper absorbs them and reports them instead.
#[derive(Debug)]
pub enum AppError {
    Database(String),
    Internal(String),
    Configuration(String),
    External(String),
    Timeout(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::External(e) => write!(f, "External service error: {}", e),
            AppError::Timeout(e) => write!(f, "Timed out: {}", e),
        }
    }
}

impl StdError for AppError {}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        AppError::Database(error.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> Self {
        AppError::External(format!("Redis error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failing_backend() {
        assert_eq!(
            AppError::Timeout("identity_lookup exceeded 50ms".into()).to_string(),
            "Timed out: identity_lookup exceeded 50ms"
        );
        assert_eq!(
            AppError::from(SqlxError::PoolTimedOut).to_string(),
            format!("Database error: {}", SqlxError::PoolTimedOut)
        );
    }
}
