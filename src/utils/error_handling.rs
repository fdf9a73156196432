use crate::error::AppError;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Runs a backend call under a hard deadline. An elapsed deadline becomes
/// `AppError::Timeout`, which callers treat exactly like an unreachable backend.
pub async fn with_backend_timeout<T, Fut>(
    timeout: Duration,
    operation_name: &str,
    operation: Fut,
) -> Result<T, AppError>
where
    Fut: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "Operation '{}' did not complete within {:?}",
                operation_name, timeout
            );
            Err(AppError::Timeout(format!(
                "{} exceeded {}ms",
                operation_name,
                timeout.as_millis()
            )))
        }
    }
}
