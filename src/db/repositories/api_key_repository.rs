use async_trait::async_trait;
use sqlx::{FromRow, PgPool, query_as};

use crate::error::AppError;
use crate::models::ApiKey;
use crate::services::identity_store::IdentityStore;

/// Row of the `api_key` table. Every column except the key itself may be
/// NULL in older rows.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub valid_key: String,
    pub name: Option<String>,
    pub maxreq: Option<i32>,
    pub log: Option<bool>,
    pub allow_fallback: Option<bool>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        let max_requests_per_day = row.maxreq.map(|limit| limit.max(0) as u64).unwrap_or(0);
        ApiKey::new(
            &row.valid_key,
            row.name.as_deref().unwrap_or(""),
            max_requests_per_day,
        )
        .with_log_usage(row.log.unwrap_or(false))
        .with_allow_fallback(row.allow_fallback.unwrap_or(false))
    }
}

pub struct ApiKeyRepository {
    db_pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Find an API key by the exact key the caller presented
    pub async fn find_by_valid_key(&self, valid_key: &str) -> Result<Option<ApiKey>, AppError> {
        let row = query_as::<_, ApiKeyRow>(
            r#"
            SELECT valid_key, name, maxreq, log, allow_fallback
            FROM api_key
            WHERE valid_key = $1
            "#,
        )
        .bind(valid_key)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| {
            log::error!("Database error finding API key: {}", e);
            AppError::Database(format!("Failed to fetch API key: {}", e))
        })?;

        Ok(row.map(ApiKey::from))
    }
}

#[async_trait]
impl IdentityStore for ApiKeyRepository {
    async fn find_by_valid_key(&self, valid_key: &str) -> Result<Option<ApiKey>, AppError> {
        ApiKeyRepository::find_by_valid_key(self, valid_key).await
    }
}
