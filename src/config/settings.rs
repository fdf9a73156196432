use std::env;
use crate::error::AppError;
use crate::models::ApiKey;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub gate: GateConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres holding the `api_key` table. Without it the server falls back
    /// to an in-memory identity store seeded from `seed_keys`.
    pub url: Option<String>,
    pub seed_keys: Vec<ApiKey>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub key_prefix: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateConfig {
    /// Upper bound for every identity, counter and tracker call.
    pub backend_timeout_ms: u64,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // App config
        let app_name = lookup("APP_NAME").unwrap_or_else(|| "keygate".to_string());
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        // Database config
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let seed_keys = match lookup("API_KEYS_SEED") {
            Some(raw) => parse_api_key_seed(&raw)?,
            None => Vec::new(),
        };

        // Server config
        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // Redis config
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let redis_key_prefix = lookup("REDIS_KEY_PREFIX").filter(|prefix| !prefix.is_empty());

        // Gate config
        let backend_timeout_ms = lookup("BACKEND_TIMEOUT_MS")
            .unwrap_or_else(|| "2000".to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Configuration("BACKEND_TIMEOUT_MS must be a valid number".to_string()))?;
        if backend_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "BACKEND_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            database: DatabaseConfig {
                url: database_url,
                seed_keys,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
            },
            redis: RedisConfig {
                url: redis_url,
                key_prefix: redis_key_prefix,
            },
            gate: GateConfig { backend_timeout_ms },
        })
    }
}

/// Parses `key:name:maxreq[:log[:fallback]]` entries separated by commas.
pub fn parse_api_key_seed(raw: &str) -> Result<Vec<ApiKey>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_seed_entry)
        .collect()
}

fn parse_seed_entry(entry: &str) -> Result<ApiKey, AppError> {
    let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
    if parts.len() < 3 || parts.len() > 5 || parts[0].is_empty() {
        return Err(AppError::Configuration(format!(
            "API_KEYS_SEED entry '{}' must look like key:name:maxreq[:log[:fallback]]",
            entry
        )));
    }

    let max_requests_per_day = parts[2].parse::<u64>().map_err(|_| {
        AppError::Configuration(format!("API_KEYS_SEED entry '{}' has an invalid maxreq", entry))
    })?;
    let flag = |index: usize| -> Result<bool, AppError> {
        match parts.get(index) {
            None => Ok(false),
            Some(value) => value.parse::<bool>().map_err(|_| {
                AppError::Configuration(format!(
                    "API_KEYS_SEED entry '{}' has a flag that is not true/false",
                    entry
                ))
            }),
        }
    };

    Ok(ApiKey::new(parts[0], parts[1], max_requests_per_day)
        .with_log_usage(flag(3)?)
        .with_allow_fallback(flag(4)?))
}
