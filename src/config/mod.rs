pub mod settings;

pub use settings::{AppSettings, DatabaseConfig, GateConfig, RedisConfig, ServerConfig};
