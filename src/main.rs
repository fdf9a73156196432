use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use keygate_server::config::AppSettings;
use keygate_server::db::{create_pool, verify_connection, ApiKeyRepository};
use keygate_server::gate::Gatekeeper;
use keygate_server::models::AppState;
use keygate_server::routes::configure_routes;
use keygate_server::services::{
    create_usage_storage, IdentityStore, InMemoryIdentityStore, LogErrorReporter, LogStatsClient,
};
use keygate_server::utils::SystemClock;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    let backend_timeout = Duration::from_millis(app_settings.gate.backend_timeout_ms);

    // Identity store: Postgres when configured, seeded memory store otherwise
    let identity_store: Arc<dyn IdentityStore> = match &app_settings.database.url {
        Some(database_url) => {
            let pool = match create_pool(database_url, backend_timeout).await {
                Ok(pool) => pool,
                Err(e) => {
                    log::error!("Failed to create database connection pool: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = verify_connection(&pool).await {
                log::error!("Database connection verification failed: {}", e);
                std::process::exit(1);
            }
            Arc::new(ApiKeyRepository::new(pool))
        }
        None => {
            let store = InMemoryIdentityStore::with_keys(app_settings.database.seed_keys.clone());
            log::warn!(
                "DATABASE_URL is not set; using {} API key(s) from API_KEYS_SEED",
                store.len()
            );
            Arc::new(store)
        }
    };

    let clock = Arc::new(SystemClock);
    let usage_storage = match create_usage_storage(&app_settings.redis, clock.clone()).await {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Failed to initialize usage storage: {}", e);
            std::process::exit(1);
        }
    };

    let gatekeeper = Gatekeeper::new(
        identity_store,
        usage_storage,
        Arc::new(LogStatsClient),
        Arc::new(LogErrorReporter),
        clock,
        backend_timeout,
    );

    let host = app_settings.server.host.clone();
    let port = app_settings.server.port;
    let app_state = web::Data::new(AppState::new(app_settings, gatekeeper));

    log::info!("Starting server at http://{}:{}", host, port);
    let listener = TcpListener::bind(format!("{}:{}", host, port))?;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .run()
    .await
}
