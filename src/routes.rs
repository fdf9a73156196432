use actix_web::web;
use crate::handlers;

/// Configures every route. `/health` is open; everything under `/v1` is gated
/// per endpoint.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health_check));

    cfg.service(
        web::scope("/v1")
            .route("/ping", web::post().to(handlers::ping::ping))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use crate::gate::Gatekeeper;
    use crate::models::{ApiKey, AppState};
    use crate::services::{
        InMemoryIdentityStore, InMemoryStatsClient, MemoryUsageStorage, RecordingErrorReporter,
    };
    use crate::utils::FixedClock;
    use actix_web::{http::StatusCode, test, App};
    use chrono::{TimeZone, Utc};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    fn state(stats: Arc<InMemoryStatsClient>) -> AppState {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let identities = InMemoryIdentityStore::with_keys(vec![
            ApiKey::new("test", "tester", 0),
            ApiKey::new("tiny", "tiny-quota", 1),
        ]);
        let gatekeeper = Gatekeeper::new(
            Arc::new(identities),
            Arc::new(MemoryUsageStorage::new(clock.clone())),
            stats,
            Arc::new(RecordingErrorReporter::new()),
            clock,
            Duration::from_millis(200),
        );
        let settings = AppSettings::from_lookup(|_| None).unwrap();
        AppState::new(settings, gatekeeper)
    }

    macro_rules! app {
        ($stats:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state($stats)))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_health_is_open() {
        let app = app!(Arc::new(InMemoryStatsClient::new()));
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "keygate");
    }

    #[actix_web::test]
    async fn test_ping_without_key_is_rejected() {
        let stats = Arc::new(InMemoryStatsClient::new());
        let app = app!(stats.clone());

        let req = test::TestRequest::post().uri("/v1/ping").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["errors"][0]["reason"], "keyInvalid");
        assert_eq!(stats.count("ping.request", &["path:v1.ping", "key:none"]), 1);
    }

    #[actix_web::test]
    async fn test_ping_with_valid_key_echoes_identity() {
        let app = app!(Arc::new(InMemoryStatsClient::new()));

        let req = test::TestRequest::post()
            .uri("/v1/ping?key=test")
            .set_json(json!({"message": "hello"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({"status": "ok", "key": "tester", "message": "hello"}));
    }

    #[actix_web::test]
    async fn test_ping_over_quota_is_forbidden() {
        let app = app!(Arc::new(InMemoryStatsClient::new()));

        let first = test::call_service(
            &app,
            test::TestRequest::post().uri("/v1/ping?key=tiny").to_request(),
        )
        .await;
        let second = test::call_service(
            &app,
            test::TestRequest::post().uri("/v1/ping?key=tiny").to_request(),
        )
        .await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(second).await;
        assert_eq!(body["error"]["errors"][0]["reason"], "dailyLimitExceeded");
    }

    #[actix_web::test]
    async fn test_ping_accepts_gzip_body() {
        let app = app!(Arc::new(InMemoryStatsClient::new()));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"message": "zipped"}"#).unwrap();
        let body = encoder.finish().unwrap();

        let req = test::TestRequest::post()
            .uri("/v1/ping?key=test")
            .insert_header(("Content-Encoding", "gzip"))
            .set_payload(body)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["message"], "zipped");
    }

    #[actix_web::test]
    async fn test_ping_with_bad_body_is_a_parse_error() {
        let app = app!(Arc::new(InMemoryStatsClient::new()));

        let req = test::TestRequest::post()
            .uri("/v1/ping?key=test")
            .set_payload("{\"message\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["errors"][0]["reason"], "parseError");
        assert!(!body["error"]["details"].as_array().unwrap().is_empty());
    }
}
