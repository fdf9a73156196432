use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::models::AppState;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Liveness probe. Not gated and touches no backend.
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let response = HealthResponse {
        status: "ok".to_string(),
        service: state.settings.app.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    HttpResponse::Ok().json(response)
}
