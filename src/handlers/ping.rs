use actix_web::{web, HttpRequest, HttpResponse};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::gate::{
    read_raw_body, run_gated, ApiEndpoint, ApiViewConfig, Field, FieldKind, GateRequest, Shape,
};
use crate::models::{AppState, CallerIdentity};

static PING_ENDPOINT: Lazy<ApiEndpoint> = Lazy::new(|| {
    ApiEndpoint::new(
        ApiViewConfig::new("ping", "v1.ping"),
        Shape::new().field(
            Field::new("message", FieldKind::String)
                .max_length(256)
                .optional(),
        ),
    )
});

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    status: &'static str,
    /// Name of the resolved key, absent for anonymous callers.
    key: Option<String>,
    message: Option<String>,
}

/// POST /v1/ping
pub async fn ping(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let body = read_raw_body(payload).await?;
    let request = GateRequest::from_http(&req, body);

    let response = run_gated(&state.gatekeeper, &PING_ENDPOINT, request, |identity, data| async move {
        let key = match identity {
            CallerIdentity::Resolved(api_key) => Some(api_key.name),
            CallerIdentity::Anonymous(_) => None,
        };
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        HttpResponse::Ok().json(PingResponse {
            status: "ok",
            key,
            message,
        })
    })
    .await?;

    Ok(response)
}
