use actix_web::{error, http::header, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::{Map, Value};
use std::future::Future;

use crate::error::GateRejection;
use crate::gate::preprocess::preprocess;
use crate::gate::schema::Shape;
use crate::gate::{ApiViewConfig, GateRequest, Gatekeeper};
use crate::models::CallerIdentity;
use crate::utils::extract_client_addr;

/// Upper bound for a request body as sent, before decompression.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

impl GateRequest {
    pub fn from_http(req: &HttpRequest, body: Bytes) -> Self {
        let api_key = url::form_urlencoded::parse(req.query_string().as_bytes())
            .filter(|(name, _)| name == "key")
            .last()
            .map(|(_, value)| value.into_owned());

        let content_encoding = req
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            api_key,
            client_addr: extract_client_addr(req),
            content_encoding,
            body,
        }
    }
}

/// Reads the body exactly as sent. The `Bytes` extractor would already have
/// inflated gzip bodies, so the raw payload stream is drained instead.
pub async fn read_raw_body(mut payload: web::Payload) -> Result<Bytes, actix_web::Error> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(error::ErrorPayloadTooLarge("Request body too large"));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// A gated route: how to check the caller and what the body must look like.
#[derive(Clone, Debug)]
pub struct ApiEndpoint {
    pub view: ApiViewConfig,
    pub shape: Shape,
}

impl ApiEndpoint {
    pub fn new(view: ApiViewConfig, shape: Shape) -> Self {
        Self { view, shape }
    }
}

/// Runs the gate, then the body pipeline, then `handler`.
pub async fn run_gated<F, Fut>(
    gate: &Gatekeeper,
    endpoint: &ApiEndpoint,
    request: GateRequest,
    handler: F,
) -> Result<HttpResponse, GateRejection>
where
    F: FnOnce(CallerIdentity, Map<String, Value>) -> Fut,
    Fut: Future<Output = HttpResponse>,
{
    let identity = gate.check(&endpoint.view, &request).await?;
    let (data, _) = preprocess(
        &request.body,
        request.content_encoding.as_deref(),
        &endpoint.shape,
    )?;
    Ok(handler(identity, data).await)
}
