use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::gate::preprocess::BodyError;

/// The only outcomes of the gate that a caller ever sees.
#[derive(Debug, Error)]
pub enum GateRejection {
    /// The key was missing or did not resolve, on an endpoint that demands one.
    #[error("Invalid API key")]
    InvalidCredential,

    /// The key's daily request quota is used up.
    #[error("You have exceeded your daily limit.")]
    QuotaExceeded,

    /// The request body had content but could not be decoded or validated.
    #[error("Parse Error")]
    ParseError(Vec<BodyError>),
}

#[derive(Serialize)]
struct ErrorDetail {
    domain: &'static str,
    reason: &'static str,
    message: &'static str,
}

impl GateRejection {
    fn detail(&self) -> ErrorDetail {
        match self {
            GateRejection::InvalidCredential => ErrorDetail {
                domain: "usageLimits",
                reason: "keyInvalid",
                message: "Missing or invalid API key.",
            },
            GateRejection::QuotaExceeded => ErrorDetail {
                domain: "usageLimits",
                reason: "dailyLimitExceeded",
                message: "You have exceeded your daily limit.",
            },
            GateRejection::ParseError(_) => ErrorDetail {
                domain: "global",
                reason: "parseError",
                message: "Parse Error.",
            },
        }
    }

    /// Errors accumulated by the body pipeline, empty for the key rejections.
    pub fn body_errors(&self) -> &[BodyError] {
        match self {
            GateRejection::ParseError(errors) => errors,
            _ => &[],
        }
    }
}

impl ResponseError for GateRejection {
    fn status_code(&self) -> StatusCode {
        match self {
            GateRejection::InvalidCredential => StatusCode::BAD_REQUEST,
            GateRejection::QuotaExceeded => StatusCode::FORBIDDEN,
            GateRejection::ParseError(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let detail = self.detail();
        let mut error = json!({
            "errors": [detail],
            "code": status.as_u16(),
            "message": detail.message,
        });
        if let GateRejection::ParseError(errors) = self {
            error["details"] = json!(errors);
        }

        HttpResponse::build(status).json(json!({ "error": error }))
    }
}
