use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Read};

use crate::error::GateRejection;
use crate::gate::schema::Shape;

/// One failure from the body pipeline. `name` is unset for failures that are
/// not tied to a single field (decompression, JSON syntax, schema summary).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BodyError {
    pub name: Option<String>,
    pub description: Value,
}

impl BodyError {
    pub fn general(description: impl Into<String>) -> Self {
        Self {
            name: None,
            description: Value::String(description.into()),
        }
    }
}

pub fn is_gzip(content_encoding: Option<&str>) -> bool {
    content_encoding.is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
}

/// Upper bound for a body after decompression.
pub const MAX_DECODED_BYTES: usize = 8 * 1024 * 1024;

/// Inflates `data`, failing as soon as the output would exceed `limit` bytes.
pub fn decode_gzip(data: &[u8], limit: usize) -> io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut decoded)?;
    if decoded.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed body exceeds {} bytes", limit),
        ));
    }
    Ok(decoded)
}

/// Turns a raw body into data validated against `shape`.
///
/// Decompression, JSON parsing and validation each add to one error list
/// and the pipeline keeps going with an empty object. A non-empty body with
/// any recorded error is a `ParseError`. An empty body always yields
/// `({}, [])`.
pub fn preprocess(
    raw: &[u8],
    content_encoding: Option<&str>,
    shape: &Shape,
) -> Result<(Map<String, Value>, Vec<BodyError>), GateRejection> {
    if raw.is_empty() {
        return Ok((Map::new(), Vec::new()));
    }

    let mut errors = Vec::new();

    let content = if is_gzip(content_encoding) {
        match decode_gzip(raw, MAX_DECODED_BYTES) {
            Ok(decoded) => decoded,
            Err(e) => {
                errors.push(BodyError::general(format!("gzip decode failed: {}", e)));
                Vec::new()
            }
        }
    } else {
        raw.to_vec()
    };

    let data = match serde_json::from_slice::<Value>(&content) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            errors.push(BodyError::general(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )));
            Map::new()
        }
        Err(e) => {
            errors.push(BodyError::general(e.to_string()));
            Map::new()
        }
    };

    let validated = match shape.validate(&data) {
        Ok(validated) => validated,
        Err(invalid) => {
            errors.push(BodyError {
                name: None,
                description: invalid.description(),
            });
            invalid.partial
        }
    };

    if !errors.is_empty() {
        log::debug!("Rejecting request body with {} error(s)", errors.len());
        return Err(GateRejection::ParseError(errors));
    }

    Ok((validated, errors))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
