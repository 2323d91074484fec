//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        request, response,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many bytes are truncated in the `info` log.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Fields whose values never appear in the logs.
const REDACTED_FIELDS: [&str; 8] = [
    "password",
    "confirm_password",
    "confirmPassword",
    "current_password",
    "new_password",
    "token",
    "access_token",
    "key",
];
const REDACTED_VALUE: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated and
/// the full body is logged at the `debug` level. Credentials are redacted from
/// the headers and from JSON and form bodies in both directions.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    log_body(
        "Received request",
        &request_summary(&parts),
        &redact_body(content_type(&parts.headers), &String::from_utf8_lossy(&body_bytes)),
    );

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            Bytes::new()
        }
    };
    log_body(
        "Sending response",
        &response_summary(&parts),
        &redact_body(content_type(&parts.headers), &String::from_utf8_lossy(&body_bytes)),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn request_summary(parts: &request::Parts) -> String {
    let uri = match parts.uri.query() {
        Some(query) => format!("{}?{}", parts.uri.path(), redact_form(query)),
        None => parts.uri.path().to_owned(),
    };

    format!(
        "{} {uri} {:?}\nheaders: {:#?}",
        parts.method,
        parts.version,
        redact_headers(&parts.headers)
    )
}

fn response_summary(parts: &response::Parts) -> String {
    format!(
        "{} {:?}\nheaders: {:#?}",
        parts.status,
        parts.version,
        redact_headers(&parts.headers)
    )
}

/// A copy of `headers` with credential-carrying values replaced.
fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut redacted = headers.clone();

    for name in [AUTHORIZATION, COOKIE, SET_COOKIE, HeaderName::from_static("x-api-key")] {
        // `insert` replaces every value, e.g. repeated `Set-Cookie` headers.
        if redacted.contains_key(&name) {
            redacted.insert(name, HeaderValue::from_static(REDACTED_VALUE));
        }
    }

    redacted
}

fn redact_body(content_type: &str, body_text: &str) -> String {
    if content_type.starts_with("application/x-www-form-urlencoded") {
        redact_form(body_text)
    } else {
        redact_json(body_text)
    }
}

fn redact_form(form_text: &str) -> String {
    form_text
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if REDACTED_FIELDS.contains(&key) => {
                format!("{key}={REDACTED_VALUE}")
            }
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn redact_json(body_text: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    if redact_value(&mut value) {
        value.to_string()
    } else {
        body_text.to_owned()
    }
}

/// Redact sensitive fields at any depth, returning whether anything changed.
fn redact_value(value: &mut Value) -> bool {
    match value {
        Value::Object(object) => {
            let mut redacted_any = false;

            for (key, field) in object.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED_VALUE.to_owned());
                    redacted_any = true;
                } else {
                    redacted_any |= redact_value(field);
                }
            }

            redacted_any
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |redacted_any, item| redact_value(item) || redacted_any),
        _ => false,
    }
}

fn log_body(message: &str, summary: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        let cut = (0..=LOG_BODY_LENGTH_LIMIT)
            .rev()
            .find(|index| body.is_char_boundary(*index))
            .unwrap_or(0);

        tracing::info!("{message}: {summary}\nbody: {}...", &body[..cut]);
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{message}: {summary}\nbody: {body:?}");
    }
}
