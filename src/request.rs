//! Extractors and field helpers shared by the JSON endpoints.

use axum::{
    Form,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::Error;

/// Extracts a request body sent either as JSON or as an URL encoded form.
///
/// Bodies with the `application/x-www-form-urlencoded` content type are parsed
/// as forms, everything else is parsed as JSON regardless of the content type.
/// An empty body is treated as an empty JSON object.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| {
                content_type.starts_with("application/x-www-form-urlencoded")
            });

        if is_form {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|rejection| Error::Validation(rejection.body_text()))?;

            return Ok(Self(value));
        }

        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()))?;

        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_str("{}")
        } else {
            serde_json::from_slice(&bytes)
        }
        .map_err(|error| Error::Validation(format!("Invalid request body: {error}")))?;

        Ok(Self(value))
    }
}

/// A number that may arrive as a JSON number or as text, e.g. from a form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// A JSON number.
    Float(f64),
    /// Text such as `"12.50"` or `"1,200"`.
    Text(String),
}

impl Number {
    /// The numeric value, or `None` if the text is not a finite number.
    ///
    /// Thousands separators are ignored.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Number::Float(value) => *value,
            Number::Text(text) => text.trim().replace(',', "").parse().ok()?,
        };

        value.is_finite().then_some(value)
    }
}

/// A flag that may arrive as a JSON boolean, a number or text, e.g. from a checkbox.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    /// A JSON boolean.
    Bool(bool),
    /// Zero is false, everything else is true.
    Number(f64),
    /// "false", "0", "off", "no" and the empty string are false, everything else is true.
    Text(String),
}

impl Flag {
    /// Whether the flag is set.
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(value) => *value,
            Flag::Number(value) => *value != 0.0,
            Flag::Text(text) => !matches!(
                text.trim().to_lowercase().as_str(),
                "" | "false" | "0" | "off" | "no"
            ),
        }
    }
}

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: an absent
/// field is `None`, `null` is `Some(None)` and a value is `Some(Some(value))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim `text` and return `None` if nothing is left.
pub fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}
