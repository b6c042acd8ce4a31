//! Captured request records and the completion events they are built from

use chrono::{DateTime, SubsecRound, Utc};
use reqlog_db::entities::request;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::diagnostic::DIAGNOSTIC_TARGET;

/// A header carries either a single value or several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        HeaderValues::One(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        HeaderValues::Many(values)
    }
}

/// Response headers keyed by name
pub type ResponseHeaders = BTreeMap<String, HeaderValues>;

/// Response received by the host for an outbound request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub headers: Option<ResponseHeaders>,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpResponse {
    pub fn new(code: u16) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValues>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Outcome of an outbound request as seen by the host
///
/// A transport failure (DNS, TLS, timeout...) has no code, message, headers
/// or body. It is still a valid input and never an error for the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseOutcome {
    TransportFailure { transport_error: String },
    Received(HttpResponse),
}

impl ResponseOutcome {
    pub fn code(&self) -> Option<u16> {
        match self {
            ResponseOutcome::Received(response) => response.code,
            ResponseOutcome::TransportFailure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ResponseOutcome::Received(response) => response.message.as_deref(),
            ResponseOutcome::TransportFailure { .. } => None,
        }
    }

    pub fn headers(&self) -> Option<&ResponseHeaders> {
        match self {
            ResponseOutcome::Received(response) => response.headers.as_ref(),
            ResponseOutcome::TransportFailure { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            ResponseOutcome::Received(response) => response.body.as_deref(),
            ResponseOutcome::TransportFailure { .. } => None,
        }
    }
}

impl From<HttpResponse> for ResponseOutcome {
    fn from(response: HttpResponse) -> Self {
        ResponseOutcome::Received(response)
    }
}

/// One completed outbound request, as delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub url: String,
    #[serde(default)]
    pub request_args: serde_json::Value,
    pub response: ResponseOutcome,
}

/// Record ready to be appended; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub matched_pattern: String,
    pub request_url: String,
    pub request_args: String,
    pub response_code: Option<i32>,
    pub response_message: Option<String>,
    pub response_headers: Option<String>,
    pub response_body: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl NewRecord {
    /// Build a record stamped with the current time
    ///
    /// Arguments and headers are JSON encoded. A value that cannot be
    /// encoded is replaced by an empty string so the capture still goes
    /// through.
    pub fn capture<A>(pattern: &str, url: &str, request_args: &A, response: &ResponseOutcome) -> Self
    where
        A: Serialize + ?Sized,
    {
        Self {
            matched_pattern: pattern.to_string(),
            request_url: url.to_string(),
            request_args: encode_blob(request_args, "request_args"),
            response_code: response.code().map(i32::from),
            response_message: response.message().map(str::to_string),
            response_headers: response
                .headers()
                .map(|headers| encode_blob(headers, "response_headers")),
            response_body: response.body().map(str::to_string),
            captured_at: capture_time(),
        }
    }
}

/// A stored capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: i64,
    pub matched_pattern: String,
    pub request_url: String,
    pub request_args: String,
    pub response_code: Option<i32>,
    pub response_message: Option<String>,
    pub response_headers: Option<String>,
    pub response_body: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl RequestRecord {
    /// Decode the stored request arguments
    pub fn decode_request_args(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.request_args)
    }

    /// Decode the stored response headers, `None` when none were recorded
    pub fn decode_response_headers(&self) -> Option<Result<ResponseHeaders, serde_json::Error>> {
        self.response_headers
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(serde_json::from_str)
    }

    /// Response body pretty-printed when it is JSON, raw text otherwise
    pub fn pretty_body(&self) -> Option<String> {
        self.response_body.as_deref().map(pretty_json_or_raw)
    }
}

impl From<request::Model> for RequestRecord {
    fn from(model: request::Model) -> Self {
        Self {
            id: model.id,
            matched_pattern: model.matched_pattern,
            request_url: model.request_url,
            request_args: model.request_args,
            response_code: model.response_code,
            response_message: model.response_message,
            response_headers: model.response_headers,
            response_body: model.response_body,
            captured_at: model.captured_at,
        }
    }
}

/// Current UTC time truncated to whole seconds
pub fn capture_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// JSON-encode a value for an opaque text column
pub fn encode_blob<T>(value: &T, field: &str) -> String
where
    T: Serialize + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(target: DIAGNOSTIC_TARGET, field = field, error = %e, "Failed to serialize field, storing placeholder");
            String::new()
        }
    }
}

/// Pretty-print `raw` when it parses as JSON
pub fn pretty_json_or_raw(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| raw.to_string())
}
