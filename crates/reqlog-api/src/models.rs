//! API request and response bodies

use chrono::{DateTime, Utc};
use reqlog_capture::{
    BulkDeleteReport, CleanupReport, CodeClasses, RequestRecord, Settings, MAX_ROW_BOUND,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Largest page size accepted by the listing
pub const MAX_PER_PAGE: u64 = 1000;

/// Stored request as returned in listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestSummary {
    /// Record ID
    pub id: i64,
    /// Pattern that matched the URL
    pub matched_pattern: String,
    /// Full request URL
    pub request_url: String,
    /// Response status code, absent on transport failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<i32>,
    /// Response reason phrase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    /// Capture time (UTC, whole seconds)
    pub captured_at: DateTime<Utc>,
}

impl From<RequestRecord> for RequestSummary {
    fn from(record: RequestRecord) -> Self {
        Self {
            id: record.id,
            matched_pattern: record.matched_pattern,
            request_url: record.request_url,
            response_code: record.response_code,
            response_message: record.response_message,
            captured_at: record.captured_at,
        }
    }
}

/// One page of stored requests
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestList {
    pub items: Vec<RequestSummary>,
    /// Matching records across all pages
    pub total: u64,
    /// Current page (1-based)
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Full stored request with decoded payloads
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestDetail {
    pub id: i64,
    pub matched_pattern: String,
    pub request_url: String,
    /// Decoded request arguments; `null` when the stored value is not JSON
    #[schema(value_type = Object)]
    pub request_args: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_message: Option<String>,
    /// Decoded response headers
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub response_headers: Option<serde_json::Value>,
    /// Response body, pretty-printed when it is JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl From<RequestRecord> for RequestDetail {
    fn from(record: RequestRecord) -> Self {
        let request_args = record
            .decode_request_args()
            .unwrap_or(serde_json::Value::Null);
        let response_headers = record
            .decode_response_headers()
            .and_then(|decoded| decoded.ok())
            .and_then(|headers| serde_json::to_value(headers).ok());
        let response_body = record.pretty_body();

        Self {
            id: record.id,
            matched_pattern: record.matched_pattern,
            request_url: record.request_url,
            request_args,
            response_code: record.response_code,
            response_message: record.response_message,
            response_headers,
            response_body,
            captured_at: record.captured_at,
        }
    }
}

/// Query parameters of the listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    /// Substring searched in pattern, URL, message and code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    /// Sort column (default: captured_at)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orderby: Option<String>,
    /// Sort direction, `asc` or `desc` (default: desc)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Page number, 1-based (default: 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Page size (default: 10, max: 1000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
}

/// Ids to delete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub deleted: Vec<i64>,
    pub not_found: Vec<i64>,
    pub failed: Vec<BulkDeleteFailureBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteFailureBody {
    pub id: i64,
    pub error: String,
}

impl From<BulkDeleteReport> for BulkDeleteResponse {
    fn from(report: BulkDeleteReport) -> Self {
        Self {
            deleted: report.deleted,
            not_found: report.not_found,
            failed: report
                .failed
                .into_iter()
                .map(|f| BulkDeleteFailureBody {
                    id: f.id,
                    error: f.error,
                })
                .collect(),
        }
    }
}

/// Result of a manual cleanup
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupResponse {
    NothingToDo,
    Pruned { cutoff_id: i64, deleted: u64 },
    Aborted { reason: String },
}

impl From<CleanupReport> for CleanupResponse {
    fn from(report: CleanupReport) -> Self {
        match report {
            CleanupReport::NothingToDo => CleanupResponse::NothingToDo,
            CleanupReport::Pruned { cutoff_id, deleted } => {
                CleanupResponse::Pruned { cutoff_id, deleted }
            }
            CleanupReport::Aborted { reason } => CleanupResponse::Aborted { reason },
        }
    }
}

/// Completed outbound request reported by a host
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionEventBody {
    pub url: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub request_args: serde_json::Value,
    /// `{code?, message?, headers?, body?}` or `{transport_error}`
    #[schema(value_type = Object)]
    pub response: serde_json::Value,
}

/// What the observer did with an event
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptureResponse {
    /// `no_match`, `filtered`, `captured` or `store_failed`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Per-class persistence switches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CodeClassesBody {
    #[serde(rename = "1xx")]
    pub informational: bool,
    #[serde(rename = "2xx")]
    pub success: bool,
    #[serde(rename = "3xx")]
    pub redirection: bool,
    #[serde(rename = "4xx")]
    pub client_error: bool,
    #[serde(rename = "5xx")]
    pub server_error: bool,
}

impl From<CodeClasses> for CodeClassesBody {
    fn from(classes: CodeClasses) -> Self {
        Self {
            informational: classes.informational,
            success: classes.success,
            redirection: classes.redirection,
            client_error: classes.client_error,
            server_error: classes.server_error,
        }
    }
}

impl From<CodeClassesBody> for CodeClasses {
    fn from(body: CodeClassesBody) -> Self {
        Self {
            informational: body.informational,
            success: body.success,
            redirection: body.redirection,
            client_error: body.client_error,
            server_error: body.server_error,
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsBody {
    pub max_records: u64,
    /// Comma separated extra patterns
    pub extra_patterns: String,
    pub disable_default_patterns: bool,
    pub code_classes: CodeClassesBody,
    pub cleanup_interval_secs: u64,
    /// Effective pattern list, extras first (read-only)
    #[serde(default, skip_deserializing)]
    pub effective_patterns: Vec<String>,
}

impl SettingsBody {
    pub fn from_settings(settings: Settings, effective_patterns: Vec<String>) -> Self {
        Self {
            max_records: settings.max_records,
            extra_patterns: settings.extra_patterns,
            disable_default_patterns: settings.disable_default_patterns,
            code_classes: settings.code_classes.into(),
            cleanup_interval_secs: settings.cleanup_interval_secs,
            effective_patterns,
        }
    }

    /// Settings to store; zero ceilings fall back to the defaults and
    /// `max_records` is capped to what the database can bind
    pub fn into_settings(self) -> Settings {
        let defaults = Settings::default();
        Settings {
            max_records: if self.max_records == 0 {
                defaults.max_records
            } else {
                self.max_records.min(MAX_ROW_BOUND)
            },
            extra_patterns: self.extra_patterns,
            disable_default_patterns: self.disable_default_patterns,
            code_classes: self.code_classes.into(),
            cleanup_interval_secs: if self.cleanup_interval_secs == 0 {
                defaults.cleanup_interval_secs
            } else {
                self.cleanup_interval_secs
            },
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Stored requests
    pub stored_requests: u64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
