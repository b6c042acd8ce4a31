//! Outbound HTTP request capture
//!
//! Watches completed outbound requests, keeps the ones whose URL matches a
//! monitored pattern and whose response class is enabled, and bounds the
//! stored history with a periodic cleanup.
//!
//! ```ignore
//! let store = RequestStore::open("sqlite::memory:").await?;
//! let observer = Observer::new(SettingsHandle::default(), store.clone());
//!
//! observer
//!     .on_response(url, &request_args, &HttpResponse::new(200).into())
//!     .await;
//! ```

pub mod code_filter;
pub mod config;
pub mod diagnostic;
pub mod hooks;
pub mod observer;
pub mod patterns;
pub mod record;
pub mod retention;
pub mod store;

pub use code_filter::{CodeClasses, CodeFilter};
pub use config::{ConfigError, LoggerConfig, Settings, SettingsHandle};
pub use diagnostic::DIAGNOSTIC_TARGET;
pub use hooks::{CaptureHooks, DefaultHooks, SharedHooks};
pub use observer::{CaptureOutcome, Observer};
pub use patterns::{parse_extra_patterns, PatternSet, DEFAULT_PATTERNS};
pub use record::{
    CompletionEvent, HeaderValues, HttpResponse, NewRecord, RequestRecord, ResponseHeaders,
    ResponseOutcome,
};
pub use retention::RetentionTask;
pub use store::{
    BulkDeleteReport, CleanupReport, RecordQuery, RequestStore, SortColumn, SortOrder, StoreError,
    DEFAULT_PAGE_SIZE, MAX_ROW_BOUND,
};
