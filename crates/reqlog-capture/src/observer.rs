//! Request completion observer
//!
//! The host calls [`Observer::on_response`] once per completed outbound
//! request. Nothing here ever fails the host: storage problems are logged
//! and reported in the returned [`CaptureOutcome`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Settings, SettingsHandle};
use crate::diagnostic::{trace_matched_request, DIAGNOSTIC_TARGET};
use crate::hooks::{default_hooks, SharedHooks};
use crate::patterns::PatternSet;
use crate::record::{CompletionEvent, NewRecord, ResponseOutcome};
use crate::store::RequestStore;

/// What happened to one completion event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// No pattern matched the URL
    NoMatch,
    /// Matched, but the response code class is not persisted
    Filtered {
        pattern: String,
        code: Option<u16>,
    },
    /// Matched and stored
    Captured { pattern: String, id: i64 },
    /// Matched, but the store rejected the record
    StoreFailed { pattern: String, error: String },
}

impl CaptureOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureOutcome::Captured { .. })
    }
}

/// Decides which completed requests are kept and stores them
#[derive(Clone)]
pub struct Observer {
    settings: SettingsHandle,
    store: RequestStore,
    hooks: SharedHooks,
}

impl Observer {
    pub fn new(settings: SettingsHandle, store: RequestStore) -> Self {
        Self::with_hooks(settings, store, default_hooks())
    }

    pub fn with_hooks(settings: SettingsHandle, store: RequestStore, hooks: SharedHooks) -> Self {
        Self {
            settings,
            store,
            hooks,
        }
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Current effective pattern list, after hooks
    pub async fn effective_patterns(&self) -> PatternSet {
        let settings = self.settings.snapshot().await;
        self.patterns_for(&settings)
    }

    fn patterns_for(&self, settings: &Settings) -> PatternSet {
        PatternSet::new(
            self.hooks
                .request_patterns(settings.pattern_set().into_patterns()),
        )
    }

    /// Handle one completed outbound request
    ///
    /// Settings are read fresh on every call, so changes apply to the next
    /// request without a restart.
    pub async fn on_response<A>(&self, url: &str, request_args: &A, response: &ResponseOutcome) -> CaptureOutcome
    where
        A: Serialize + ?Sized,
    {
        let settings = self.settings.snapshot().await;
        let patterns = self.patterns_for(&settings);

        let Some(pattern) = patterns.matches(url) else {
            return CaptureOutcome::NoMatch;
        };
        let pattern = pattern.to_string();

        trace_matched_request(&pattern, url, request_args, response);

        let code = response.code();
        let code_text = code.map(|c| c.to_string()).unwrap_or_default();
        if !settings.code_filter().should_persist(&code_text) {
            debug!(pattern = %pattern, code = ?code, "Response code class not persisted");
            return CaptureOutcome::Filtered { pattern, code };
        }

        let record = NewRecord::capture(&pattern, url, request_args, response);
        match self.store.append(record).await {
            Ok(id) => {
                debug!(id = id, pattern = %pattern, url = %url, "Request captured");
                CaptureOutcome::Captured { pattern, id }
            }
            Err(e) => {
                warn!(target: DIAGNOSTIC_TARGET, pattern = %pattern, url = %url, error = %e, "Failed to store request");
                CaptureOutcome::StoreFailed {
                    pattern,
                    error: e.to_string(),
                }
            }
        }
    }

    pub async fn on_completion(&self, event: &CompletionEvent) -> CaptureOutcome {
        self.on_response(&event.url, &event.request_args, &event.response)
            .await
    }
}
