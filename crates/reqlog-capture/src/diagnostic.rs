//! Diagnostic trace of matched requests
//!
//! Every matched request produces a verbose trace under
//! [`DIAGNOSTIC_TARGET`], whether or not it ends up in the database. The
//! binary routes this target to a separate text file when configured.

use serde::Serialize;
use tracing::debug;

use crate::record::{pretty_json_or_raw, ResponseOutcome};

/// Tracing target of the diagnostic log
pub const DIAGNOSTIC_TARGET: &str = "reqlog::diagnostic";

/// Emit the full trace of one matched request
pub fn trace_matched_request<A>(pattern: &str, url: &str, request_args: &A, response: &ResponseOutcome)
where
    A: Serialize + ?Sized,
{
    debug!(target: DIAGNOSTIC_TARGET, "[Start] Request To: {}", url);
    debug!(
        target: DIAGNOSTIC_TARGET,
        "--------8<--------[ Request Args ]--------8<--------\n{}",
        serde_json::to_string_pretty(request_args).unwrap_or_default()
    );

    let code = response
        .code()
        .map(|c| c.to_string())
        .unwrap_or_default();
    debug!(target: DIAGNOSTIC_TARGET, "{} - Code: {}", pattern, code);
    debug!(
        target: DIAGNOSTIC_TARGET,
        "{} - Message: {}",
        pattern,
        response.message().unwrap_or_default()
    );

    if let ResponseOutcome::TransportFailure { transport_error } = response {
        debug!(
            target: DIAGNOSTIC_TARGET,
            "{} - Transport error: {}", pattern, transport_error
        );
    }

    let headers = response
        .headers()
        .and_then(|h| serde_json::to_string_pretty(h).ok())
        .unwrap_or_default();
    debug!(
        target: DIAGNOSTIC_TARGET,
        "--------8<--------[ Response Headers ]--------8<--------\n{} - Headers: {}",
        pattern,
        headers
    );

    let body = response.body().map(pretty_json_or_raw).unwrap_or_default();
    debug!(
        target: DIAGNOSTIC_TARGET,
        "--------8<--------[ Response Body ]--------8<--------\n{} - Body: {}",
        pattern,
        body
    );
    debug!(target: DIAGNOSTIC_TARGET, "[End] Request To: {}", url);
}
