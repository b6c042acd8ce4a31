//! Extension points for embedding applications
//!
//! Hooks let the host adjust the effective pattern list and the retention
//! ceiling without touching the stored settings. Both default to returning
//! their input unchanged.

use std::sync::Arc;

/// Policy hooks consulted on every capture and cleanup
///
/// # Example
/// ```ignore
/// struct OnlyPayments;
///
/// impl CaptureHooks for OnlyPayments {
///     fn request_patterns(&self, patterns: Vec<String>) -> Vec<String> {
///         patterns.into_iter().filter(|p| p.contains("paypal")).collect()
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait CaptureHooks: Send + Sync {
    /// Adjust the effective pattern list (extras followed by defaults)
    fn request_patterns(&self, patterns: Vec<String>) -> Vec<String> {
        patterns
    }

    /// Override the number of records kept by cleanup
    fn max_records(&self, configured: u64) -> u64 {
        configured
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl CaptureHooks for DefaultHooks {}

/// Shared hooks handle
pub type SharedHooks = Arc<dyn CaptureHooks>;

pub fn default_hooks() -> SharedHooks {
    Arc::new(DefaultHooks)
}
