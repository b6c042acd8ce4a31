//! Periodic retention cleanup

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SettingsHandle;
use crate::hooks::{default_hooks, SharedHooks};
use crate::store::{CleanupReport, RequestStore};

/// Trims the store to the configured ceiling on a fixed cadence
#[derive(Clone)]
pub struct RetentionTask {
    store: RequestStore,
    settings: SettingsHandle,
    hooks: SharedHooks,
}

impl RetentionTask {
    pub fn new(store: RequestStore, settings: SettingsHandle) -> Self {
        Self::with_hooks(store, settings, default_hooks())
    }

    pub fn with_hooks(store: RequestStore, settings: SettingsHandle, hooks: SharedHooks) -> Self {
        Self {
            store,
            settings,
            hooks,
        }
    }

    /// Ceiling after hooks are applied
    pub async fn effective_max_records(&self) -> u64 {
        let configured = self.settings.snapshot().await.max_records;
        self.hooks.max_records(configured)
    }

    /// Run one cleanup with the current settings
    pub async fn run_once(&self) -> CleanupReport {
        let max_records = self.effective_max_records().await;
        debug!(max_records = max_records, "Running records cleanup");
        self.store.cleanup(max_records).await
    }

    /// Clean up now, then again after every interval
    ///
    /// The interval is re-read after each run.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.run_once().await;

                let interval = self.settings.snapshot().await.cleanup_interval();
                info!("Next records cleanup in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
        })
    }
}
