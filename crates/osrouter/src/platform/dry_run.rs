//! Applier that logs mutations without touching the OS.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::applier::{ApplyResult, PlatformApplier};
use crate::config::Mutation;

/// Registry identifier of [`DryRunApplier`].
pub const PLATFORM_ID: &str = "dry-run";

/// Records every mutation and reports success.
#[derive(Debug, Default)]
pub struct DryRunApplier {
    log: Mutex<Vec<Mutation>>,
}

impl DryRunApplier {
    /// Create an applier with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutations seen so far, in order.
    pub fn applied(&self) -> Vec<Mutation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PlatformApplier for DryRunApplier {
    fn name(&self) -> &str {
        PLATFORM_ID
    }

    async fn apply(&self, mutation: &Mutation) -> ApplyResult {
        tracing::info!(%mutation, "would apply");
        if let Ok(mut log) = self.log.lock() {
            log.push(mutation.clone());
        }
        Ok(())
    }
}
