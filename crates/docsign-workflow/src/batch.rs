//! Outcome of continue-on-error batch operations

use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::error::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: Uuid,
    pub code: u32,
    pub message: String,
}

/// Per-item results of a batch; one item never stops the others
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<Uuid>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn record_success(&mut self, id: Uuid) {
        self.succeeded.push(id);
    }

    /// Logs the failure with the item id and keeps going
    pub fn record_failure(&mut self, operation: &'static str, id: Uuid, err: &WorkflowError) {
        error!(
            operation,
            collection_id = %id,
            code = err.code(),
            error = %err,
            "Batch item failed, skipping"
        );
        self.failures.push(ItemFailure {
            id,
            code: err.code(),
            message: err.to_string(),
        });
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}
