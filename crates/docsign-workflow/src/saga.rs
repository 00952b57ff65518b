//! Compensating actions for multi-step creation
//!
//! Creating a collection touches the store, the PDF engine and the quota
//! counters with no shared transaction. Each completed step records how to
//! undo it; on failure the recorded steps run in reverse order.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PortResult;
use crate::ports::Collaborators;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    RemoveCollection(Uuid),
    DeleteDocument(Uuid),
    ReleaseDocumentQuota { group_id: Uuid, count: u32 },
    ReleaseVisualIdentification { group_id: Uuid, count: u32 },
}

impl Compensation {
    async fn run(&self, ports: &Collaborators) -> PortResult<()> {
        match *self {
            Self::RemoveCollection(id) => ports.store.remove_collection(id).await,
            Self::DeleteDocument(id) => ports.pdf.delete(id).await,
            Self::ReleaseDocumentQuota { group_id, count } => {
                ports.quota.release_document(group_id, count).await
            }
            Self::ReleaseVisualIdentification { group_id, count } => {
                ports.quota.release_visual_identification(group_id, count).await
            }
        }
    }
}

#[derive(Debug)]
pub struct Saga {
    collection_id: Uuid,
    steps: Vec<Compensation>,
}

impl Saga {
    pub fn new(collection_id: Uuid) -> Self {
        Self {
            collection_id,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub fn recorded(&self) -> &[Compensation] {
        &self.steps
    }

    /// Everything succeeded, forget the compensations
    pub fn commit(self) {}

    /// Undo recorded steps newest first; returns how many could not be undone
    pub async fn compensate(self, ports: &Collaborators) -> usize {
        let mut failed = 0;
        for step in self.steps.iter().rev() {
            if let Err(e) = step.run(ports).await {
                failed += 1;
                warn!(
                    collection_id = %self.collection_id,
                    step = ?step,
                    error = %e,
                    "Compensation step failed"
                );
            }
        }
        info!(
            collection_id = %self.collection_id,
            steps = self.steps.len(),
            failed,
            "Create rolled back"
        );
        failed
    }
}
