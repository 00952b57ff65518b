//! Wiring for the three controllers

use std::sync::Arc;

use crate::cache::{InMemoryNegativeCache, NegativeResultCache};
use crate::config::EngineConfig;
use crate::distribution::DistributionOrchestrator;
use crate::ports::Collaborators;
use crate::self_sign::SelfSignController;
use crate::workflow::DocumentWorkflow;

/// One collaborator bundle and one config shared by every controller
pub struct WorkflowEngine {
    pub workflow: Arc<DocumentWorkflow>,
    pub distribution: DistributionOrchestrator,
    pub self_sign: SelfSignController,
}

impl WorkflowEngine {
    /// Engine with a process-local negative-result cache
    pub fn new(ports: Collaborators, config: EngineConfig) -> Self {
        let cache = Arc::new(InMemoryNegativeCache::new(config.negative_cache_ttl));
        Self::with_negative_cache(ports, config, cache)
    }

    pub fn with_negative_cache(
        ports: Collaborators,
        config: EngineConfig,
        cache: Arc<dyn NegativeResultCache>,
    ) -> Self {
        let histogram_ttl = config.distribution_cache_ttl;
        let workflow = Arc::new(DocumentWorkflow::new(
            Arc::new(ports),
            Arc::new(config),
            cache,
        ));
        Self {
            distribution: DistributionOrchestrator::new(workflow.clone(), histogram_ttl),
            self_sign: SelfSignController::new(workflow.clone()),
            workflow,
        }
    }
}
