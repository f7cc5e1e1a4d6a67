//! Wiring of the transaction registry, bulk import service and job runner
//! around one set of collaborators.

use std::fmt;
use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::import::BulkImportService;
use crate::jobs::JobRunner;
use crate::transactions::ResourceTransactions;

/// Entry point for callers that want the whole pipeline.
#[derive(Clone)]
pub struct Reliquary {
    collaborators: Collaborators,
    config: PipelineConfig,
    transactions: Arc<ResourceTransactions>,
    imports: Arc<BulkImportService>,
    runner: Arc<JobRunner>,
}

impl fmt::Debug for Reliquary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reliquary")
            .field("collaborators", &self.collaborators)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reliquary {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        let transactions = Arc::new(ResourceTransactions::new(&collaborators, &config));
        let imports = Arc::new(BulkImportService::new(
            Arc::clone(&transactions),
            &collaborators,
        ));
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&transactions),
            Arc::clone(&imports),
            config.retry.clone(),
        ));
        Self {
            collaborators,
            config,
            transactions,
            imports,
            runner,
        }
    }

    pub fn transactions(&self) -> &ResourceTransactions {
        &self.transactions
    }

    pub fn imports(&self) -> &BulkImportService {
        &self.imports
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
