//! Static registry of dataset steps

use super::step::{DatasetSyncStep, SyncStep};
use crate::adapters::{
    DtPoolAdapter, IndexQuoteAdapter, SectorAdapter, ZbPoolAdapter, ZtPoolAdapter,
};
use crate::dataset::Dataset;
use crate::db::sqlite::models::BoardType;
use crate::provider::MarketDataProvider;
use std::sync::Arc;

/// One step per dataset, in [`Dataset::ALL`] order
pub struct StepRegistry {
    steps: Vec<Arc<dyn SyncStep>>,
}

impl StepRegistry {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        let steps: Vec<Arc<dyn SyncStep>> = vec![
            Arc::new(DatasetSyncStep::new(SectorAdapter::new(
                provider.clone(),
                BoardType::Industry,
            ))),
            Arc::new(DatasetSyncStep::new(SectorAdapter::new(
                provider.clone(),
                BoardType::Concept,
            ))),
            Arc::new(DatasetSyncStep::new(ZtPoolAdapter::new(provider.clone()))),
            Arc::new(DatasetSyncStep::new(DtPoolAdapter::new(provider.clone()))),
            Arc::new(DatasetSyncStep::new(ZbPoolAdapter::new(provider.clone()))),
            Arc::new(DatasetSyncStep::new(IndexQuoteAdapter::new(provider))),
        ];

        Self { steps }
    }

    /// Steps for the requested datasets, deduplicated, in registry order
    pub fn steps_for(&self, datasets: &[Dataset]) -> Vec<Arc<dyn SyncStep>> {
        self.steps
            .iter()
            .filter(|step| datasets.contains(&step.dataset()))
            .cloned()
            .collect()
    }

    pub fn datasets(&self) -> Vec<Dataset> {
        self.steps.iter().map(|step| step.dataset()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[test]
    fn test_registry_covers_every_dataset() {
        let registry = StepRegistry::new(Arc::new(MockProvider::new()));
        assert_eq!(registry.datasets(), Dataset::ALL.to_vec());
    }

    #[test]
    fn test_steps_for_subset() {
        let registry = StepRegistry::new(Arc::new(MockProvider::new()));
        let steps = registry.steps_for(&[Dataset::IndexQuote, Dataset::ZtPool, Dataset::ZtPool]);
        let datasets: Vec<Dataset> = steps.iter().map(|s| s.dataset()).collect();
        assert_eq!(datasets, vec![Dataset::ZtPool, Dataset::IndexQuote]);
    }
}
