use crate::{Batch, BatchId, BatchStatus, Tier};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryView {
    pub batch_count: usize,
    pub running_count: usize,
    pub jobs: Vec<BatchRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRowView {
    pub batch_id: BatchId,
    pub name: String,
    pub status: BatchStatus,
    pub active_mode: Option<Tier>,
    pub resolved_references: usize,
    pub standard_results: usize,
    pub pro_results: usize,
    pub last_error: Option<String>,
}

impl BatchRowView {
    pub(crate) fn from_batch(batch: &Batch) -> Self {
        Self {
            batch_id: batch.id(),
            name: batch.name().to_string(),
            status: batch.status(),
            active_mode: batch.active_mode(),
            resolved_references: batch
                .references()
                .iter()
                .flatten()
                .filter(|reference| reference.is_resolved())
                .count(),
            standard_results: batch.results(Tier::Standard).len(),
            pro_results: batch.results(Tier::Enhanced).len(),
            last_error: batch.last_error().map(str::to_string),
        }
    }
}
