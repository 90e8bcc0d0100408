use studio_logging::{studio_debug, studio_info};

use crate::batch::{Batch, BatchId, BatchStatus, EncodedAsset, Tier, TierResults};
use crate::tabular::JobRow;
use crate::view_model::{BatchRowView, RegistryView};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no batch with id {0}")]
    UnknownBatch(BatchId),
    #[error("batch {0} already has a run in progress")]
    BatchBusy(BatchId),
    #[error("batch {batch_id} has no {tier} run in progress")]
    NotRunning { batch_id: BatchId, tier: Tier },
    #[error("batch {batch_id} has no {tier} result at index {index} (len {len})")]
    SlotOutOfRange {
        batch_id: BatchId,
        tier: Tier,
        index: usize,
        len: usize,
    },
}

/// Ordered collection of batches and the owner of their lifecycle.
///
/// Iteration order is ingestion order; run-all follows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobRegistry {
    batches: Vec<Batch>,
    next_id: BatchId,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one idle batch per row, returning the new ids in row order.
    pub fn ingest(&mut self, rows: Vec<JobRow>) -> Vec<BatchId> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            self.next_id += 1;
            let id = self.next_id;
            self.batches.push(Batch {
                id,
                name: row.name,
                custom_prompt: row.custom_prompt,
                references: row.references,
                status: BatchStatus::Idle,
                active_mode: None,
                results: TierResults::default(),
                last_error: None,
            });
            ids.push(id);
        }
        studio_info!(
            "Registry ingested {} batches (total {})",
            ids.len(),
            self.batches.len()
        );
        ids
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn ids(&self) -> Vec<BatchId> {
        self.batches.iter().map(Batch::id).collect()
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn get(&self, id: BatchId) -> Option<&Batch> {
        self.batches.iter().find(|batch| batch.id == id)
    }

    /// Case-insensitive substring search on batch names.
    pub fn find_by_name(&self, query: &str) -> Vec<&Batch> {
        let needle = query.trim().to_lowercase();
        self.batches
            .iter()
            .filter(|batch| needle.is_empty() || batch.name.to_lowercase().contains(&needle))
            .collect()
    }

    fn get_mut(&mut self, id: BatchId) -> Result<&mut Batch, RegistryError> {
        self.batches
            .iter_mut()
            .find(|batch| batch.id == id)
            .ok_or(RegistryError::UnknownBatch(id))
    }

    /// Claim a batch for a run on `tier`.
    pub fn begin_run(&mut self, id: BatchId, tier: Tier) -> Result<(), RegistryError> {
        let batch = self.get_mut(id)?;
        if batch.status.is_running() {
            return Err(RegistryError::BatchBusy(id));
        }
        batch.status = BatchStatus::Processing;
        batch.active_mode = Some(tier);
        batch.last_error = None;
        studio_debug!("Batch {} -> processing ({})", id, tier);
        Ok(())
    }

    /// Ask a processing batch to stop after its in-flight call.
    ///
    /// Returns `false` when the batch is not processing; the request is then a no-op.
    pub fn request_stop(&mut self, id: BatchId) -> Result<bool, RegistryError> {
        let batch = self.get_mut(id)?;
        if batch.status != BatchStatus::Processing {
            return Ok(false);
        }
        batch.status = BatchStatus::Stopping;
        studio_debug!("Batch {} -> stopping", id);
        Ok(true)
    }

    pub fn is_stop_requested(&self, id: BatchId) -> bool {
        self.get(id)
            .is_some_and(|batch| batch.status == BatchStatus::Stopping)
    }

    /// Finish a run that completed or was stopped: `results` replace the tier's sequence.
    pub fn commit_run(
        &mut self,
        id: BatchId,
        tier: Tier,
        results: Vec<EncodedAsset>,
    ) -> Result<(), RegistryError> {
        let batch = self.running_batch(id, tier)?;
        let count = results.len();
        batch.results.replace(tier, results);
        batch.status = BatchStatus::Completed;
        batch.active_mode = None;
        studio_debug!("Batch {} -> completed with {} {} results", id, count, tier);
        Ok(())
    }

    /// Finish a run that failed; the tier's previous results are kept.
    pub fn fail_run(
        &mut self,
        id: BatchId,
        tier: Tier,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let batch = self.running_batch(id, tier)?;
        let message = message.into();
        studio_debug!("Batch {} -> error: {}", id, message);
        batch.status = BatchStatus::Error;
        batch.active_mode = None;
        batch.last_error = Some(message);
        Ok(())
    }

    fn running_batch(&mut self, id: BatchId, tier: Tier) -> Result<&mut Batch, RegistryError> {
        let batch = self.get_mut(id)?;
        if !batch.status.is_running() || batch.active_mode != Some(tier) {
            return Err(RegistryError::NotRunning { batch_id: id, tier });
        }
        Ok(batch)
    }

    /// Replace a single result.
    pub fn write_result(
        &mut self,
        id: BatchId,
        tier: Tier,
        index: usize,
        asset: EncodedAsset,
    ) -> Result<(), RegistryError> {
        let batch = self.get_mut(id)?;
        let results = batch.results.get_mut(tier);
        let len = results.len();
        let slot = results
            .get_mut(index)
            .ok_or(RegistryError::SlotOutOfRange {
                batch_id: id,
                tier,
                index,
                len,
            })?;
        *slot = asset;
        Ok(())
    }

    /// Overwrite every result of the tier with `asset`, returning how many were written.
    pub fn overwrite_all_results(
        &mut self,
        id: BatchId,
        tier: Tier,
        asset: &EncodedAsset,
    ) -> Result<usize, RegistryError> {
        let batch = self.get_mut(id)?;
        let results = batch.results.get_mut(tier);
        for slot in results.iter_mut() {
            *slot = asset.clone();
        }
        Ok(results.len())
    }

    pub fn view(&self) -> RegistryView {
        let jobs: Vec<BatchRowView> = self.batches.iter().map(BatchRowView::from_batch).collect();
        RegistryView {
            batch_count: jobs.len(),
            running_count: jobs.iter().filter(|job| job.status.is_running()).count(),
            jobs,
        }
    }
}
