//! Sequential generation runs over the job registry.
//!
//! A run issues up to `outputs_per_batch` calls, one at a time. Before each
//! call it checks the run-all [`CancellationToken`] and the batch's own stop
//! request; the call already in flight is never interrupted.
//!
//! Commit policy: a run that finishes or is stopped replaces the tier's
//! results with everything it produced. A run in which any call fails commits
//! nothing and leaves the batch in `Error`.

use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use studio_core::{BatchId, JobRegistry, RegistryError, Tier};
use studio_logging::{studio_debug, studio_info, studio_warn};
use tokio_util::sync::CancellationToken;

use crate::generation::{AccessGate, GenerationError, GenerationRequest, GenerationService};
use crate::SchedulerEvent;

pub type SharedRegistry = Arc<Mutex<JobRegistry>>;

pub(crate) fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, JobRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("outputs per batch must be at least 1")]
    NoOutputsRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub outputs_per_batch: usize,
    pub tier: Tier,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            outputs_per_batch: 1,
            tier: Tier::Standard,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.outputs_per_batch == 0 {
            return Err(SchedulerError::NoOutputsRequested);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every planned call succeeded.
    Completed { generated: usize },
    /// A stop was observed before the plan finished; partial results were committed.
    Stopped { generated: usize },
    /// A call failed; nothing from this run was committed.
    Failed {
        message: String,
        elevated_access: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAllSummary {
    pub completed: usize,
    pub stopped: usize,
    pub failed: usize,
    /// Batches never started, either busy or left behind by cancellation.
    pub skipped: usize,
    pub interrupted: bool,
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _event: SchedulerEvent) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<SchedulerEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<SchedulerEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }
}

pub struct GenerationScheduler {
    registry: SharedRegistry,
    service: Arc<dyn GenerationService>,
    access: Arc<dyn AccessGate>,
    sink: Arc<dyn ProgressSink>,
}

impl GenerationScheduler {
    pub fn new(
        registry: SharedRegistry,
        service: Arc<dyn GenerationService>,
        access: Arc<dyn AccessGate>,
    ) -> Self {
        Self {
            registry,
            service,
            access,
            sink: Arc::new(NoopProgressSink),
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Ask one batch to stop after its in-flight call.
    pub fn request_stop(&self, batch_id: BatchId) -> Result<bool, RegistryError> {
        lock_registry(&self.registry).request_stop(batch_id)
    }

    fn stop_observed(&self, batch_id: BatchId, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || lock_registry(&self.registry).is_stop_requested(batch_id)
    }

    /// Run up to `outputs` sequential generation calls against one batch.
    pub async fn run_batch(
        &self,
        batch_id: BatchId,
        outputs: usize,
        tier: Tier,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, SchedulerError> {
        if outputs == 0 {
            return Err(SchedulerError::NoOutputsRequested);
        }
        let request = {
            let mut registry = lock_registry(&self.registry);
            registry.begin_run(batch_id, tier)?;
            let batch = registry
                .get(batch_id)
                .ok_or(RegistryError::UnknownBatch(batch_id))?;
            GenerationRequest {
                references: batch.resolved_references(),
                instruction: batch.custom_prompt().map(str::to_string),
                conditioning: None,
                tier,
            }
        };
        studio_info!(
            "Run started: batch {} tier {} ({} calls, {} references)",
            batch_id,
            tier,
            outputs,
            request.references.len()
        );
        self.sink.emit(SchedulerEvent::RunStarted {
            batch_id,
            tier,
            planned: outputs,
        });

        let mut generated = Vec::with_capacity(outputs);
        let mut stopped = false;
        for index in 0..outputs {
            if self.stop_observed(batch_id, cancel) {
                studio_info!(
                    "Batch {} stopping after {} of {} outputs",
                    batch_id,
                    generated.len(),
                    outputs
                );
                stopped = true;
                break;
            }
            studio_debug!("Batch {} call {}/{}", batch_id, index + 1, outputs);
            match self.service.generate(&request).await {
                Ok(asset) => {
                    generated.push(asset);
                    self.sink
                        .emit(SchedulerEvent::OutputGenerated { batch_id, index });
                }
                Err(err) => return self.finish_failed(batch_id, tier, err),
            }
        }

        let count = generated.len();
        lock_registry(&self.registry).commit_run(batch_id, tier, generated)?;
        let outcome = if stopped {
            RunOutcome::Stopped { generated: count }
        } else {
            RunOutcome::Completed { generated: count }
        };
        studio_info!("Run finished: batch {} {:?}", batch_id, outcome);
        self.sink.emit(SchedulerEvent::RunFinished {
            batch_id,
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn finish_failed(
        &self,
        batch_id: BatchId,
        tier: Tier,
        err: GenerationError,
    ) -> Result<RunOutcome, SchedulerError> {
        let elevated_access = err.is_elevated_access();
        if elevated_access {
            studio_warn!("Batch {} needs elevated access for tier {}", batch_id, tier);
            self.access.request_elevated_access(tier);
        }
        let message = err.to_string();
        studio_warn!("Run failed: batch {}: {}", batch_id, message);
        lock_registry(&self.registry).fail_run(batch_id, tier, message.clone())?;
        let outcome = RunOutcome::Failed {
            message,
            elevated_access,
        };
        self.sink.emit(SchedulerEvent::RunFinished {
            batch_id,
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Run every batch in registry order until done or `cancel` fires.
    ///
    /// A failed batch does not stop the sequence. Batches already running are skipped.
    pub async fn run_all(
        &self,
        config: &SchedulerConfig,
        cancel: &CancellationToken,
    ) -> Result<RunAllSummary, SchedulerError> {
        config.validate()?;
        let ids = lock_registry(&self.registry).ids();
        let mut summary = RunAllSummary::default();
        for (position, batch_id) in ids.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                summary.skipped += ids.len() - position;
                break;
            }
            match self
                .run_batch(batch_id, config.outputs_per_batch, config.tier, cancel)
                .await
            {
                Ok(RunOutcome::Completed { .. }) => summary.completed += 1,
                Ok(RunOutcome::Stopped { .. }) => summary.stopped += 1,
                Ok(RunOutcome::Failed { .. }) => summary.failed += 1,
                Err(SchedulerError::Registry(RegistryError::BatchBusy(_))) => {
                    studio_warn!("Batch {} is busy; skipped by run-all", batch_id);
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        summary.interrupted = cancel.is_cancelled();
        studio_info!("Run-all finished: {:?}", summary);
        Ok(summary)
    }
}
