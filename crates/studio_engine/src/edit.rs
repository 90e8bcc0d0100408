use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use studio_core::{
    AdjustmentError, Adjustments, BatchId, EditHistory, EncodedAsset, RegistryError, Tier,
};
use studio_logging::{studio_debug, studio_info};

use crate::generation::{AccessGate, GenerationError, GenerationRequest, GenerationService};
use crate::scheduler::{lock_registry, SharedRegistry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    pub message: String,
}

/// Applies adjustments to an asset and returns the rendered raster.
pub trait RenderSurface: Send + Sync {
    fn render(
        &self,
        asset: &EncodedAsset,
        adjustments: &Adjustments,
    ) -> Result<EncodedAsset, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("a regeneration is already in flight for this session")]
    Busy,
    #[error("batch {0} is running; edits are blocked until the run ends")]
    BatchRunning(BatchId),
    #[error("batch {batch_id} {tier} results were replaced by a run after this session opened")]
    StaleSession { batch_id: BatchId, tier: Tier },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Adjustment(#[from] AdjustmentError),
}

struct SessionState {
    history: EditHistory,
    busy: bool,
}

/// Ends a regeneration: clears the busy flag and, unless the edit completed,
/// takes back its undo entry. Also runs when the regenerate future is dropped.
struct PendingEdit<'a> {
    state: &'a Mutex<SessionState>,
    completed: bool,
}

impl Drop for PendingEdit<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.completed {
            state.history.abandon_edit();
        }
        state.busy = false;
    }
}

/// Interactive refinement of one result slot.
///
/// Regenerate and adjust only change the displayed asset; undo and redo also
/// write the restored asset straight into the batch; commit writes the
/// displayed asset on request. Once a run replaces the tier's results, writes
/// from the session fail with [`EditError::StaleSession`].
pub struct EditSession {
    registry: SharedRegistry,
    service: Arc<dyn GenerationService>,
    access: Arc<dyn AccessGate>,
    batch_id: BatchId,
    tier: Tier,
    index: usize,
    // Tier results revision the history was built against.
    revision: u64,
    references: Vec<EncodedAsset>,
    state: Mutex<SessionState>,
}

impl EditSession {
    pub fn open(
        registry: SharedRegistry,
        service: Arc<dyn GenerationService>,
        access: Arc<dyn AccessGate>,
        batch_id: BatchId,
        tier: Tier,
        index: usize,
    ) -> Result<Self, EditError> {
        let (displayed, references, revision) = {
            let guard = lock_registry(&registry);
            let batch = guard
                .get(batch_id)
                .ok_or(RegistryError::UnknownBatch(batch_id))?;
            if batch.status().is_running() {
                return Err(EditError::BatchRunning(batch_id));
            }
            let results = batch.results(tier);
            let displayed = results
                .get(index)
                .cloned()
                .ok_or(RegistryError::SlotOutOfRange {
                    batch_id,
                    tier,
                    index,
                    len: results.len(),
                })?;
            (
                displayed,
                batch.resolved_references(),
                batch.results_revision(tier),
            )
        };
        studio_debug!(
            "Edit session opened: batch {} tier {} index {}",
            batch_id,
            tier,
            index
        );
        Ok(Self {
            registry,
            service,
            access,
            batch_id,
            tier,
            index,
            revision,
            references,
            state: Mutex::new(SessionState {
                history: EditHistory::new(displayed),
                busy: false,
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the session for a synchronous edit, refusing while a regeneration runs.
    fn idle_state(&self) -> Result<MutexGuard<'_, SessionState>, EditError> {
        let state = self.lock_state();
        if state.busy {
            return Err(EditError::Busy);
        }
        Ok(state)
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn displayed(&self) -> EncodedAsset {
        self.lock_state().history.displayed().clone()
    }

    /// Snapshot of the current history.
    pub fn history(&self) -> EditHistory {
        self.lock_state().history.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().busy
    }

    /// Regenerate the displayed asset from `instruction`.
    ///
    /// Returns `Ok(false)` without calling the service when the instruction is blank.
    /// The redo history is dropped before the call; on failure the undo stack is
    /// put back as it was.
    pub async fn regenerate(&self, instruction: &str) -> Result<bool, EditError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Ok(false);
        }
        let request = {
            let mut state = self.idle_state()?;
            state.busy = true;
            state.history.begin_edit();
            GenerationRequest {
                references: self.references.clone(),
                instruction: Some(instruction.to_string()),
                conditioning: Some(state.history.displayed().clone()),
                tier: self.tier,
            }
        };
        let mut pending = PendingEdit {
            state: &self.state,
            completed: false,
        };

        match self.service.generate(&request).await {
            Ok(asset) => {
                self.lock_state().history.complete_edit(asset);
                pending.completed = true;
                studio_info!(
                    "Regenerated batch {} {} #{}",
                    self.batch_id,
                    self.tier,
                    self.index + 1
                );
                Ok(true)
            }
            Err(err) => {
                if err.is_elevated_access() {
                    self.access.request_elevated_access(self.tier);
                }
                Err(err.into())
            }
        }
    }

    /// Render the displayed asset with `adjustments` and display the result as a new edit.
    ///
    /// Identity adjustments are a no-op.
    pub fn apply_adjustments(
        &self,
        surface: &dyn RenderSurface,
        adjustments: &Adjustments,
    ) -> Result<bool, EditError> {
        adjustments.validate()?;
        if adjustments.is_identity() {
            return Ok(false);
        }
        let mut state = self.idle_state()?;
        let rendered = surface.render(state.history.displayed(), adjustments)?;
        state.history.record(rendered);
        Ok(true)
    }

    pub fn undo(&self) -> Result<bool, EditError> {
        let mut state = self.idle_state()?;
        let Some(previous) = state.history.undo_stack().last().cloned() else {
            return Ok(false);
        };
        self.write_back(previous)?;
        state.history.undo();
        Ok(true)
    }

    pub fn redo(&self) -> Result<bool, EditError> {
        let mut state = self.idle_state()?;
        let Some(next) = state.history.redo_stack().last().cloned() else {
            return Ok(false);
        };
        self.write_back(next)?;
        state.history.redo();
        Ok(true)
    }

    /// Write the displayed asset into the batch, returning the number of slots written.
    pub fn commit(&self, apply_to_all: bool) -> Result<usize, EditError> {
        let state = self.idle_state()?;
        let displayed = state.history.displayed().clone();
        let mut registry = lock_registry(&self.registry);
        self.ensure_writable(&registry)?;
        let written = if apply_to_all {
            registry.overwrite_all_results(self.batch_id, self.tier, &displayed)?
        } else {
            registry.write_result(self.batch_id, self.tier, self.index, displayed)?;
            1
        };
        studio_info!(
            "Committed edit to {} {} slot(s) of batch {}",
            written,
            self.tier,
            self.batch_id
        );
        Ok(written)
    }

    /// End the session, returning the asset that was displayed last.
    pub fn close(self) -> EncodedAsset {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        state.history.displayed().clone()
    }

    fn write_back(&self, asset: EncodedAsset) -> Result<(), EditError> {
        let mut registry = lock_registry(&self.registry);
        self.ensure_writable(&registry)?;
        registry.write_result(self.batch_id, self.tier, self.index, asset)?;
        Ok(())
    }

    fn ensure_writable(&self, registry: &studio_core::JobRegistry) -> Result<(), EditError> {
        let batch = registry
            .get(self.batch_id)
            .ok_or(RegistryError::UnknownBatch(self.batch_id))?;
        if batch.status().is_running() {
            return Err(EditError::BatchRunning(self.batch_id));
        }
        if batch.results_revision(self.tier) != self.revision {
            return Err(EditError::StaleSession {
                batch_id: self.batch_id,
                tier: self.tier,
            });
        }
        Ok(())
    }
}
