//! Supersession-aware pipeline runner.
//!
//! Each [`PipelineRunner::submit`] cancels whatever run is still going
//! and starts a fresh one. Only the most recent run may write the result
//! slot, so a superseded run can never leak pins into what is rendered.
//! A caller that stops waiting on its [`RunHandle`] cancels the run too.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fire_portal_geocoder::Geocoder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressCallback, null_progress};
use crate::{HotspotRequest, PipelineConfig, PipelineOutcome};

/// What a submitted run's caller gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// The run was the latest when it ended. Its outcome is also in the
    /// result slot unless it was cancelled.
    Finished(PipelineOutcome),
    /// A newer submission replaced this run.
    Superseded,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    cancel: Option<CancellationToken>,
    latest: Option<PipelineOutcome>,
}

/// Builds a fresh progress reporter for each submitted run.
pub type ProgressFactory = Arc<dyn Fn() -> Arc<dyn ProgressCallback> + Send + Sync>;

/// Runs pipelines one at a time against a shared geocoder, keeping the
/// latest outcome.
pub struct PipelineRunner {
    geocoder: Geocoder,
    config: PipelineConfig,
    progress: ProgressFactory,
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("geocoder", &self.geocoder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to a submitted run.
#[derive(Debug)]
pub struct RunHandle {
    generation: u64,
    task: JoinHandle<RunResult>,
    slot: Arc<Mutex<Slot>>,
}

impl RunHandle {
    /// Generation number assigned at submission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the run to end.
    ///
    /// Dropping this future before it resolves cancels the run, unless a
    /// newer submission already replaced it.
    pub async fn wait(mut self) -> RunResult {
        let abandon = AbandonGuard {
            slot: self.slot.clone(),
            generation: self.generation,
            armed: true,
        };

        let result = match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Map preview run {} aborted: {e}", self.generation);
                RunResult::Finished(PipelineOutcome::Unavailable)
            }
        };

        abandon.disarm();
        result
    }
}

/// Cancels its run's generation when dropped while still armed.
struct AbandonGuard {
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    armed: bool,
}

impl AbandonGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed && cancel_generation(&self.slot, self.generation) {
            log::debug!("Map preview run {} abandoned by its caller", self.generation);
        }
    }
}

impl PipelineRunner {
    /// Creates a runner with silent progress reporting.
    #[must_use]
    pub fn new(geocoder: Geocoder, config: PipelineConfig) -> Self {
        Self::with_progress(geocoder, config, Arc::new(null_progress))
    }

    /// Creates a runner that reports each run to a reporter built by
    /// `progress`, so a superseded run can't clear its successor's bar.
    #[must_use]
    pub fn with_progress(geocoder: Geocoder, config: PipelineConfig, progress: ProgressFactory) -> Self {
        Self {
            geocoder,
            config,
            progress,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }

    /// Cancels the current run (if any) and starts `request` on a new
    /// task.
    ///
    /// The new run writes the result slot when it completes, provided no
    /// later submission has replaced it. A run that panics is recorded as
    /// [`PipelineOutcome::Unavailable`].
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: HotspotRequest) -> RunHandle {
        let cancel = CancellationToken::new();
        let generation = {
            let mut slot = self.lock();
            if let Some(previous) = slot.cancel.replace(cancel.clone()) {
                previous.cancel();
            }
            slot.generation += 1;
            slot.generation
        };

        log::debug!("Starting map preview run {generation}");

        let geocoder = self.geocoder.clone();
        let config = self.config;
        let progress = (self.progress)();
        let slot = self.slot.clone();

        let task = tokio::spawn(async move {
            let run_cancel = cancel.clone();
            let inner = tokio::spawn(async move {
                crate::run(&geocoder, &config, &request, &run_cancel, progress.as_ref()).await
            });

            let outcome = match inner.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Map preview run {generation} failed: {e}");
                    PipelineOutcome::Unavailable
                }
            };

            let mut slot = lock_slot(&slot);
            if slot.generation != generation {
                log::debug!("Discarding superseded map preview run {generation}");
                return RunResult::Superseded;
            }

            slot.cancel = None;
            if outcome != PipelineOutcome::Cancelled {
                slot.latest = Some(outcome.clone());
            }
            drop(slot);

            RunResult::Finished(outcome)
        });

        RunHandle {
            generation,
            task,
            slot: self.slot.clone(),
        }
    }

    /// Outcome of the most recent run that completed without being
    /// superseded or cancelled.
    #[must_use]
    pub fn latest(&self) -> Option<PipelineOutcome> {
        self.lock().latest.clone()
    }

    /// Cancels the current run, if any. The result slot keeps its previous
    /// value.
    pub fn cancel(&self) {
        if let Some(cancel) = self.lock().cancel.take() {
            cancel.cancel();
        }
    }

    /// Cancels the run started as `generation` if it is still the current
    /// one. Returns whether a run was cancelled.
    pub fn cancel_generation(&self, generation: u64) -> bool {
        cancel_generation(&self.slot, generation)
    }

    /// Whether a run is still in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().cancel.is_some()
    }
}

impl Drop for PipelineRunner {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cancel_generation(slot: &Mutex<Slot>, generation: u64) -> bool {
    let mut slot = lock_slot(slot);
    if slot.generation != generation {
        return false;
    }
    slot.cancel.take().is_some_and(|cancel| {
        cancel.cancel();
        true
    })
}
