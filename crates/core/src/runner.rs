// Batch Runner
//
// Drives the probe across a list of models with shared inputs.
//
// - Dispatch is in submission order; cancellation is checked before every dispatch
// - In-flight probes are polled on the caller's task (FuturesUnordered), bounded
//   by `concurrency`; results are written into per-index slots by this single loop
// - Progress callbacks fire from the same loop, never concurrently
// - A cancelled batch keeps everything that was dispatched; nothing is synthesized
//   for models that never ran

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BatchError, ValidationError};
use crate::model::{BatchInputs, BatchResult, ModelSpec, ProbeResult};
use crate::probe::Prober;

// ============================================================================
// Progress
// ============================================================================

/// Observer notified as a batch progresses
pub trait ProgressSink: Send + Sync {
    /// Called right before the probe for `index` is dispatched
    fn on_started(&self, _index: usize, _model: &ModelSpec) {}

    /// Called exactly once per dispatched model, possibly out of submission order
    fn on_result(&self, index: usize, result: &ProbeResult);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, &ProbeResult) + Send + Sync,
{
    fn on_result(&self, index: usize, result: &ProbeResult) {
        self(index, result)
    }
}

/// Sink that ignores all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_result(&self, _index: usize, _result: &ProbeResult) {}
}

/// Progress notification forwarded over a channel
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { index: usize, model: ModelSpec },
    Finished { index: usize, result: ProbeResult },
}

/// Sink forwarding progress to an unbounded channel, for UI loops that poll
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_started(&self, index: usize, model: &ModelSpec) {
        // A dropped receiver only means nobody is watching anymore
        let _ = self.tx.send(ProgressEvent::Started {
            index,
            model: model.clone(),
        });
    }

    fn on_result(&self, index: usize, result: &ProbeResult) {
        let _ = self.tx.send(ProgressEvent::Finished {
            index,
            result: result.clone(),
        });
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation predicate, polled between dispatches
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelSignal for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Signal that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Cloneable cancellation handle; all clones share one flag
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Probes already in flight still finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl CancelSignal for CancellationFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// BatchRunner
// ============================================================================

/// Runs a probe per model and assembles the ordered batch result
#[derive(Debug, Clone)]
pub struct BatchRunner {
    prober: Prober,
    concurrency: usize,
}

impl BatchRunner {
    /// Create a sequential runner
    pub fn new(prober: Prober) -> Self {
        Self {
            prober,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` probes in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run one batch.
    ///
    /// Returns `Err` only for batch-level precondition failures, in which
    /// case no probe is dispatched and no progress is reported. A cancelled
    /// batch is `Ok` with fewer results than requested models.
    pub async fn run(
        &self,
        models: &[ModelSpec],
        inputs: &BatchInputs,
        sink: &dyn ProgressSink,
        cancel: &dyn CancelSignal,
    ) -> Result<BatchResult, BatchError> {
        self.validate(models, inputs)?;

        let batch_id = Uuid::now_v7();
        info!(
            batch_id = %batch_id,
            models = models.len(),
            concurrency = self.concurrency,
            "Starting batch"
        );

        let mut slots: Vec<Option<ProbeResult>> = (0..models.len()).map(|_| None).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut next_index = 0;
        let mut cancelled = false;

        loop {
            while !cancelled && next_index < models.len() && in_flight.len() < self.concurrency {
                if cancel.is_cancelled() {
                    info!(
                        batch_id = %batch_id,
                        dispatched = next_index,
                        "Batch cancelled, no further probes will be dispatched"
                    );
                    cancelled = true;
                    break;
                }

                let index = next_index;
                let model = &models[index];
                debug!(batch_id = %batch_id, index, model = %model, "Dispatching probe");
                sink.on_started(index, model);

                let request = inputs.request_for(model);
                let prober = &self.prober;
                in_flight.push(async move { (index, prober.probe(request).await) });
                next_index += 1;
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };
            info!(
                batch_id = %batch_id,
                index,
                model = %result.model(),
                success = result.success(),
                "Probe finished"
            );
            sink.on_result(index, &result);
            slots[index] = Some(result);
        }

        let batch = BatchResult::from_slots(batch_id, slots);
        info!(
            batch_id = %batch_id,
            completed = batch.len(),
            requested = batch.requested(),
            succeeded = batch.success_count(),
            "Batch finished"
        );
        Ok(batch)
    }

    fn validate(&self, models: &[ModelSpec], inputs: &BatchInputs) -> Result<(), ValidationError> {
        if models.is_empty() {
            return Err(ValidationError::NoModels);
        }
        if models.iter().any(|m| m.as_str().trim().is_empty()) {
            return Err(ValidationError::EmptyModelId);
        }
        if self.concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        inputs.validate()
    }
}
