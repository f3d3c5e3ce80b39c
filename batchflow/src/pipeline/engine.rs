//! Staged batch pipeline engine.
//!
//! Items run one at a time in submission order; within an item, stages run
//! strictly by ascending index. Processing is driven entirely by polling the
//! snapshot stream returned from [`PipelineEngine::run`].

use super::PipelineBuilder;
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{BatchItem, BatchRun, BatchState, ItemRun, RawInput, Snapshot, Transition};
use crate::errors::{BatchflowError, StageError};
use crate::events::{self, EventSink};
use crate::stages::{StageDescriptor, StageInput};
use dashmap::DashMap;
use futures::stream::{self, Stream, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A boxed stream of snapshots for one batch run.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Snapshot> + Send>>;

/// Canonical state of one batch, shared between the engine and its driver.
#[derive(Debug)]
struct BatchSlot {
    run: RwLock<BatchRun>,
    token: CancellationToken,
    started: AtomicBool,
}

/// Runs batches of items through an ordered list of stages.
pub struct PipelineEngine {
    name: String,
    stages: Arc<[StageDescriptor]>,
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
    batches: DashMap<Uuid, Arc<BatchSlot>>,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .field("batches", &self.batches.len())
            .finish()
    }
}

impl PipelineEngine {
    /// Creates an engine with default configuration and no event sink.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPipeline` if `stages` is empty.
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self, BatchflowError> {
        stages
            .into_iter()
            .fold(PipelineBuilder::new("pipeline"), PipelineBuilder::add_stage)
            .build()
    }

    /// Returns a builder for a named pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        mut stages: Vec<StageDescriptor>,
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        for (position, stage) in stages.iter_mut().enumerate() {
            stage.index = position + 1;
        }
        Self {
            name,
            stages: stages.into(),
            config,
            sink,
            batches: DashMap::new(),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stage descriptors in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the ids of all batches currently held by the engine.
    #[must_use]
    pub fn batch_ids(&self) -> Vec<Uuid> {
        self.batches.iter().map(|entry| *entry.key()).collect()
    }

    /// Accepts a batch of inputs without starting it.
    ///
    /// One item run is created per input, in input order, with every stage
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns `EmptyBatch` if `inputs` is empty.
    pub fn submit<I>(&self, inputs: I) -> Result<BatchRun, BatchflowError>
    where
        I: IntoIterator<Item = RawInput>,
    {
        let items: Vec<ItemRun> = inputs
            .into_iter()
            .enumerate()
            .map(|(position, input)| {
                let item = BatchItem::from_input(input, self.config.sequence_tag(position));
                ItemRun::new(
                    item,
                    self.stages
                        .iter()
                        .map(|s| (s.index, s.description.as_str())),
                )
            })
            .collect();

        if items.is_empty() {
            return Err(BatchflowError::EmptyBatch);
        }

        let run = BatchRun::new(items);
        let id = run.id;
        info!(
            pipeline = %self.name,
            batch_id = %id,
            items = run.len(),
            stages = self.stages.len(),
            "Batch submitted"
        );
        self.emit_now(
            events::BATCH_SUBMITTED,
            serde_json::json!({
                "batch_id": id.to_string(),
                "items": run.len(),
                "stages": self.stages.len(),
            }),
        );

        self.batches.insert(
            id,
            Arc::new(BatchSlot {
                run: RwLock::new(run.clone()),
                token: CancellationToken::new(),
                started: AtomicBool::new(false),
            }),
        );
        Ok(run)
    }

    /// Starts a batch and returns its snapshot stream.
    ///
    /// The stream is lazy: each poll performs at most one state transition.
    /// A batch can be run only once.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBatch` for ids this engine does not hold and
    /// `AlreadyStarted` if the batch was run before.
    pub fn run(&self, batch_id: Uuid) -> Result<SnapshotStream, BatchflowError> {
        let slot = self.slot(batch_id)?;
        if slot.started.swap(true, Ordering::SeqCst) {
            return Err(BatchflowError::AlreadyStarted(batch_id));
        }

        let starting = {
            let mut run = slot.run.write();
            let starting = run.state == BatchState::Submitted;
            if starting {
                run.state = BatchState::Running;
            }
            starting
        };
        if starting {
            info!(pipeline = %self.name, batch_id = %batch_id, "Batch started");
            self.emit_now(
                events::BATCH_STARTED,
                serde_json::json!({ "batch_id": batch_id.to_string() }),
            );
        } else {
            debug!(pipeline = %self.name, batch_id = %batch_id, "Batch already cancelled");
        }

        let driver = BatchDriver {
            pipeline: self.name.clone(),
            batch_id,
            slot,
            stages: Arc::clone(&self.stages),
            sink: self.config.emit_events.then(|| Arc::clone(&self.sink)),
            cursor: Cursor::default(),
            sequence: 0,
            done: false,
        };

        Ok(Box::pin(stream::unfold(driver, |mut driver| async move {
            let snapshot = driver.step().await?;
            Some((snapshot, driver))
        })))
    }

    /// Drives a batch to the end and returns its final state.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineEngine::run`].
    pub async fn run_to_completion(&self, batch_id: Uuid) -> Result<BatchRun, BatchflowError> {
        let slot = self.slot(batch_id)?;
        let mut snapshots = self.run(batch_id)?;
        while snapshots.next().await.is_some() {}
        let run = slot.run.read().clone();
        Ok(run)
    }

    /// Requests cancellation of a batch.
    ///
    /// Takes effect at the next stage boundary: the stage in flight finishes,
    /// no further stage starts. Unfinished items stay `processing`.
    /// Returns false if the batch was already cancelled, finished, or has no
    /// item left to process.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBatch` for ids this engine does not hold.
    pub fn cancel(
        &self,
        batch_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<bool, BatchflowError> {
        let slot = self.slot(batch_id)?;
        let reason = reason.into();

        {
            let mut run = slot.run.write();
            if run.state == BatchState::Finished
                || run.is_complete()
                || !slot.token.cancel(reason.clone())
            {
                return Ok(false);
            }
            run.state = BatchState::Cancelled;
            run.cancel_reason = Some(reason.clone());
        }

        warn!(pipeline = %self.name, batch_id = %batch_id, reason = %reason, "Batch cancelled");
        self.emit_now(
            events::BATCH_CANCELLED,
            serde_json::json!({ "batch_id": batch_id.to_string(), "reason": reason }),
        );
        Ok(true)
    }

    /// Returns a deep copy of a batch's current state.
    #[must_use]
    pub fn batch(&self, batch_id: Uuid) -> Option<BatchRun> {
        self.batches
            .get(&batch_id)
            .map(|slot| slot.run.read().clone())
    }

    /// Removes a batch from the engine and returns its last state.
    ///
    /// A stream still running for the batch stops at the next stage boundary.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBatch` for ids this engine does not hold.
    pub fn clear(&self, batch_id: Uuid) -> Result<BatchRun, BatchflowError> {
        let (_, slot) = self
            .batches
            .remove(&batch_id)
            .ok_or(BatchflowError::UnknownBatch(batch_id))?;
        slot.token.cancel("cleared");
        let run = slot.run.read().clone();

        debug!(pipeline = %self.name, batch_id = %batch_id, "Batch cleared");
        self.emit_now(
            events::BATCH_CLEARED,
            serde_json::json!({ "batch_id": batch_id.to_string() }),
        );
        Ok(run)
    }

    /// Removes every batch from the engine.
    pub fn clear_all(&self) {
        for id in self.batch_ids() {
            // Concurrent clears may race us to an id; losing is fine.
            let _ = self.clear(id);
        }
    }

    fn slot(&self, batch_id: Uuid) -> Result<Arc<BatchSlot>, BatchflowError> {
        self.batches
            .get(&batch_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BatchflowError::UnknownBatch(batch_id))
    }

    fn emit_now(&self, event_type: &str, data: serde_json::Value) {
        if self.config.emit_events {
            self.sink.try_emit(event_type, Some(data));
        }
    }
}

/// Reason recorded when a snapshot stream is dropped before its end.
const STREAM_DROPPED: &str = "stream dropped";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Start,
    Compute,
    Finish,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    item: usize,
    stage: usize,
    phase: Phase,
}

/// Owns the cursor of one batch run and performs one transition per step.
struct BatchDriver {
    pipeline: String,
    batch_id: Uuid,
    slot: Arc<BatchSlot>,
    stages: Arc<[StageDescriptor]>,
    sink: Option<Arc<dyn EventSink>>,
    cursor: Cursor,
    sequence: u64,
    done: bool,
}

impl BatchDriver {
    async fn step(&mut self) -> Option<Snapshot> {
        if self.done {
            return None;
        }

        let item_count = self.slot.run.read().items.len();
        if self.cursor.item >= item_count {
            self.finish().await;
            return None;
        }

        let snapshot = match self.cursor.phase {
            Phase::Start => {
                if self.slot.token.is_cancelled() {
                    self.finish().await;
                    return None;
                }
                self.start_stage()
            }
            Phase::Compute => self.compute_stage().await,
            Phase::Finish => self.complete_item(),
        };

        if let Some(ref sink) = self.sink {
            sink.emit(snapshot.transition.event_type(), Some(snapshot.event_payload()))
                .await;
        }
        Some(snapshot)
    }

    fn start_stage(&mut self) -> Snapshot {
        let Cursor { item, stage, .. } = self.cursor;
        let item_run = {
            let mut run = self.slot.run.write();
            let item_run = &mut run.items[item];
            item_run.stages[stage].start();
            item_run.refresh_status();
            item_run.clone()
        };

        debug!(
            pipeline = %self.pipeline,
            batch_id = %self.batch_id,
            item = item,
            stage = stage + 1,
            description = %self.stages[stage].description,
            "Stage started"
        );
        self.cursor.phase = Phase::Compute;
        self.snapshot(item, Transition::StageStarted, Some(stage + 1), item_run)
    }

    async fn compute_stage(&mut self) -> Snapshot {
        let Cursor { item, stage, .. } = self.cursor;
        let (batch_item, prior) = {
            let run = self.slot.run.read();
            let item_run = &run.items[item];
            (item_run.item.clone(), item_run.stages[..stage].to_vec())
        };

        let descriptor = &self.stages[stage];
        let outcome = AssertUnwindSafe(
            descriptor
                .compute
                .compute(StageInput::new(&batch_item, &prior)),
        )
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(StageError::new("stage computation panicked")));

        let failed = outcome.is_err();
        let item_run = {
            let mut run = self.slot.run.write();
            let item_run = &mut run.items[item];
            match outcome {
                Ok(result) => item_run.stages[stage].complete(result),
                Err(err) => {
                    let err = err.at_stage(stage + 1);
                    warn!(
                        pipeline = %self.pipeline,
                        batch_id = %self.batch_id,
                        item = item,
                        stage = stage + 1,
                        error = %err.message,
                        "Stage failed"
                    );
                    item_run.stages[stage].fail(&err);
                }
            }
            item_run.refresh_status();
            item_run.clone()
        };

        if failed {
            self.cursor = Cursor {
                item: item + 1,
                ..Cursor::default()
            };
            return self.snapshot(item, Transition::StageFailed, Some(stage + 1), item_run);
        }

        debug!(
            pipeline = %self.pipeline,
            batch_id = %self.batch_id,
            item = item,
            stage = stage + 1,
            lines = item_run.stages[stage].output_lines.len(),
            "Stage completed"
        );
        if stage + 1 == self.stages.len() {
            self.cursor.phase = Phase::Finish;
        } else {
            self.cursor.stage += 1;
            self.cursor.phase = Phase::Start;
        }
        self.snapshot(item, Transition::StageCompleted, Some(stage + 1), item_run)
    }

    fn complete_item(&mut self) -> Snapshot {
        let item = self.cursor.item;
        let item_run = {
            let mut run = self.slot.run.write();
            let item_run = &mut run.items[item];
            item_run.refresh_status();
            item_run.clone()
        };

        info!(
            pipeline = %self.pipeline,
            batch_id = %self.batch_id,
            item = item,
            label = %item_run.item.label,
            status = %item_run.status,
            "Item completed"
        );
        self.cursor = Cursor {
            item: item + 1,
            ..Cursor::default()
        };
        self.snapshot(item, Transition::ItemCompleted, None, item_run)
    }

    async fn finish(&mut self) {
        self.done = true;
        let (state, summary) = {
            let mut run = self.slot.run.write();
            if run.state == BatchState::Running {
                if self.slot.token.is_cancelled() {
                    run.state = BatchState::Cancelled;
                    run.cancel_reason = self.slot.token.reason();
                } else {
                    run.state = BatchState::Finished;
                }
            }
            (run.state, run.summary())
        };

        info!(
            pipeline = %self.pipeline,
            batch_id = %self.batch_id,
            state = %state,
            completed = summary.completed,
            errors = summary.error,
            processing = summary.processing,
            "Batch stream ended"
        );
        if state == BatchState::Finished {
            if let Some(ref sink) = self.sink {
                sink.emit(
                    events::BATCH_FINISHED,
                    Some(serde_json::json!({
                        "batch_id": self.batch_id.to_string(),
                        "summary": summary,
                    })),
                )
                .await;
            }
        }
    }

    /// Settles the batch when its stream is dropped before the end.
    ///
    /// A stage left running is failed. The batch becomes `finished` if every
    /// item already reached a terminal status and `cancelled` otherwise.
    fn abandon(&mut self) {
        self.done = true;
        let Cursor { item, stage, phase } = self.cursor;
        let (state, summary) = {
            let mut run = self.slot.run.write();
            let all_done = run.is_complete();
            if phase == Phase::Compute && !all_done {
                if let Some(item_run) = run.items.get_mut(item) {
                    item_run.stages[stage]
                        .fail(&StageError::new(STREAM_DROPPED).at_stage(stage + 1));
                    item_run.refresh_status();
                }
            }
            if run.state != BatchState::Running {
                return;
            }
            if all_done {
                run.state = BatchState::Finished;
            } else {
                self.slot.token.cancel(STREAM_DROPPED);
                run.state = BatchState::Cancelled;
                run.cancel_reason = self.slot.token.reason();
            }
            (run.state, run.summary())
        };

        warn!(
            pipeline = %self.pipeline,
            batch_id = %self.batch_id,
            state = %state,
            completed = summary.completed,
            processing = summary.processing,
            "Snapshot stream dropped"
        );
        if let Some(ref sink) = self.sink {
            let batch_id = self.batch_id.to_string();
            if state == BatchState::Finished {
                sink.try_emit(
                    events::BATCH_FINISHED,
                    Some(serde_json::json!({ "batch_id": batch_id, "summary": summary })),
                );
            } else {
                sink.try_emit(
                    events::BATCH_CANCELLED,
                    Some(serde_json::json!({ "batch_id": batch_id, "reason": STREAM_DROPPED })),
                );
            }
        }
    }

    fn snapshot(
        &mut self,
        item_index: usize,
        transition: Transition,
        stage_index: Option<usize>,
        item: ItemRun,
    ) -> Snapshot {
        let sequence = self.sequence;
        self.sequence += 1;
        Snapshot::new(
            self.batch_id,
            sequence,
            item_index,
            transition,
            stage_index,
            item,
        )
    }
}

impl Drop for BatchDriver {
    fn drop(&mut self) {
        if !self.done {
            self.abandon();
        }
    }
}
