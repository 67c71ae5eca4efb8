//! Pipeline engine: wires stages together with bounded channels and drives
//! them to completion or failure.
//!
//! A pipeline with N stages owns N + 1 channels. The first is the feed
//! boundary the caller writes into, the last is the drain boundary the caller
//! reads from. Every stage runs as its own tokio task. A slow stage stalls its
//! upstream neighbours once their channel fills; that is the flow-control
//! mechanism, not an error.

use std::sync::Arc;

use ks_core::config::PipelineConfig;
use ks_core::{Error, Result, Scope};
use tokio::task::JoinSet;

use crate::channel::{frame_channel, FrameReceiver, FrameSender};
use crate::frame::Frame;
use crate::metrics::{PipelineReport, StageMetrics, StageState};
use crate::stage::Stage;

/// Default boundary channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// An ordered, single-use sequence of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    capacity: usize,
    started: bool,
    last_report: Option<PipelineReport>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a pipeline whose boundary channels hold `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stages: Vec::new(),
            capacity: capacity.max(1),
            started: false,
            last_report: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_capacity(config.channel_capacity)
    }

    /// Append a stage.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineAlreadyStarted`] once the pipeline has been started.
    pub fn add_stage(&mut self, stage: impl Stage) -> Result<&mut Self> {
        self.add_boxed_stage(Box::new(stage))
    }

    /// Append an already boxed stage.
    pub fn add_boxed_stage(&mut self, stage: Box<dyn Stage>) -> Result<&mut Self> {
        if self.started {
            return Err(Error::PipelineAlreadyStarted);
        }
        self.stages.push(stage);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Metrics of the last [`run`](Self::run), if it finished.
    pub fn last_report(&self) -> Option<&PipelineReport> {
        self.last_report.as_ref()
    }

    /// Spawn every stage and return the running pipeline.
    ///
    /// The stages share a child of `scope`; cancelling `scope` cancels them,
    /// and a failing stage cancels only the child. Must be called from within
    /// a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineAlreadyStarted`] on a second call, and
    /// [`Error::Cancelled`] if `scope` is already cancelled.
    pub fn start(&mut self, scope: &Scope) -> Result<PipelineRun> {
        if self.started {
            return Err(Error::PipelineAlreadyStarted);
        }
        scope.check("pipeline start")?;
        self.started = true;

        let inner = scope.child();
        let stages = std::mem::take(&mut self.stages);
        let metrics: Vec<Arc<StageMetrics>> = stages
            .iter()
            .enumerate()
            .map(|(i, s)| Arc::new(StageMetrics::new(s.name(), i)))
            .collect();

        let (feed, mut upstream) = frame_channel(self.capacity, &inner);
        let mut tasks = JoinSet::new();

        for (index, mut stage) in stages.into_iter().enumerate() {
            let (tx, rx) = frame_channel(self.capacity, &inner);
            let input = upstream.counted_by(metrics[index].clone());
            let output = tx.counted_by(metrics[index].clone());
            upstream = rx;

            let m = metrics[index].clone();
            tasks.spawn(async move {
                m.set_state(StageState::Running);
                tracing::debug!("Stage {index} ({}) running", m.name());
                let result = stage.process(input, output).await;
                (index, result)
            });
        }

        tracing::info!(
            "Pipeline started with {} stage(s), channel capacity {}",
            metrics.len(),
            self.capacity
        );

        Ok(PipelineRun {
            feed: Some(feed),
            drain: Some(upstream),
            tasks,
            metrics,
            inner,
            caller: scope.clone(),
        })
    }

    /// Feed `frames` through the pipeline and return what comes out of the
    /// drain boundary, in order.
    ///
    /// # Errors
    ///
    /// [`Error::StageFailure`] naming the first stage that failed, or
    /// [`Error::Cancelled`] if `scope` was cancelled.
    pub async fn run(
        &mut self,
        scope: &Scope,
        frames: impl IntoIterator<Item = Frame>,
    ) -> Result<Vec<Frame>> {
        let mut running = self.start(scope)?;
        let feed = running.take_feed();
        let drain = running.take_drain();

        let feeder = async move {
            if let Some(feed) = feed {
                for frame in frames {
                    feed.send(frame).await?;
                }
            }
            Ok::<(), Error>(())
        };
        let drainer = async move {
            match drain {
                Some(drain) => drain.collect().await,
                None => Ok(Vec::new()),
            }
        };

        let (fed, drained) = tokio::join!(feeder, drainer);
        let report = running.wait().await?;
        self.last_report = Some(report);
        if let Err(e) = fed {
            // Only reachable when the first stage stopped reading early.
            tracing::debug!("Pipeline feed ended early: {e}");
        }
        drained
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline")
            .field("stages", &names)
            .field("capacity", &self.capacity)
            .field("started", &self.started)
            .finish()
    }
}

/// A started pipeline.
///
/// Take the feed and drain boundaries, drive them, then call
/// [`wait`](Self::wait). Boundaries still held when `wait` is called are
/// closed.
#[derive(Debug)]
pub struct PipelineRun {
    feed: Option<FrameSender>,
    drain: Option<FrameReceiver>,
    tasks: JoinSet<(usize, Result<()>)>,
    metrics: Vec<Arc<StageMetrics>>,
    inner: Scope,
    caller: Scope,
}

impl PipelineRun {
    /// The sender feeding the first stage. Dropping it ends the stream.
    pub fn take_feed(&mut self) -> Option<FrameSender> {
        self.feed.take()
    }

    /// The receiver draining the last stage.
    pub fn take_drain(&mut self) -> Option<FrameReceiver> {
        self.drain.take()
    }

    /// Cancel every stage.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Live metrics snapshot.
    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            stages: self.metrics.iter().map(|m| m.snapshot()).collect(),
        }
    }

    /// Wait until every stage has finished.
    ///
    /// The first stage to fail cancels the others and is reported as
    /// [`Error::StageFailure`]. Stages that merely unwound because of that
    /// cancellation are marked failed but not reported.
    pub async fn wait(mut self) -> Result<PipelineReport> {
        self.feed = None;
        self.drain = None;

        let mut failure: Option<Error> = None;
        let mut unwound = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            let (index, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Pipeline stage task aborted: {e}");
                    if failure.is_none() {
                        failure = Some(Error::Internal(format!("stage task aborted: {e}")));
                        self.inner.cancel();
                    }
                    continue;
                }
            };
            let stage = &self.metrics[index];

            match result {
                Ok(()) => {
                    stage.set_state(StageState::Completed);
                    tracing::debug!("Stage {index} ({}) completed", stage.name());
                }
                Err(e) if e.is_cancelled() => unwound.push(index),
                Err(e) => {
                    stage.set_state(StageState::Failed);
                    if failure.is_none() {
                        tracing::warn!("Stage {index} ({}) failed: {e}", stage.name());
                        failure = Some(Error::stage(stage.name(), index, e.to_string()));
                        self.inner.cancel();
                    }
                }
            }
        }

        let cancelled = self.caller.is_cancelled() && !unwound.is_empty();
        let clean = failure.is_none() && !cancelled;
        for index in unwound {
            // A stage whose downstream stopped reading finished its job.
            let state = if clean {
                StageState::Completed
            } else {
                StageState::Failed
            };
            self.metrics[index].set_state(state);
        }

        let report = self.report();
        if let Some(err) = failure {
            return Err(err);
        }
        if cancelled {
            tracing::info!("Pipeline cancelled");
            return Err(self.caller.cancellation_error("pipeline"));
        }
        tracing::info!("Pipeline finished ({} stage(s))", report.stages.len());
        Ok(report)
    }
}
