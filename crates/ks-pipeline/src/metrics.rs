//! Per-stage state and counters, readable while the pipeline runs.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle of one stage: `Idle → Running → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl StageState {
    fn to_u8(self) -> u8 {
        match self {
            StageState::Idle => 0,
            StageState::Running => 1,
            StageState::Completed => 2,
            StageState::Failed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => StageState::Running,
            2 => StageState::Completed,
            3 => StageState::Failed,
            _ => StageState::Idle,
        }
    }
}

/// Live metrics for one stage, shared between the stage's channels and the
/// pipeline.
#[derive(Debug)]
pub struct StageMetrics {
    name: String,
    index: usize,
    state: AtomicU8,
    frames_in: AtomicU64,
    frames_out: AtomicU64,
}

impl StageMetrics {
    pub(crate) fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            state: AtomicU8::new(StageState::Idle.to_u8()),
            frames_in: AtomicU64::new(0),
            frames_out: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: StageState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub(crate) fn record_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of these metrics.
    pub fn snapshot(&self) -> StageReport {
        StageReport {
            name: self.name.clone(),
            index: self.index,
            state: self.state(),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: String,
    pub index: usize,
    pub state: StageState,
    /// Frames the stage received from its input channel.
    pub frames_in: u64,
    /// Frames the stage wrote to its output channel.
    pub frames_out: u64,
}

/// Snapshot of every stage in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Look up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Whether every stage completed.
    pub fn all_completed(&self) -> bool {
        self.stages.iter().all(|s| s.state == StageState::Completed)
    }
}
