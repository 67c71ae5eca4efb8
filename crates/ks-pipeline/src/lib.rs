//! # ks-pipeline
//!
//! Concurrent staged frame processing.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Starting it spawns one
//! tokio task per stage and connects neighbours with bounded
//! [`frame_channel`]s, so backpressure flows upstream on its own. Every channel
//! operation selects on the pipeline's [`ks_core::Scope`]; the first stage to
//! fail cancels the rest and is reported as
//! [`ks_core::Error::StageFailure`].

pub mod channel;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod stage;
pub mod stages;

pub use channel::{frame_channel, FrameReceiver, FrameSender};
pub use frame::Frame;
pub use metrics::{PipelineReport, StageMetrics, StageReport, StageState};
pub use pipeline::{Pipeline, PipelineRun, DEFAULT_CHANNEL_CAPACITY};
pub use stage::Stage;
pub use stages::{FilterStage, FrameRateStage, MapStage, PassThrough};
