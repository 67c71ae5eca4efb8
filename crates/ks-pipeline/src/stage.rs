//! The [`Stage`] trait defines one concurrent step of a frame pipeline.
//!
//! A stage owns both ends it is handed: it reads from `input` until
//! end-of-stream, writes whatever it produces to `output`, and returns. The
//! output channel closes when the stage drops it, which is how end-of-stream
//! propagates downstream. Cancellation surfaces as an [`ks_core::Error`] from
//! `recv`/`send` and should simply be propagated with `?`.

use async_trait::async_trait;
use ks_core::Result;

use crate::channel::{FrameReceiver, FrameSender};

/// A single frame-transformation step.
///
/// Stages keep frame order unless they document otherwise.
#[async_trait]
pub trait Stage: Send + 'static {
    /// A short, human-readable name (e.g. "scale"), used in errors and metrics.
    fn name(&self) -> &str;

    /// Consume `input` and produce into `output` until end-of-stream.
    ///
    /// Returning an error fails the whole pipeline; the other stages are
    /// cancelled and the error is reported with this stage's name and
    /// position.
    async fn process(&mut self, input: FrameReceiver, output: FrameSender) -> Result<()>;
}
