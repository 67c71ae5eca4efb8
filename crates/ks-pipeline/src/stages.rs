//! Built-in stages.

use std::time::Duration;

use async_trait::async_trait;
use ks_core::{Error, Result};

use crate::channel::{FrameReceiver, FrameSender};
use crate::frame::Frame;
use crate::stage::Stage;

/// Forwards every frame unchanged.
#[derive(Debug, Clone)]
pub struct PassThrough {
    name: String,
}

impl PassThrough {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new("pass-through")
    }
}

#[async_trait]
impl Stage for PassThrough {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        while let Some(frame) = input.recv().await? {
            output.send(frame).await?;
        }
        Ok(())
    }
}

/// Applies a fallible one-to-one transform to each frame.
pub struct MapStage<F> {
    name: String,
    transform: F,
}

impl<F> MapStage<F>
where
    F: FnMut(Frame) -> Result<Frame> + Send + 'static,
{
    pub fn new(name: impl Into<String>, transform: F) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

#[async_trait]
impl<F> Stage for MapStage<F>
where
    F: FnMut(Frame) -> Result<Frame> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        while let Some(frame) = input.recv().await? {
            let mapped = (self.transform)(frame)?;
            output.send(mapped).await?;
        }
        Ok(())
    }
}

/// Drops frames for which the predicate returns `false`.
pub struct FilterStage<P> {
    name: String,
    predicate: P,
}

impl<P> FilterStage<P>
where
    P: FnMut(&Frame) -> bool + Send + 'static,
{
    pub fn new(name: impl Into<String>, predicate: P) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<P> Stage for FilterStage<P>
where
    P: FnMut(&Frame) -> bool + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        while let Some(frame) = input.recv().await? {
            if (self.predicate)(&frame) {
                output.send(frame).await?;
            }
        }
        Ok(())
    }
}

/// Resamples a stream to a constant frame rate.
///
/// Output slots sit at `first_timestamp + k / fps`. Each slot is filled with
/// the latest input frame at or before it, so frames are dropped when the
/// input is faster than the target and repeated when it is slower. Emitted
/// frames carry their slot time as timestamp.
#[derive(Debug, Clone)]
pub struct FrameRateStage {
    name: String,
    fps: f64,
}

impl FrameRateStage {
    /// # Errors
    ///
    /// [`Error::InvalidInput`] unless `fps` is finite and positive.
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(Error::invalid_input(format!("invalid target frame rate: {fps}")));
        }
        Ok(Self {
            name: "frame-rate".to_string(),
            fps,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn slot(&self, start: Duration, k: u64) -> Duration {
        start + Duration::from_nanos((k as f64 * 1e9 / self.fps).round() as u64)
    }
}

#[async_trait]
impl Stage for FrameRateStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&mut self, mut input: FrameReceiver, output: FrameSender) -> Result<()> {
        let mut held: Option<Frame> = None;
        let mut start = Duration::ZERO;
        let mut k = 0u64;

        while let Some(frame) = input.recv().await? {
            if let Some(last) = held.as_ref() {
                let mut slot = self.slot(start, k);
                while slot < frame.timestamp {
                    output.send(last.retimed(slot)).await?;
                    k += 1;
                    slot = self.slot(start, k);
                }
            } else {
                start = frame.timestamp;
            }
            held = Some(frame);
        }

        if let Some(last) = held {
            let mut slot = self.slot(start, k);
            while slot <= last.timestamp {
                output.send(last.retimed(slot)).await?;
                k += 1;
                slot = self.slot(start, k);
            }
        }
        Ok(())
    }
}
