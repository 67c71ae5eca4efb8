//! Bounded, scope-aware frame channels.
//!
//! Both ends wrap a `tokio::sync::mpsc` channel and select on the pipeline's
//! [`Scope`] at every suspension point, so a cancelled pipeline never leaves a
//! stage parked on a full or empty channel. Dropping the sender closes the
//! channel, which the receiver observes as end-of-stream (`Ok(None)`).

use std::sync::Arc;

use ks_core::{Error, Result, Scope};
use tokio::sync::mpsc;

use crate::frame::Frame;
use crate::metrics::StageMetrics;

/// Create a bounded frame channel bound to `scope`.
///
/// A capacity of zero is raised to one.
pub fn frame_channel(capacity: usize, scope: &Scope) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FrameSender {
            tx,
            scope: scope.clone(),
            metrics: None,
        },
        FrameReceiver {
            rx,
            scope: scope.clone(),
            metrics: None,
        },
    )
}

/// Writing end of a frame channel.
#[derive(Debug)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
    scope: Scope,
    metrics: Option<Arc<StageMetrics>>,
}

impl FrameSender {
    pub(crate) fn counted_by(mut self, metrics: Arc<StageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Send a frame, waiting for capacity.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if the scope is cancelled while waiting or the
    /// receiving side has gone away.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.scope
            .run("frame send", self.tx.send(frame))
            .await?
            .map_err(|_| Error::cancelled("frame send: downstream closed"))?;
        if let Some(m) = &self.metrics {
            m.record_out();
        }
        Ok(())
    }

    /// Whether the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// The pipeline scope. Stages that wait on anything other than their
    /// channels should bind those waits to it.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// Reading end of a frame channel.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Frame>,
    scope: Scope,
    metrics: Option<Arc<StageMetrics>>,
}

impl FrameReceiver {
    pub(crate) fn counted_by(mut self, metrics: Arc<StageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive the next frame; `Ok(None)` marks end-of-stream.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if the scope is cancelled, even when frames are
    /// still buffered.
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        let frame = self.scope.run("frame receive", self.rx.recv()).await?;
        if frame.is_some() {
            if let Some(m) = &self.metrics {
                m.record_in();
            }
        }
        Ok(frame)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Receive every remaining frame until end-of-stream.
    pub async fn collect(mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await? {
            frames.push(frame);
        }
        Ok(frames)
    }
}
