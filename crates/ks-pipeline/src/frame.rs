use std::time::Duration;

use bytes::Bytes;

/// One unit of media payload passed between stages.
///
/// The payload is reference-counted, so cloning a frame (for example when a
/// stage duplicates it) does not copy pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    /// Presentation time relative to the start of the stream.
    pub timestamp: Duration,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Pixel format name, e.g. `rgb24` or `yuv420p`.
    pub format: Option<String>,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, timestamp: Duration) -> Self {
        Self {
            data: data.into(),
            timestamp,
            width: None,
            height: None,
            format: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Copy of this frame re-stamped at `timestamp`.
    pub fn retimed(&self, timestamp: Duration) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}
