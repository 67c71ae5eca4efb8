//! Media sources and clips.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ks_av::FfprobeProber;
use ks_core::{Error, Result, Scope};

use super::effect::Effect;

/// Kind of media a source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    /// A still image, looped for the clip's duration.
    Image,
    /// A UTF-8 text file rendered with `drawtext`.
    Text,
}

/// Something a clip can be cut from.
pub trait MediaSource: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    /// Total length, when known.
    fn duration(&self) -> Option<Duration>;

    fn media_type(&self) -> MediaType;
}

/// A media file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    duration: Option<Duration>,
    media_type: MediaType,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, media_type: MediaType) -> Self {
        Self {
            path: path.into(),
            duration: None,
            media_type,
        }
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self::new(path, MediaType::Video)
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::new(path, MediaType::Image)
    }

    pub fn text(path: impl Into<PathBuf>) -> Self {
        Self::new(path, MediaType::Text)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Inspect `path` with ffprobe. Files without a usable duration are
    /// treated as images.
    pub async fn probe(
        scope: &Scope,
        prober: &FfprobeProber,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let path = path.into();
        let info = prober.probe(scope, &path).await?;
        if !info.has_video {
            return Err(Error::invalid_input(format!(
                "{} has no video stream",
                path.display()
            )));
        }
        let media_type = match info.duration {
            Some(d) if !d.is_zero() => MediaType::Video,
            _ => MediaType::Image,
        };
        Ok(Self {
            path,
            duration: info.duration.filter(|_| media_type == MediaType::Video),
            media_type,
        })
    }
}

impl MediaSource for MediaFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn media_type(&self) -> MediaType {
        self.media_type
    }
}

/// Top-left corner of a clip on the canvas, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A window of a media source placed on the canvas.
///
/// Sources are shared between clips; effects belong to the clip.
#[derive(Debug)]
pub struct Clip {
    source: Arc<dyn MediaSource>,
    start: Duration,
    duration: Duration,
    position: Position,
    effects: Vec<Box<dyn Effect>>,
}

impl Clip {
    /// `start` is the offset into the source, `duration` the clip length.
    pub fn new(
        source: Arc<dyn MediaSource>,
        start: Duration,
        duration: Duration,
        position: Position,
    ) -> Self {
        Self {
            source,
            start,
            duration,
            position,
            effects: Vec::new(),
        }
    }

    pub fn source(&self) -> &dyn MediaSource {
        self.source.as_ref()
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Offset into the source where the clip ends.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    pub fn add_effect(&mut self, effect: impl Effect + 'static) {
        self.effects.push(Box::new(effect));
    }

    /// Builder form of [`add_effect`](Self::add_effect).
    pub fn with_effect(mut self, effect: impl Effect + 'static) -> Self {
        self.add_effect(effect);
        self
    }

    /// The clip's effects rendered in order and joined into one chain.
    pub fn filter_chain(&self) -> Option<String> {
        let parts: Vec<String> = self
            .effects
            .iter()
            .map(|e| e.apply(self))
            .filter(|f| !f.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(","))
    }

    /// Check the window against the source and validate every effect.
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(Error::invalid_input(format!(
                "clip of {} has zero duration",
                self.source.path().display()
            )));
        }
        if let Some(total) = self.source.duration() {
            if self.end() > total {
                return Err(Error::invalid_input(format!(
                    "clip window {:.3}s..{:.3}s exceeds {} ({:.3}s)",
                    self.start.as_secs_f64(),
                    self.end().as_secs_f64(),
                    self.source.path().display(),
                    total.as_secs_f64()
                )));
            }
        }
        for effect in &self.effects {
            effect.validate()?;
        }
        Ok(())
    }
}
