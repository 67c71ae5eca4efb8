//! Video effects.
//!
//! An [`Effect`] renders itself into one ffmpeg filter expression for a given
//! clip. Effects are an open set: implement the trait to add new ones.

use std::fmt;
use std::time::Duration;

use ks_core::{Error, Result};

use super::clip::Clip;

/// A filter applied to a clip.
pub trait Effect: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Filter expression for `clip`, e.g. `scale=1280:720`. Times are
    /// relative to the start of the clip.
    fn apply(&self, clip: &Clip) -> String;

    fn validate(&self) -> Result<()>;
}

/// Resize to a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub width: u32,
    pub height: u32,
}

impl Scale {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Effect for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn apply(&self, _clip: &Clip) -> String {
        format!("scale={}:{}", self.width, self.height)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_input(format!(
                "scale to {}x{} is empty",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Cut a rectangle out of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl Crop {
    pub fn new(width: u32, height: u32, x: u32, y: u32) -> Self {
        Self { width, height, x, y }
    }
}

impl Effect for Crop {
    fn name(&self) -> &str {
        "crop"
    }

    fn apply(&self, _clip: &Clip) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_input("crop area is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

/// Fade from or to black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fade {
    pub kind: FadeKind,
    pub duration: Duration,
}

impl Fade {
    pub fn fade_in(duration: Duration) -> Self {
        Self {
            kind: FadeKind::In,
            duration,
        }
    }

    pub fn fade_out(duration: Duration) -> Self {
        Self {
            kind: FadeKind::Out,
            duration,
        }
    }
}

impl Effect for Fade {
    fn name(&self) -> &str {
        match self.kind {
            FadeKind::In => "fade-in",
            FadeKind::Out => "fade-out",
        }
    }

    fn apply(&self, clip: &Clip) -> String {
        let d = self.duration.as_secs_f64();
        match self.kind {
            FadeKind::In => format!("fade=t=in:st=0:d={d:.3}"),
            FadeKind::Out => {
                let start = clip.duration().saturating_sub(self.duration);
                format!("fade=t=out:st={:.3}:d={d:.3}", start.as_secs_f64())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(Error::invalid_input("fade duration must be positive"));
        }
        Ok(())
    }
}

/// Change playback speed; 2.0 plays twice as fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed {
    pub factor: f64,
}

impl Speed {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl Effect for Speed {
    fn name(&self) -> &str {
        "speed"
    }

    fn apply(&self, _clip: &Clip) -> String {
        format!("setpts=PTS/{}", self.factor)
    }

    fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(Error::invalid_input(format!(
                "invalid speed factor {}",
                self.factor
            )));
        }
        Ok(())
    }
}

/// Brightness adjustment in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brightness {
    pub level: f64,
}

impl Brightness {
    pub fn new(level: f64) -> Self {
        Self { level }
    }
}

impl Effect for Brightness {
    fn name(&self) -> &str {
        "brightness"
    }

    fn apply(&self, _clip: &Clip) -> String {
        format!("eq=brightness={:.2}", self.level)
    }

    fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.level) {
            return Err(Error::invalid_input(format!(
                "brightness {} outside -1.0..=1.0",
                self.level
            )));
        }
        Ok(())
    }
}
