//! Screen recording facade.
//!
//! A [`Recorder`] turns [`RecorderOptions`] plus the platform capture adapter
//! into one ffmpeg invocation and keeps the resulting [`ProcessHandle`] bound
//! to a scope derived from the caller's. Recording runs until [`Recorder::stop`]
//! is called or the caller's scope is cancelled; both paths interrupt ffmpeg
//! so it can finalize the container.
//!
//! ```no_run
//! use std::time::Duration;
//! use kurosawa::{record, Config, RecorderOptions, Scope};
//!
//! # async fn example() -> kurosawa::Result<()> {
//! // Ten seconds of screen capture.
//! let scope = Scope::with_timeout(Duration::from_secs(10));
//! let report = record(&scope, "screen.mp4", RecorderOptions::default(), &Config::default()).await?;
//! println!("recorded for {:?}", report.elapsed);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ks_av::{
    CaptureAdapter, DefaultValidator, ExitReason, ExitReport, Invocation, InvocationBuilder,
    PlatformCapture, ProcessHandle, ProcessState, ToolCommand, ToolRegistry, Validator,
};
use ks_core::config::{Config, ProcessConfig};
use ks_core::{Error, Result, Scope};
use serde::{Deserialize, Serialize};

/// Encoder quality presets for libx264.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Lossless,
}

impl Quality {
    /// Encoder options for this preset, in emission order.
    pub fn encoder_options(self) -> Vec<(&'static str, &'static str)> {
        let (preset, crf) = match self {
            Quality::Low => ("veryfast", "28"),
            Quality::Medium => ("medium", "23"),
            Quality::High => ("slow", "18"),
            Quality::Lossless => ("ultrafast", "0"),
        };
        let pix_fmt = match self {
            // yuv420p would throw away chroma.
            Quality::Lossless => "yuv444p",
            _ => "yuv420p",
        };
        vec![
            ("-c:v", "libx264"),
            ("-preset", preset),
            ("-crf", crf),
            ("-pix_fmt", pix_fmt),
        ]
    }
}

/// Size of the captured region in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureArea {
    pub width: u32,
    pub height: u32,
}

impl CaptureArea {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for CaptureArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for CaptureArea {
    type Err = Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::invalid_input(format!("capture area must be WxH, got {s:?}")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| Error::invalid_input(format!("invalid capture area {s:?}")))
        };
        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// What to record and how to encode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderOptions {
    /// Region size; the whole device when unset.
    pub area: Option<CaptureArea>,
    pub framerate: u32,
    pub quality: Quality,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            area: None,
            framerate: 30,
            quality: Quality::Medium,
        }
    }
}

impl RecorderOptions {
    pub fn with_area(mut self, area: CaptureArea) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.framerate == 0 {
            return Err(Error::invalid_input("framerate must be positive"));
        }
        if let Some(area) = self.area {
            if area.width == 0 || area.height == 0 {
                return Err(Error::invalid_input(format!("empty capture area {area}")));
            }
        }
        Ok(())
    }
}

/// A screen recording session.
pub struct Recorder {
    output: PathBuf,
    options: RecorderOptions,
    ffmpeg: PathBuf,
    process: ProcessConfig,
    capture: Box<dyn CaptureAdapter>,
    validator: Box<dyn Validator>,
    scope: Option<Scope>,
    handle: Option<ProcessHandle>,
}

impl Recorder {
    /// Create a recorder writing to `output`, resolving ffmpeg from `config`.
    pub fn new(output: impl Into<PathBuf>, options: RecorderOptions, config: &Config) -> Self {
        let registry = ToolRegistry::discover(&config.tools);
        Self {
            output: output.into(),
            options,
            ffmpeg: registry.program("ffmpeg"),
            process: config.process.clone(),
            capture: Box::new(PlatformCapture::new()),
            validator: Box::new(DefaultValidator),
            scope: None,
            handle: None,
        }
    }

    /// Builder: replace the platform capture adapter.
    pub fn with_capture_adapter(mut self, adapter: impl CaptureAdapter + 'static) -> Self {
        self.capture = Box::new(adapter);
        self
    }

    /// Builder: replace the input validator.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Builder: launch a specific ffmpeg binary.
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Assemble the ffmpeg invocation for this session.
    ///
    /// Capture options returned by the adapter come first, followed by
    /// framerate and area, all as options of the capture input. Encoder
    /// options follow the input.
    pub fn invocation(&self) -> Result<Invocation> {
        self.options.validate()?;
        self.validator.validate_output_path(&self.output)?;

        let mut device = None;
        let mut input_options = Vec::new();
        for (name, value) in self.capture.capture_args()? {
            if name == "-i" {
                device = Some(value);
            } else {
                input_options.push((name, value));
            }
        }
        let device = device.ok_or_else(|| {
            Error::invalid_input(format!(
                "capture adapter {} returned no input device",
                self.capture.name()
            ))
        })?;

        input_options.push(("-framerate".to_string(), self.options.framerate.to_string()));
        if let Some(area) = self.options.area {
            input_options.push(("-video_size".to_string(), area.to_string()));
        }

        let mut builder = InvocationBuilder::new().input_with_options(device, input_options);
        for (name, value) in self.options.quality.encoder_options() {
            builder = builder.option(name, value);
        }
        Ok(builder
            .output(self.output.to_string_lossy().to_string())
            .build())
    }

    /// Start recording under a child of `scope`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] on a second call, plus everything
    /// [`invocation`](Self::invocation) and [`ProcessHandle::start`] return.
    pub fn start(&mut self, scope: &Scope) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyStarted("recorder".to_string()));
        }
        let invocation = self.invocation()?;
        let command = ToolCommand::from_invocation(&self.ffmpeg, &invocation)?;

        let session = scope.child();
        let mut handle = ProcessHandle::from_config(command, &self.process);
        handle.start(&session)?;

        tracing::info!(
            "Recording {} at {} fps via {} to {}",
            self.options
                .area
                .map(|a| a.to_string())
                .unwrap_or_else(|| "full screen".to_string()),
            self.options.framerate,
            self.capture.name(),
            self.output.display()
        );
        self.scope = Some(session);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop recording: cancel the session scope, then run the handle's stop
    /// path.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] if the recorder was never started or ffmpeg has
    /// already exited.
    pub async fn stop(&mut self) -> Result<ExitReport> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::NotRunning("recorder was never started".to_string()))?;
        if let Some(session) = &self.scope {
            session.cancel();
        }
        let report = handle.stop().await?;
        tracing::info!("Recording stopped after {:?}", report.elapsed);
        Ok(report)
    }

    /// Wait until ffmpeg exits.
    pub async fn wait(&mut self) -> Result<ExitReport> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::NotRunning("recorder was never started".to_string()))?;
        handle.wait().await
    }

    pub fn state(&self) -> ProcessState {
        self.handle
            .as_ref()
            .map(|h| h.state())
            .unwrap_or(ProcessState::NotStarted)
    }

    pub fn is_recording(&self) -> bool {
        self.state() == ProcessState::Running
    }
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("output", &self.output)
            .field("options", &self.options)
            .field("ffmpeg", &self.ffmpeg)
            .field("capture", &self.capture.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Record the screen to `output` until `scope` is cancelled or its deadline
/// passes.
///
/// Ending through the scope is the normal way to finish and returns the
/// exit report.
///
/// # Errors
///
/// Start-up errors, and [`Error::Tool`] when ffmpeg exits on its own with a
/// failure status.
pub async fn record(
    scope: &Scope,
    output: impl Into<PathBuf>,
    options: RecorderOptions,
    config: &Config,
) -> Result<ExitReport> {
    let mut recorder = Recorder::new(output, options, config);
    recorder.start(scope)?;
    let report = recorder.wait().await?;
    if report.reason == ExitReason::Natural && !report.success() {
        return Err(Error::tool(
            "ffmpeg",
            format!(
                "recording ended with {}",
                report
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown status".to_string())
            ),
        ));
    }
    Ok(report)
}
