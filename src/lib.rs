//! kurosawa: screen recording and video editing on top of ffmpeg.
//!
//! The heavy lifting lives in the workspace crates:
//!
//! - `ks-core`: errors, configuration, cancellation [`Scope`]s
//! - `ks-av`: argument building, tool discovery and the [`ProcessHandle`]
//! - `ks-pipeline`: the staged frame [`Pipeline`]
//!
//! This crate adds the facades that tie them together: [`Recorder`] and
//! [`record`] for capture, [`Editor`] for single-file edits and
//! [`editor::film`] for multi-clip composition.

pub mod editor;
pub mod logging;
pub mod recorder;

pub use ks_core::config::{self, Config};
pub use ks_core::{Error, Result, Scope};

pub use ks_av::{
    CaptureAdapter, DefaultValidator, ExitReason, ExitReport, FfprobeProber, Invocation,
    InvocationBuilder, MediaInfo, PlatformCapture, ProcessHandle, ProcessState, Progress,
    ProgressSender, ToolCommand, Validator,
};
pub use ks_pipeline::{
    Frame, FrameReceiver, FrameSender, Pipeline, PipelineReport, PipelineRun, Stage, StageState,
};

pub use editor::clip::{Clip, MediaFile, MediaSource, MediaType, Position};
pub use editor::effect::{Brightness, Crop, Effect, Fade, FadeKind, Scale, Speed};
pub use editor::film::{film_invocation, write_film, Film, FilmBuilder};
pub use editor::Editor;
pub use recorder::{record, CaptureArea, Quality, Recorder, RecorderOptions};
