//! # ks-av
//!
//! External media tool plumbing for kurosawa.
//!
//! This crate provides:
//!
//! - **Argument building** ([`InvocationBuilder`]) -- ordered assembly of an
//!   ffmpeg argument vector from inputs, options, filters and outputs.
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- short scoped runs with
//!   captured output.
//! - **Process lifecycle** ([`ProcessHandle`]) -- long-running processes bound
//!   to a [`ks_core::Scope`], with interrupt-then-kill shutdown.
//! - **Progress** ([`ProgressParser`], [`ProgressSender`]) -- parsing of
//!   ffmpeg's `-progress` output.
//! - **Capture and validation** ([`CaptureAdapter`], [`Validator`]) -- the
//!   platform capture source and pre-flight input checks.
//! - **Probing** ([`FfprobeProber`]) -- duration and geometry via ffprobe.

pub mod capture;
pub mod command;
pub mod invocation;
pub mod probe;
pub mod process;
pub mod progress;
pub mod tools;
pub mod validate;

pub use capture::{platform_capture_args, CaptureAdapter, PlatformCapture};
pub use command::{ToolCommand, ToolOutput};
pub use invocation::{Input, Invocation, InvocationBuilder};
pub use probe::{FfprobeProber, MediaInfo};
pub use process::{ExitReason, ExitReport, ProcessHandle, ProcessState, DEFAULT_GRACE_PERIOD};
pub use progress::{Progress, ProgressParser, ProgressSender, PROGRESS_FLAGS};
pub use tools::{ToolRegistry, KNOWN_TOOLS};
pub use validate::{DefaultValidator, Validator};
