//! Screen capture sources.
//!
//! A [`CaptureAdapter`] contributes the input-side ffmpeg options for one
//! capture backend. [`PlatformCapture`] picks the backend for the OS the
//! crate was built for: `x11grab` on Linux, `avfoundation` on macOS and
//! `gdigrab` on Windows.

use ks_core::{Error, Result};

/// Input-side capture options for one backend.
pub trait CaptureAdapter: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &str;

    /// Option pairs describing the capture input, including the `-i` pair
    /// that names the device.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedPlatform`] when the backend cannot capture here.
    fn capture_args(&self) -> Result<Vec<(String, String)>>;
}

/// The capture backend native to the build target.
#[derive(Debug, Clone, Default)]
pub struct PlatformCapture {
    device: Option<String>,
}

impl PlatformCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the capture device (X display, avfoundation index, gdigrab
    /// target).
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    fn format(&self) -> Option<&'static str> {
        if cfg!(target_os = "linux") {
            Some("x11grab")
        } else if cfg!(target_os = "macos") {
            Some("avfoundation")
        } else if cfg!(target_os = "windows") {
            Some("gdigrab")
        } else {
            None
        }
    }

    fn default_device(&self) -> String {
        if cfg!(target_os = "linux") {
            std::env::var("DISPLAY")
                .ok()
                .filter(|d| !d.is_empty())
                .map(|d| if d.contains('.') { d } else { format!("{d}.0") })
                .unwrap_or_else(|| ":0.0".to_string())
        } else if cfg!(target_os = "macos") {
            "1".to_string()
        } else {
            "desktop".to_string()
        }
    }
}

impl CaptureAdapter for PlatformCapture {
    fn name(&self) -> &str {
        self.format().unwrap_or("unsupported")
    }

    fn capture_args(&self) -> Result<Vec<(String, String)>> {
        let format = self.format().ok_or_else(|| {
            Error::UnsupportedPlatform(format!(
                "screen capture is not available on {}",
                std::env::consts::OS
            ))
        })?;
        let device = self.device.clone().unwrap_or_else(|| self.default_device());
        Ok(vec![
            ("-f".to_string(), format.to_string()),
            ("-i".to_string(), device),
        ])
    }
}

/// Capture options for the current platform's default device.
pub fn platform_capture_args() -> Result<Vec<(String, String)>> {
    PlatformCapture::new().capture_args()
}
