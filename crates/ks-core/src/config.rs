//! Configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool paths, output defaults, process lifecycle tuning and pipeline tuning.
//! Every section defaults sensibly so a completely empty `{}` file is valid.
//!
//! Facades take a `&Config` explicitly. A process-wide default can be seeded
//! once at startup with [`install`] and read back with [`current`]; it is never
//! reloaded.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub process: ProcessConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref p) = self.tools.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        if self.output.default_width == 0 || self.output.default_height == 0 {
            warnings.push("output default dimensions must be non-zero".into());
        }

        if !self.output.temp_dir.is_dir() {
            warnings.push(format!(
                "output.temp_dir {} is not a directory",
                self.output.temp_dir.display()
            ));
        }

        if self.process.grace_period.is_zero() {
            warnings.push(
                "process.grace_period_ms is 0; stop escalates to a forced kill immediately".into(),
            );
        }

        if self.pipeline.channel_capacity == 0 {
            warnings.push("pipeline.channel_capacity is 0; a capacity of 1 is used".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Process-wide default
// ---------------------------------------------------------------------------

static INSTALLED: OnceLock<Config> = OnceLock::new();

/// Seed the process-wide default configuration.
///
/// May succeed at most once, and only before the first call to [`current`].
pub fn install(config: Config) -> Result<()> {
    INSTALLED
        .set(config)
        .map_err(|_| Error::Config("a process-wide config is already installed".into()))
}

/// The process-wide default configuration, or built-in defaults if none was
/// installed.
pub fn current() -> &'static Config {
    INSTALLED.get_or_init(Config::default)
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Defaults applied to produced media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_width: u32,
    pub default_height: u32,
    pub temp_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_width: 1920,
            default_height: 1080,
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// What happens to a child process's stdout/stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioMode {
    /// Share the caller's stdout/stderr.
    #[default]
    Inherit,
    /// Discard all output.
    Discard,
}

/// External process lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// How long a process may take to exit after the interrupt signal before
    /// it is killed.
    #[serde(rename = "grace_period_ms", with = "duration_millis")]
    pub grace_period: Duration,
    pub stdio: StdioMode,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            stdio: StdioMode::Inherit,
        }
    }
}

/// Frame pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound of every stage boundary channel. Caps in-flight frame memory.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
        }
    }
}

/// Serde helpers to (de)serialize `Duration` as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
