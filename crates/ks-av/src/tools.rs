//! Locating ffmpeg and ffprobe.
//!
//! A configured path wins when it exists; otherwise the tool is looked up on
//! `PATH`. Anything still missing resolves to its bare name so the failure
//! shows up as a spawn error at launch rather than at construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ks_core::config::ToolsConfig;

/// Tools the registry resolves.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Resolved executable paths, keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    resolved: HashMap<&'static str, PathBuf>,
}

impl ToolRegistry {
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut resolved = HashMap::new();

        for &name in KNOWN_TOOLS {
            let configured = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let path = match configured {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match path {
                Some(path) => {
                    tracing::debug!("Resolved {name} to {}", path.display());
                    resolved.insert(name, path);
                }
                None => tracing::debug!("{name} not found on PATH"),
            }
        }

        Self { resolved }
    }

    /// Path found during discovery, if any.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.resolved.get(name).map(PathBuf::as_path)
    }

    /// The executable to launch for `name`, falling back to the bare name.
    pub fn program(&self, name: &str) -> PathBuf {
        self.get(name)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
