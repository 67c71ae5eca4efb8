//! Media inspection through the `ffprobe` CLI.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and keeps the handful of fields the editor needs: the
//! container duration and the first video stream's geometry and rate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ks_core::{Error, Result, Scope};
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Summary of a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frames per second of the first video stream.
    pub frame_rate: Option<f64>,
    /// Container format name as reported by ffprobe (e.g. `mov,mp4,m4a`).
    pub format: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Create a prober using the registry's ffprobe, or the bare name.
    pub fn from_registry(registry: &ToolRegistry) -> Self {
        Self::new(registry.program("ffprobe"))
    }

    /// Probe `path`.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`]/[`Error::Tool`] when ffprobe cannot run or fails,
    /// [`Error::Probe`] when its output cannot be parsed, and
    /// [`Error::Cancelled`] when `scope` ends first.
    pub async fn probe(&self, scope: &Scope, path: &Path) -> Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute(scope).await?;
        parse_ffprobe_json(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

fn parse_ffprobe_json(json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let format_duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);
    let stream_duration = video.and_then(|v| v.duration.as_deref()).and_then(parse_seconds);

    Ok(MediaInfo {
        duration: format_duration.or(stream_duration),
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        frame_rate: video
            .and_then(|v| v.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
        format: output.format.and_then(|f| f.format_name),
        has_video: video.is_some(),
        has_audio,
    })
}

fn parse_seconds(s: &str) -> Option<Duration> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Duration::from_secs_f64)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    rate_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264",
             "width": 1920, "height": 1080, "r_frame_rate": "30000/1001",
             "duration": "12.000000"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "12.512000"}
    }"#;

    #[test]
    fn parses_sample_output() {
        let info = parse_ffprobe_json(SAMPLE).unwrap();
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.height, Some(1080));
        assert!((info.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.duration, Some(Duration::from_millis(12_512)));
        assert_eq!(info.format.as_deref(), Some("mov,mp4,m4a,3gp,3g2,mj2"));
        assert!(info.has_video);
        assert!(info.has_audio);
    }

    #[test]
    fn falls_back_to_stream_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "duration": "4.5"}]}"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, Some(Duration::from_millis(4500)));
        assert!(!info.has_audio);
    }

    #[test]
    fn audio_only_file() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "N/A"}}"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert!(!info.has_video);
        assert_eq!(info.width, None);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn invalid_json_is_probe_error() {
        assert!(matches!(parse_ffprobe_json("not json"), Err(Error::Probe(_))));
    }

    #[test]
    fn frame_rate_fraction() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
    }

    #[tokio::test]
    async fn missing_ffprobe_is_spawn_error() {
        let prober = FfprobeProber::new("nonexistent_ffprobe_xyz");
        let err = prober
            .probe(&Scope::new(), Path::new("in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }), "got: {err}");
    }
}
