//! ffmpeg progress reporting.
//!
//! With `-progress pipe:2 -nostats`, ffmpeg writes blocks of `key=value`
//! lines to stderr, each block terminated by `progress=continue` or
//! `progress=end`. [`ProgressParser`] turns those lines into [`Progress`]
//! snapshots and [`ProgressSender`] delivers them to the caller.

use std::time::{Duration, Instant};

/// Global flags that make ffmpeg emit machine-readable progress on stderr.
pub const PROGRESS_FLAGS: [&str; 4] = ["-progress", "pipe:2", "-nostats", "-hide_banner"];

/// A progress snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    /// 0.0 -- 100.0; stays 0 when the total duration is unknown.
    pub percent: f64,
    /// Current processing stage (e.g. "encoding").
    pub stage: String,
    /// Wall-clock time since the parser was created.
    pub elapsed: Duration,
    /// Estimated wall-clock time left, once a percentage is known.
    pub remaining: Option<Duration>,
    /// Media time processed so far.
    pub out_time: Duration,
    pub frame: Option<u64>,
    pub fps: Option<f64>,
    pub speed: Option<String>,
    /// Set on the final `progress=end` block.
    pub finished: bool,
}

/// Incremental parser for ffmpeg's `-progress` output.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total: Option<Duration>,
    stage: String,
    started: Instant,
    out_time_us: Option<i64>,
    frame: Option<u64>,
    fps: Option<f64>,
    speed: Option<String>,
}

impl ProgressParser {
    /// Create a parser. `total` is the expected output duration used to
    /// compute percentages.
    pub fn new(total: Option<Duration>) -> Self {
        Self {
            total,
            stage: "encoding".to_string(),
            started: Instant::now(),
            out_time_us: None,
            frame: None,
            fps: None,
            speed: None,
        }
    }

    /// Builder: set the stage label attached to every snapshot.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// Feed one line; returns a snapshot when the line closes a block.
    pub fn feed_line(&mut self, line: &str) -> Option<Progress> {
        let line = line.trim();
        let (key, value) = line.split_once('=')?;
        let value = value.trim();

        match key {
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds.
                self.out_time_us = value.parse::<i64>().ok();
            }
            "frame" => self.frame = value.parse::<u64>().ok(),
            "fps" => self.fps = value.parse::<f64>().ok(),
            "speed" => {
                if value != "N/A" {
                    self.speed = Some(value.to_string());
                }
            }
            "progress" => return Some(self.snapshot(value == "end")),
            _ => {}
        }
        None
    }

    fn snapshot(&self, finished: bool) -> Progress {
        let out_time = self
            .out_time_us
            .filter(|us| *us > 0)
            .map(|us| Duration::from_micros(us as u64))
            .unwrap_or_default();

        let percent = match self.total {
            _ if finished => 100.0,
            Some(total) if !total.is_zero() => {
                (out_time.as_secs_f64() / total.as_secs_f64() * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        };

        let elapsed = self.started.elapsed();
        let remaining = if finished {
            Some(Duration::ZERO)
        } else if percent > 0.0 {
            Some(elapsed.mul_f64((100.0 - percent) / percent))
        } else {
            None
        };

        Progress {
            percent,
            stage: self.stage.clone(),
            elapsed,
            remaining,
            out_time,
            frame: self.frame,
            fps: self.fps,
            speed: self.speed.clone(),
            finished,
        }
    }
}

/// Sender for reporting progress.
///
/// Wraps a callback that receives each [`Progress`] snapshot.
pub struct ProgressSender {
    callback: Box<dyn Fn(&Progress) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: &Progress) {
        (self.callback)(progress);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn block(out_time_us: i64, status: &str) -> Vec<String> {
        vec![
            "frame=120".to_string(),
            "fps=59.94".to_string(),
            format!("out_time_us={out_time_us}"),
            "speed=2.01x".to_string(),
            format!("progress={status}"),
        ]
    }

    #[test]
    fn emits_snapshot_per_block() {
        let mut parser = ProgressParser::new(Some(Duration::from_secs(10)));
        let mut snapshots = Vec::new();
        for line in block(2_500_000, "continue") {
            if let Some(p) = parser.feed_line(&line) {
                snapshots.push(p);
            }
        }
        assert_eq!(snapshots.len(), 1);
        let p = &snapshots[0];
        assert!((p.percent - 25.0).abs() < 1e-9);
        assert_eq!(p.frame, Some(120));
        assert_eq!(p.fps, Some(59.94));
        assert_eq!(p.speed.as_deref(), Some("2.01x"));
        assert_eq!(p.out_time, Duration::from_millis(2500));
        assert!(p.remaining.is_some());
        assert!(!p.finished);
        assert_eq!(p.stage, "encoding");
    }

    #[test]
    fn end_block_is_complete() {
        let mut parser = ProgressParser::new(None).with_stage("trimming");
        let last = block(1_000, "end")
            .iter()
            .filter_map(|l| parser.feed_line(l))
            .last()
            .unwrap();
        assert!(last.finished);
        assert_eq!(last.percent, 100.0);
        assert_eq!(last.remaining, Some(Duration::ZERO));
        assert_eq!(last.stage, "trimming");
    }

    #[test]
    fn unknown_total_reports_zero_percent() {
        let mut parser = ProgressParser::new(None);
        let p = block(5_000_000, "continue")
            .iter()
            .filter_map(|l| parser.feed_line(l))
            .last()
            .unwrap();
        assert_eq!(p.percent, 0.0);
        assert!(p.remaining.is_none());
    }

    #[test]
    fn percent_is_clamped() {
        let mut parser = ProgressParser::new(Some(Duration::from_secs(1)));
        let p = block(9_000_000, "continue")
            .iter()
            .filter_map(|l| parser.feed_line(l))
            .last()
            .unwrap();
        assert_eq!(p.percent, 100.0);
    }

    #[test]
    fn ignores_noise_and_na_values() {
        let mut parser = ProgressParser::new(Some(Duration::from_secs(4)));
        assert!(parser.feed_line("Input #0, mov,mp4 from 'in.mp4':").is_none());
        assert!(parser.feed_line("speed=N/A").is_none());
        assert!(parser.feed_line("out_time_us=N/A").is_none());
        let p = parser.feed_line("progress=continue").unwrap();
        assert_eq!(p.speed, None);
        assert_eq!(p.out_time, Duration::ZERO);
    }

    #[test]
    fn sender_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sender = ProgressSender::new(move |p| seen_clone.lock().unwrap().push(p.percent));
        sender.send(&Progress {
            percent: 42.0,
            ..Default::default()
        });
        ProgressSender::noop().send(&Progress::default());
        assert_eq!(*seen.lock().unwrap(), vec![42.0]);
    }
}
