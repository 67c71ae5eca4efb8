//! Multi-clip composition.
//!
//! A [`Film`] places clips one after another on a fixed-size black canvas.
//! [`film_invocation`] renders the whole film as one ffmpeg run:
//!
//! - input 0 is a `lavfi` colour source covering the full running time,
//! - every video or image clip becomes a trimmed input whose effects are
//!   applied before it is shifted to its slot and overlaid at its position,
//! - text clips are drawn with `drawtext` on top of the composed stream.

use std::path::Path;
use std::time::Duration;

use ks_av::{ExitReport, Invocation, InvocationBuilder, ProcessHandle, ToolCommand, ToolRegistry};
use ks_core::config::{Config, OutputConfig};
use ks_core::{Error, Result, Scope};

use super::clip::{Clip, MediaSource, MediaType};

/// Clips laid out on a timeline.
#[derive(Debug)]
pub struct Film {
    clips: Vec<Clip>,
    width: u32,
    height: u32,
    duration: Duration,
}

impl Film {
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total running time.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Each clip with the film time at which it starts.
    pub fn timeline(&self) -> impl Iterator<Item = (Duration, &Clip)> {
        self.clips.iter().scan(Duration::ZERO, |offset, clip| {
            let at = *offset;
            *offset += clip.duration();
            Some((at, clip))
        })
    }
}

/// Builder for a [`Film`].
#[derive(Debug)]
pub struct FilmBuilder {
    clips: Vec<Clip>,
    width: u32,
    height: u32,
}

impl FilmBuilder {
    /// Start a film with a `width`×`height` canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            clips: Vec::new(),
            width,
            height,
        }
    }

    /// Start a film using the configured default canvas size.
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.default_width, config.default_height)
    }

    /// Append a clip after the ones already added.
    pub fn add_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }

    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty canvas, a film without clips, or
    /// any clip that fails [`Clip::validate`].
    pub fn build(self) -> Result<Film> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_input(format!(
                "film canvas {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.clips.is_empty() {
            return Err(Error::invalid_input("film has no clips"));
        }
        for clip in &self.clips {
            clip.validate()?;
        }
        let duration = self.clips.iter().map(Clip::duration).sum();
        Ok(Film {
            clips: self.clips,
            width: self.width,
            height: self.height,
            duration,
        })
    }
}

fn secs(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// `enable` expression limiting a filter to `[from, to]` film time.
fn between(from: Duration, to: Duration) -> String {
    format!("enable='between(t,{},{})'", secs(from), secs(to))
}

/// Escape a path for use inside a single-quoted filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

/// Render `film` into one ffmpeg invocation writing `output`.
pub fn film_invocation(film: &Film, output: &Path) -> Invocation {
    let mut builder = InvocationBuilder::new().input_with_options(
        format!(
            "color=c=black:s={}x{}:d={}",
            film.width,
            film.height,
            secs(film.duration)
        ),
        [("-f", "lavfi")],
    );

    let mut graph = Vec::new();
    let mut texts = Vec::new();
    let mut current = "0:v".to_string();
    let mut input_index = 0usize;

    for (n, (offset, clip)) in film.timeline().enumerate() {
        let source = clip.source();
        let until = offset + clip.duration();

        match source.media_type() {
            MediaType::Text => {
                let pos = clip.position();
                let filter = format!(
                    "drawtext=textfile='{}':x={}:y={}:fontsize=48:fontcolor=white:{}",
                    escape_filter_path(source.path()),
                    pos.x,
                    pos.y,
                    between(offset, until)
                );
                if let Some(chain) = clip.filter_chain() {
                    tracing::debug!("Effects on text clip {n} are ignored: {chain}");
                }
                texts.push(filter);
                continue;
            }
            MediaType::Video => {
                builder = builder.input_with_options(
                    source.path().to_string_lossy().to_string(),
                    [("-ss", secs(clip.start())), ("-t", secs(clip.duration()))],
                );
            }
            MediaType::Image => {
                builder = builder.input_with_options(
                    source.path().to_string_lossy().to_string(),
                    [("-loop", "1".to_string()), ("-t", secs(clip.duration()))],
                );
            }
        }
        input_index += 1;

        let mut chain = clip.filter_chain().unwrap_or_default();
        if !chain.is_empty() {
            chain.push(',');
        }
        graph.push(format!(
            "[{input_index}:v]{chain}setpts=PTS-STARTPTS+{}/TB[c{n}]",
            secs(offset)
        ));

        let pos = clip.position();
        graph.push(format!(
            "[{current}][c{n}]overlay=x={}:y={}:{}[o{n}]",
            pos.x,
            pos.y,
            between(offset, until)
        ));
        current = format!("o{n}");
    }

    if texts.is_empty() {
        graph.push(format!("[{current}]null[out]"));
    } else {
        graph.push(format!("[{current}]{}[out]", texts.join(",")));
    }

    builder
        .filter_complex(graph.join(";"))
        .option("-map", "[out]")
        .option("-c:v", "libx264")
        .option("-pix_fmt", "yuv420p")
        .flag("-an")
        .output(output.to_string_lossy().to_string())
        .build()
}

/// Render `film` to `output` and wait for ffmpeg to finish.
pub async fn write_film(
    scope: &Scope,
    film: &Film,
    output: impl AsRef<Path>,
    config: &Config,
) -> Result<ExitReport> {
    let output = output.as_ref();
    let invocation = film_invocation(film, output);
    let ffmpeg = ToolRegistry::discover(&config.tools).program("ffmpeg");
    let command = ToolCommand::from_invocation(ffmpeg, &invocation)?;

    tracing::info!(
        "Writing film of {} clip(s), {:?}, to {}",
        film.clips.len(),
        film.duration,
        output.display()
    );
    ProcessHandle::from_config(command, &config.process)
        .run(scope)
        .await
}
