//! Video editing facade.
//!
//! An [`Editor`] takes one input file, an optional trim window and any number
//! of [`Effect`]s, and renders them into a single ffmpeg run. Effects are
//! applied in the order they were added, chained into one filter expression.
//!
//! Multi-clip composition lives in [`film`].

pub mod clip;
pub mod effect;
pub mod film;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ks_av::{
    DefaultValidator, ExitReport, FfprobeProber, Invocation, InvocationBuilder, ProcessHandle,
    ProgressSender, ToolCommand, ToolRegistry, Validator, PROGRESS_FLAGS,
};
use ks_core::config::{Config, ProcessConfig};
use ks_core::{Error, Result, Scope};

use self::clip::{Clip, MediaFile, Position};
use self::effect::{Effect, Scale};

/// A single-input edit.
pub struct Editor {
    input: PathBuf,
    output: Option<PathBuf>,
    trim: Option<(Duration, Duration)>,
    effects: Vec<Box<dyn Effect>>,
    progress: Option<ProgressSender>,
    ffmpeg: PathBuf,
    prober: FfprobeProber,
    process: ProcessConfig,
    validator: Box<dyn Validator>,
}

impl Editor {
    pub fn new(input: impl Into<PathBuf>, config: &Config) -> Self {
        let registry = ToolRegistry::discover(&config.tools);
        Self {
            input: input.into(),
            output: None,
            trim: None,
            effects: Vec::new(),
            progress: None,
            ffmpeg: registry.program("ffmpeg"),
            prober: FfprobeProber::from_registry(&registry),
            process: config.process.clone(),
            validator: Box::new(DefaultValidator),
        }
    }

    /// Where to write the result.
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Keep only `start..end` of the input.
    pub fn trim(mut self, start: Duration, end: Duration) -> Self {
        self.trim = Some((start, end));
        self
    }

    /// Resize the output. Shorthand for adding a [`Scale`] effect.
    pub fn resize(self, width: u32, height: u32) -> Self {
        self.effect(Scale::new(width, height))
    }

    /// Append an effect.
    pub fn effect(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    /// Report encoding progress to `sender`.
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    pub fn with_prober(mut self, prober: FfprobeProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    /// Check paths, the trim window and every effect.
    pub fn validate(&self) -> Result<()> {
        self.validator.validate_path(&self.input)?;
        let output = self
            .output
            .as_deref()
            .ok_or_else(|| Error::invalid_input("editor has no output path"))?;
        self.validator.validate_output_path(output)?;
        if output == self.input {
            return Err(Error::invalid_input(format!(
                "output would overwrite the input {}",
                self.input.display()
            )));
        }
        if let Some((start, end)) = self.trim {
            self.validator.validate_time_range(start, end)?;
            if end == start {
                return Err(Error::invalid_input(format!(
                    "trim window at {:.3}s is empty",
                    start.as_secs_f64()
                )));
            }
        }
        for effect in &self.effects {
            effect.validate()?;
        }
        Ok(())
    }

    /// All effects rendered against the edited clip, joined into one filter
    /// chain.
    ///
    /// `source_duration` is the input's length when known; it lets effects
    /// that depend on the clip length (fade-out) place themselves correctly
    /// on untrimmed input.
    pub fn filter_graph(&self, source_duration: Option<Duration>) -> Option<String> {
        let clip = self.clip(source_duration);
        let parts: Vec<String> = self
            .effects
            .iter()
            .map(|e| e.apply(&clip))
            .filter(|f| !f.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(","))
    }

    /// Build the ffmpeg invocation without running it.
    pub fn invocation(&self, source_duration: Option<Duration>) -> Result<Invocation> {
        self.validate()?;
        let output = self
            .output
            .as_deref()
            .ok_or_else(|| Error::invalid_input("editor has no output path"))?;

        let mut builder = InvocationBuilder::new();
        if self.progress.is_some() {
            for flag in PROGRESS_FLAGS {
                builder = builder.global_flag(flag);
            }
        }
        // Seeking on the input restarts timestamps at the trim start, so
        // clip-relative effect times line up with the filter chain.
        let input = self.input.to_string_lossy().to_string();
        builder = match self.trim {
            Some((start, end)) => builder.input_with_options(
                input,
                [
                    ("-ss", format!("{:.3}", start.as_secs_f64())),
                    ("-t", format!("{:.3}", (end - start).as_secs_f64())),
                ],
            ),
            None => builder.input(input),
        };
        if let Some(graph) = self.filter_graph(source_duration) {
            builder = builder.filter(graph);
        }
        Ok(builder.output(output.to_string_lossy().to_string()).build())
    }

    /// Run the edit to completion.
    ///
    /// When effects or progress need the input's length and no trim window
    /// gives it, the input is probed first; a failed probe only costs
    /// accuracy.
    ///
    /// # Errors
    ///
    /// Validation errors before anything is spawned, then everything
    /// [`ProcessHandle::run`] returns.
    pub async fn process(&mut self, scope: &Scope) -> Result<ExitReport> {
        self.validate()?;

        let source_duration = if self.trim.is_none()
            && (self.progress.is_some() || !self.effects.is_empty())
        {
            match self.prober.probe(scope, &self.input).await {
                Ok(info) => info.duration,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::debug!("Could not probe {}: {e}", self.input.display());
                    None
                }
            }
        } else {
            None
        };

        let invocation = self.invocation(source_duration)?;
        tracing::debug!("Editing {}: ffmpeg {invocation}", self.input.display());
        let command = ToolCommand::from_invocation(&self.ffmpeg, &invocation)?;

        let mut handle = ProcessHandle::from_config(command, &self.process);
        if let Some(sender) = self.progress.take() {
            let total = self.clip_duration(source_duration);
            handle = handle.with_progress(sender, total, "editing");
        }

        let report = handle.run(scope).await?;
        tracing::info!(
            "Edited {} in {:?}",
            self.input.display(),
            report.elapsed
        );
        Ok(report)
    }

    fn clip_duration(&self, source_duration: Option<Duration>) -> Option<Duration> {
        match self.trim {
            Some((start, end)) => Some(end.saturating_sub(start)),
            None => source_duration,
        }
    }

    fn clip(&self, source_duration: Option<Duration>) -> Clip {
        let mut source = MediaFile::video(self.input.clone());
        if let Some(d) = source_duration {
            source = source.with_duration(d);
        }
        let start = self.trim.map(|(s, _)| s).unwrap_or_default();
        Clip::new(
            Arc::new(source),
            start,
            self.clip_duration(source_duration).unwrap_or_default(),
            Position::default(),
        )
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("trim", &self.trim)
            .field("effects", &self.effects)
            .field("ffmpeg", &self.ffmpeg)
            .finish_non_exhaustive()
    }
}
