//! Structural description of one ffmpeg invocation.
//!
//! [`InvocationBuilder`] accumulates inputs, options, filters and outputs in
//! insertion order and is consumed by [`InvocationBuilder::build`], which
//! freezes it into an immutable [`Invocation`]. Nothing here validates paths
//! or option values; [`Invocation::validate`] only checks the structural
//! invariant that at least one input and one output exist, and it runs before
//! any process is spawned.
//!
//! # Example
//!
//! ```
//! use ks_av::InvocationBuilder;
//!
//! let invocation = InvocationBuilder::new()
//!     .input("in.mp4")
//!     .option("-ss", "5.000")
//!     .option("-to", "15.000")
//!     .output("out.mp4")
//!     .build();
//!
//! assert_eq!(
//!     invocation.build_arguments(),
//!     ["-y", "-i", "in.mp4", "-ss", "5.000", "-to", "15.000", "out.mp4"]
//! );
//! ```

use std::fmt;

use ks_core::{Error, Result};

/// One `-i` input together with the options that must precede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Input specifier (file path, device name, lavfi source...).
    pub spec: String,
    /// Options applied to this input, emitted before its `-i`.
    pub options: Vec<(String, String)>,
}

/// An option entry: either a `name value` pair or a bare flag.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Pair(String, String),
    Flag(String),
}

/// Builder for an [`Invocation`].
///
/// Every method consumes and returns the builder, so a partially configured
/// builder can never be shared between two invocations by accident.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    overwrite: bool,
    global_flags: Vec<String>,
    inputs: Vec<Input>,
    options: Vec<Arg>,
    filters: Vec<String>,
    outputs: Vec<String>,
}

impl Default for InvocationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationBuilder {
    /// Create an empty builder. Overwriting existing outputs (`-y`) is on.
    pub fn new() -> Self {
        Self {
            overwrite: true,
            global_flags: Vec::new(),
            inputs: Vec::new(),
            options: Vec::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Toggle the `-y` global flag.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Append a global flag emitted before all inputs (e.g. `-hide_banner`).
    pub fn global_flag(mut self, flag: impl Into<String>) -> Self {
        self.global_flags.push(flag.into());
        self
    }

    /// Append an input.
    pub fn input(self, spec: impl Into<String>) -> Self {
        self.input_with_options(spec, Vec::<(String, String)>::new())
    }

    /// Append an input preceded by its own options, e.g. `-f x11grab` for a
    /// capture device.
    pub fn input_with_options<K, V>(
        mut self,
        spec: impl Into<String>,
        options: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inputs.push(Input {
            spec: spec.into(),
            options: options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Append an output.
    pub fn output(mut self, spec: impl Into<String>) -> Self {
        self.outputs.push(spec.into());
        self
    }

    /// Append a `name value` option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(Arg::Pair(name.into(), value.into()));
        self
    }

    /// Append a valueless option (e.g. `-an`).
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.options.push(Arg::Flag(name.into()));
        self
    }

    /// Append a simple filter. All simple filters are joined with `,` into one
    /// `-vf` chain.
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filters.push(expr.into());
        self
    }

    /// Append a `-filter_complex` graph at the current option position.
    /// An empty expression is ignored.
    pub fn filter_complex(self, expr: impl Into<String>) -> Self {
        let expr = expr.into();
        if expr.is_empty() {
            return self;
        }
        self.option("-filter_complex", expr)
    }

    /// Freeze the builder.
    pub fn build(self) -> Invocation {
        Invocation {
            overwrite: self.overwrite,
            global_flags: self.global_flags,
            inputs: self.inputs,
            options: self.options,
            filters: self.filters,
            outputs: self.outputs,
        }
    }
}

/// A fully assembled, immutable argument set for one external-process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    overwrite: bool,
    global_flags: Vec<String>,
    inputs: Vec<Input>,
    options: Vec<Arg>,
    filters: Vec<String>,
    outputs: Vec<String>,
}

impl Invocation {
    /// Inputs in insertion order.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Outputs in insertion order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Simple filters in insertion order.
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Check the structural invariant: at least one input and one output.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(Error::invalid_input("invocation has no input"));
        }
        if self.outputs.is_empty() {
            return Err(Error::invalid_input("invocation has no output"));
        }
        Ok(())
    }

    /// Render the argument vector.
    ///
    /// Order is fixed: global flags, then each input's options followed by its
    /// `-i` pair, then options (including any filter graph) in insertion
    /// order, then the `-vf` chain, then outputs.
    pub fn build_arguments(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.extend(self.global_flags.iter().cloned());

        for input in &self.inputs {
            for (name, value) in &input.options {
                args.push(name.clone());
                args.push(value.clone());
            }
            args.push("-i".to_string());
            args.push(input.spec.clone());
        }

        for opt in &self.options {
            match opt {
                Arg::Pair(name, value) => {
                    args.push(name.clone());
                    args.push(value.clone());
                }
                Arg::Flag(name) => args.push(name.clone()),
            }
        }

        if !self.filters.is_empty() {
            args.push("-vf".to_string());
            args.push(self.filters.join(","));
        }

        args.extend(self.outputs.iter().cloned());
        args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.build_arguments();
        let quoted: Vec<String> = args
            .iter()
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.clone()
                }
            })
            .collect();
        f.write_str(&quoted.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_invocation_matches_expected_sequence() {
        let inv = InvocationBuilder::new()
            .input("in.mp4")
            .option("-ss", "5.000")
            .option("-to", "15.000")
            .output("out.mp4")
            .build();
        assert_eq!(
            inv.build_arguments(),
            vec!["-y", "-i", "in.mp4", "-ss", "5.000", "-to", "15.000", "out.mp4"]
        );
    }

    #[test]
    fn options_keep_insertion_order() {
        let names = ["-c:v", "-preset", "-crf", "-pix_fmt", "-movflags", "-b:a"];
        let mut builder = InvocationBuilder::new().input("a.mkv");
        for (i, name) in names.iter().enumerate() {
            builder = builder.option(*name, i.to_string());
        }
        let args = builder.output("b.mp4").build().build_arguments();

        let rendered: Vec<&str> = args[3..args.len() - 1]
            .chunks(2)
            .map(|pair| pair[0].as_str())
            .collect();
        assert_eq!(rendered, names);
    }

    #[test]
    fn multiple_inputs_and_outputs_keep_order() {
        let args = InvocationBuilder::new()
            .input("one.mp4")
            .input("two.mp4")
            .output("left.mp4")
            .output("right.mp4")
            .build()
            .build_arguments();
        assert_eq!(
            args,
            vec!["-y", "-i", "one.mp4", "-i", "two.mp4", "left.mp4", "right.mp4"]
        );
    }

    #[test]
    fn filter_complex_stays_at_insertion_position() {
        let args = InvocationBuilder::new()
            .input("in.mp4")
            .option("-c:v", "libx264")
            .filter_complex("[0:v]scale=640:360[v]")
            .option("-map", "[v]")
            .output("out.mp4")
            .build()
            .build_arguments();
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "in.mp4",
                "-c:v",
                "libx264",
                "-filter_complex",
                "[0:v]scale=640:360[v]",
                "-map",
                "[v]",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn empty_filter_complex_is_ignored() {
        let args = InvocationBuilder::new()
            .input("in.mp4")
            .filter_complex("")
            .output("out.mp4")
            .build()
            .build_arguments();
        assert_eq!(args, vec!["-y", "-i", "in.mp4", "out.mp4"]);
    }

    #[test]
    fn simple_filters_join_into_one_chain() {
        let args = InvocationBuilder::new()
            .input("in.mp4")
            .filter("scale=1280:720")
            .filter("fade=t=in:st=0:d=1")
            .flag("-an")
            .output("out.mp4")
            .build()
            .build_arguments();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=1280:720,fade=t=in:st=0:d=1");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn input_options_precede_their_input() {
        let args = InvocationBuilder::new()
            .input_with_options(":0.0", [("-f", "x11grab"), ("-framerate", "30")])
            .output("screen.mp4")
            .build()
            .build_arguments();
        assert_eq!(
            args,
            vec!["-y", "-f", "x11grab", "-framerate", "30", "-i", ":0.0", "screen.mp4"]
        );
    }

    #[test]
    fn global_flags_and_no_overwrite() {
        let args = InvocationBuilder::new()
            .overwrite(false)
            .global_flag("-hide_banner")
            .input("in.mp4")
            .flag("-an")
            .output("out.mp4")
            .build()
            .build_arguments();
        assert_eq!(args, vec!["-hide_banner", "-i", "in.mp4", "-an", "out.mp4"]);
    }

    #[test]
    fn validate_requires_input_and_output() {
        let no_input = InvocationBuilder::new().output("out.mp4").build();
        assert!(matches!(no_input.validate(), Err(Error::InvalidInput(_))));

        let no_output = InvocationBuilder::new().input("in.mp4").build();
        assert!(matches!(no_output.validate(), Err(Error::InvalidInput(_))));

        let ok = InvocationBuilder::new().input("in.mp4").output("out.mp4").build();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn display_quotes_whitespace() {
        let inv = InvocationBuilder::new()
            .input("my movie.mp4")
            .output("out.mp4")
            .build();
        assert_eq!(inv.to_string(), "-y -i 'my movie.mp4' out.mp4");
    }
}
