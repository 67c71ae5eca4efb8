//! Builder for external tool commands.
//!
//! A [`ToolCommand`] is a program plus its argument vector. Long-running
//! processes are handed to [`crate::ProcessHandle`]; short helper runs
//! (probing, version checks) use [`ToolCommand::execute`], which captures the
//! output and kills the child when the scope is cancelled.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use ks_core::config::StdioMode;
use ks_core::{Error, Result, Scope};
use tokio::process::Command;

use crate::invocation::Invocation;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A program and the arguments to launch it with.
///
/// # Example
///
/// ```no_run
/// use ks_av::ToolCommand;
/// use ks_core::Scope;
///
/// # async fn example() -> ks_core::Result<()> {
/// let scope = Scope::with_timeout(std::time::Duration::from_secs(30));
/// let output = ToolCommand::new("ffprobe")
///     .arg("-v").arg("quiet")
///     .arg("-show_format")
///     .arg("/path/to/video.mkv")
///     .execute(&scope)
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    stdio: StdioMode,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdio: StdioMode::Inherit,
        }
    }

    /// Create a command running `program` with the arguments of a validated
    /// invocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the invocation has no input or no
    /// output.
    pub fn from_invocation(program: impl Into<PathBuf>, invocation: &Invocation) -> Result<Self> {
        invocation.validate()?;
        let mut cmd = Self::new(program);
        cmd.args(invocation.build_arguments());
        Ok(cmd)
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Choose whether a spawned process shares the caller's stdout/stderr.
    pub fn stdio(&mut self, mode: StdioMode) -> &mut Self {
        self.stdio = mode;
        self
    }

    /// The program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument vector.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// The configured stdio mode.
    pub fn stdio_mode(&self) -> StdioMode {
        self.stdio
    }

    /// The file name of the program, for error messages and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the process cannot be created.
    /// - [`Error::Cancelled`] if `scope` is cancelled first; the child is
    ///   killed.
    /// - [`Error::Tool`] if the process exits with a non-zero status (message
    ///   includes stderr).
    pub async fn execute(&self, scope: &Scope) -> Result<ToolOutput> {
        let program_name = self.program_name();
        scope.check(&program_name)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::spawn(program_name.clone(), e.to_string()))?;

        // Dropping the wait future on cancellation drops the child, which
        // kills it.
        let output = scope
            .run(&program_name, child.wait_with_output())
            .await?
            .map_err(|e| Error::tool(program_name.clone(), format!("I/O error waiting for process: {e}")))?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                program_name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }
}
