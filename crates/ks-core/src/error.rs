//! Unified error type for kurosawa.
//!
//! All crates funnel their failures into [`Error`]. Lifecycle-contract
//! violations, process failures and pipeline failures each get their own
//! variant so callers can decide on retry policy without string matching.

/// Unified error type covering all failure modes in kurosawa.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied data is unusable (bad path, bad time range, missing
    /// input or output on an invocation).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The OS could not create the external process.
    #[error("Spawn error [{tool}]: {message}")]
    Spawn {
        /// Program that failed to start.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// `start` was called on something that has already been started.
    #[error("Already started: {0}")]
    AlreadyStarted(String),

    /// `stop` was called on something that is not running.
    #[error("Not running: {0}")]
    NotRunning(String),

    /// The pipeline was modified or run after it had already been started.
    #[error("Pipeline already started")]
    PipelineAlreadyStarted,

    /// A pipeline stage's transformation logic failed.
    #[error("Stage failure [{index}:{stage}]: {message}")]
    StageFailure {
        /// Name of the failing stage.
        stage: String,
        /// Position of the failing stage in the pipeline.
        index: usize,
        /// Human-readable error description.
        message: String,
    },

    /// The operation was aborted because its scope was cancelled or its
    /// deadline passed.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// No capture adapter exists for the current OS.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// An external tool ran but reported failure (non-zero exit, unreadable
    /// output).
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Configuration could not be parsed or installed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::StageFailure`].
    pub fn stage(stage: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Error::StageFailure {
            stage: stage.into(),
            index,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Cancelled`].
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled(operation.into())
    }

    /// Whether this error only reports that a scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Whether this error is a lifecycle-contract violation (calling an
    /// operation in the wrong state) rather than a runtime failure.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Error::AlreadyStarted(_) | Error::NotRunning(_) | Error::PipelineAlreadyStarted
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
