use crate::job::JobStatus;
use crate::tooling::executor::ToolError;

/// Failure of a codec job.
///
/// Every variant maps to a stable error code (see [`CodecError::code`]) that
/// the HTTP layer surfaces alongside a human-readable detail string.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Expected exactly {expected} files, received {actual}")]
    WrongFileCount { expected: usize, actual: usize },

    #[error("Could not start `{command}`: {reason}")]
    ToolInvocation { command: String, reason: String },

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    ToolExecution {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {elapsed_ms}ms")]
    ToolTimeout { command: String, elapsed_ms: u64 },

    #[error("`{command}` exited successfully but did not produce {artifact}")]
    ArtifactNotProduced { command: String, artifact: String },

    #[error("{artifact} is empty, compression ratio is undefined")]
    EmptyArtifact { artifact: String },

    #[error("Metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("Filesystem error while {context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl CodecError {
    /// Build a `map_err` adapter that wraps an I/O error with `context`.
    ///
    /// ```ignore
    /// tokio::fs::copy(src, dst).await.map_err(CodecError::fs("copying artifact"))?;
    /// ```
    pub fn fs(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Filesystem { context, source }
    }

    /// Classify a runner failure for the command that produced it.
    pub fn from_tool(command: String, err: ToolError) -> Self {
        match err {
            err if err.is_launch_failure() => Self::ToolInvocation {
                command,
                reason: err.to_string(),
            },
            ToolError::ExecutionFailed { exit_code, stderr } => Self::ToolExecution {
                command,
                exit_code,
                stderr,
            },
            ToolError::Timeout { elapsed_ms } => Self::ToolTimeout {
                command,
                elapsed_ms,
            },
            other => Self::ToolInvocation {
                command,
                reason: other.to_string(),
            },
        }
    }

    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFileUploaded => "NO_FILE_UPLOADED",
            Self::WrongFileCount { .. } => "WRONG_FILE_COUNT",
            Self::ToolInvocation { .. } => "TOOL_INVOCATION_ERROR",
            Self::ToolExecution { .. } => "TOOL_EXECUTION_ERROR",
            Self::ToolTimeout { .. } => "TOOL_TIMEOUT",
            Self::ArtifactNotProduced { .. } => "ARTIFACT_NOT_PRODUCED",
            Self::EmptyArtifact { .. } => "EMPTY_ARTIFACT",
            Self::MetricsUnavailable(_) => "METRICS_UNAVAILABLE",
            Self::Filesystem { .. } => "FILESYSTEM_ERROR",
            Self::InvalidTransition { .. } => "INTERNAL_ERROR",
        }
    }

    /// The external command involved in the failure, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::ToolInvocation { command, .. }
            | Self::ToolExecution { command, .. }
            | Self::ToolTimeout { command, .. }
            | Self::ArtifactNotProduced { command, .. } => Some(command),
            _ => None,
        }
    }
}
