//! Tool runner interface and shared types.
//!
//! Defines [`ToolRunner`], the trait the orchestrator launches executables
//! through, along with [`ToolInvocation`], [`ToolOutput`], and [`ToolError`].

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// A single run of an external executable.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Path of the executable to launch.
    pub program: PathBuf,
    /// Positional arguments, passed without shell interpretation.
    pub args: Vec<OsString>,
    /// Directory the process starts in. Required: the codec reads and writes
    /// fixed file names relative to it.
    pub working_directory: PathBuf,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(
        program: impl Into<PathBuf>,
        working_directory: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: working_directory.into(),
            timeout,
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Render the command as a single line for logs and error bodies.
    ///
    /// Arguments containing whitespace are double-quoted. The rendering is
    /// diagnostic only; the process is never started through a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.is_empty() || part.chars().any(char::is_whitespace) {
                    format!("\"{part}\"")
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output from a finished process.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process.
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ToolOutput {
    /// Convert a non-zero exit into [`ToolError::ExecutionFailed`].
    pub fn into_success(self) -> Result<Self, ToolError> {
        if self.exit_code == 0 {
            Ok(self)
        } else {
            Err(ToolError::ExecutionFailed {
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Why a tool run did not yield a successful [`ToolOutput`].
#[derive(Debug)]
pub enum ToolError {
    /// Nothing runnable exists at the configured path.
    Missing(PathBuf),
    /// The file exists but has no execute bit.
    NotExecutable { path: PathBuf, mode: u32 },
    /// The OS refused to start the process, or waiting on it failed.
    Spawn(std::io::Error),
    /// Killed after running past the invocation timeout.
    Timeout { elapsed_ms: u64 },
    /// Ran to completion with a non-zero status.
    ExecutionFailed { exit_code: i32, stderr: String },
}

impl ToolError {
    /// `true` when the process never started.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::Missing(_) | Self::NotExecutable { .. } | Self::Spawn(_)
        )
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "no executable at {}", path.display()),
            Self::NotExecutable { path, mode } => {
                write!(f, "{} is not executable (mode {mode:#o})", path.display())
            }
            Self::Spawn(err) => write!(f, "could not start process: {err}"),
            Self::Timeout { elapsed_ms } => write!(f, "killed after {elapsed_ms}ms"),
            Self::ExecutionFailed { exit_code, stderr } => {
                write!(f, "exit code {exit_code}: {}", stderr.trim_end())
            }
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::Spawn(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

/// Trait implemented by tool runners.
///
/// A runner receives a fully described invocation, spawns the subprocess,
/// and returns its captured output. A non-zero exit is NOT an error at this
/// level; callers decide via [`ToolOutput::into_success`].
pub trait ToolRunner: Send + Sync {
    fn run(
        &self,
        invocation: ToolInvocation,
    ) -> impl std::future::Future<Output = Result<ToolOutput, ToolError>> + Send;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: i32) -> ToolOutput {
        ToolOutput {
            stdout: String::new(),
            stderr: "bad header".to_string(),
            exit_code,
            duration_ms: 3,
        }
    }

    #[test]
    fn command_line_quotes_whitespace() {
        let inv = ToolInvocation::new("/opt/ehco/audio_compressor", "/tmp", Duration::from_secs(1))
            .arg("/data/my song.wav");
        assert_eq!(
            inv.command_line(),
            "/opt/ehco/audio_compressor \"/data/my song.wav\""
        );
    }

    #[test]
    fn command_line_plain_flag() {
        let inv = ToolInvocation::new("compressor", "/tmp", Duration::from_secs(1)).arg("-d");
        assert_eq!(inv.command_line(), "compressor -d");
    }

    #[test]
    fn into_success_passes_zero_exit() {
        assert!(output(0).into_success().is_ok());
    }

    #[test]
    fn into_success_rejects_non_zero_exit() {
        match output(3).into_success() {
            Err(ToolError::ExecutionFailed { exit_code, stderr }) => {
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "bad header");
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }

    #[test]
    fn launch_failures_are_distinguished_from_runs() {
        assert!(ToolError::Missing("/opt/missing".into()).is_launch_failure());
        assert!(ToolError::Spawn(std::io::Error::other("EAGAIN")).is_launch_failure());
        assert!(!ToolError::Timeout { elapsed_ms: 1 }.is_launch_failure());
        assert!(!output(1).into_success().unwrap_err().is_launch_failure());
    }

    #[test]
    fn display_mentions_path_and_mode() {
        let err = ToolError::NotExecutable {
            path: "/opt/ehco/audio_metrics".into(),
            mode: 0o644,
        };
        assert_eq!(
            err.to_string(),
            "/opt/ehco/audio_metrics is not executable (mode 0o644)"
        );
    }

    #[test]
    fn display_trims_trailing_stderr_newline() {
        let err = ToolError::ExecutionFailed {
            exit_code: 1,
            stderr: "cannot open compressed.bin\n".to_string(),
        };
        assert_eq!(err.to_string(), "exit code 1: cannot open compressed.bin");
    }

    #[test]
    fn spawn_error_has_source() {
        let err = ToolError::Spawn(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&ToolError::Timeout { elapsed_ms: 0 }).is_none());
    }
}
