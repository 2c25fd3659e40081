//! Binary executable runner.
//!
//! Runs a pre-compiled executable directly (not through a shell). Validates
//! that the file exists and has execute permissions before spawning so that
//! a misconfigured tool path surfaces as a clear invocation error.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::executor::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use super::subprocess;

/// Runner for the codec and metrics executables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryRunner;

impl ToolRunner for BinaryRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        let missing = || ToolError::Missing(invocation.program.clone());

        let metadata = tokio::fs::metadata(&invocation.program)
            .await
            .map_err(|_| missing())?;
        if !metadata.is_file() {
            return Err(missing());
        }

        #[cfg(unix)]
        {
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return Err(ToolError::NotExecutable {
                    path: invocation.program.clone(),
                    mode,
                });
            }
        }

        let mut cmd = tokio::process::Command::new(&invocation.program);
        subprocess::run_command(&mut cmd, &invocation).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
