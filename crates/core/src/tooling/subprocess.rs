//! Process launch for [`ToolRunner`](super::executor::ToolRunner)
//! implementations.
//!
//! The child is started inside the invocation's working directory with stdin
//! closed. Its exit and both output pipes are awaited together under one
//! deadline; when the deadline passes the whole future is dropped, which
//! kills the child (`kill_on_drop`).

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::executor::{ToolError, ToolInvocation, ToolOutput};

/// Per-stream capture limit. Anything past it is discarded.
const CAPTURE_LIMIT: u64 = 10 * 1024 * 1024;

/// Run `cmd` as described by `invocation` and collect its output.
///
/// `cmd` carries the program; arguments, directory, and pipes come from the
/// invocation. A non-zero exit is returned as a normal [`ToolOutput`].
pub async fn run_command(
    cmd: &mut Command,
    invocation: &ToolInvocation,
) -> Result<ToolOutput, ToolError> {
    cmd.args(&invocation.args)
        .current_dir(&invocation.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(ToolError::Spawn)?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Pipes are drained while waiting so a verbose tool cannot block on a
    // full pipe buffer.
    let run = async {
        let (status, stdout, stderr) =
            tokio::join!(child.wait(), capture(stdout), capture(stderr));
        status.map(|status| (status, stdout, stderr))
    };

    let (status, stdout, stderr) = match tokio::time::timeout(invocation.timeout, run).await {
        Ok(result) => result.map_err(ToolError::Spawn)?,
        Err(_) => {
            return Err(ToolError::Timeout {
                elapsed_ms: elapsed_ms(started),
            })
        }
    };

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms: elapsed_ms(started),
    })
}

async fn capture<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        // A read error only truncates what was captured.
        let _ = pipe.take(CAPTURE_LIMIT).read_to_end(&mut buf).await;
    }
    buf
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
