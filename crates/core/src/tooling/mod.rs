//! External tool invocation.
//!
//! The codec and metrics executables are black boxes. This module runs them
//! as awaited subprocesses inside a caller-chosen working directory and turns
//! their exit status into typed results. Nothing here touches HTTP or the
//! job model.

pub mod binary;
pub mod contract;
pub mod executor;
pub mod subprocess;

/// Shared test helpers for runner tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::executor::ToolInvocation;

    /// Write an executable bash script named `name` into `dir`.
    pub fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    /// Build an invocation of `program` running in `dir` with a 5-second timeout.
    pub fn invocation(program: &Path, dir: &Path) -> ToolInvocation {
        ToolInvocation::new(program, dir, Duration::from_secs(5))
    }
}
