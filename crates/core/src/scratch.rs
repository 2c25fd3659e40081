//! Request-scoped scratch files.
//!
//! [`ScratchArea`] owns two directories:
//!
//! - the **work root**, under which every job gets its own working
//!   directory (`<job_id>-<seq>`). The external tool runs inside it, so its
//!   fixed-name intermediates never collide across jobs;
//! - the **public root**, where harvested artifacts land and from which they
//!   are served.
//!
//! A [`JobWorkspace`] tracks everything a job created. [`JobWorkspace::release`]
//! removes the working directory and every public output that was not
//! committed. Dropping a workspace without releasing it (e.g. the request
//! future was cancelled) performs the same cleanup synchronously.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CodecError;
use crate::job::Artifact;
use crate::types::JobId;

/// URL prefix under which committed artifacts are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Longest sanitized upload name kept in a staged file name.
const MAX_STAGED_NAME_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// Kind of public output a job can reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Codec output of a compress job.
    Compressed,
    /// Round-trip WAV of a compress job.
    Reconstructed,
    /// WAV produced by a decompress job.
    Decompressed,
}

impl ArtifactKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Compressed => "compressed",
            Self::Reconstructed => "reconstructed",
            Self::Decompressed => "decompressed",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Compressed => "bin",
            Self::Reconstructed | Self::Decompressed => "wav",
        }
    }
}

/// A public destination allocated to a job but not yet written.
#[derive(Debug)]
pub struct ReservedOutput {
    name: String,
    path: PathBuf,
}

impl ReservedOutput {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// ScratchArea
// ---------------------------------------------------------------------------

/// Process-wide scratch space shared by all jobs.
#[derive(Debug)]
pub struct ScratchArea {
    work_root: PathBuf,
    public_root: PathBuf,
    sequence: AtomicU64,
}

impl ScratchArea {
    /// Create (if needed) and verify both roots.
    ///
    /// Any failure here is a startup condition: the service cannot run
    /// without writable scratch space.
    pub async fn init(
        work_root: impl AsRef<Path>,
        public_root: impl AsRef<Path>,
    ) -> Result<Self, CodecError> {
        let work_root = prepare_dir(work_root.as_ref(), "work").await?;
        let public_root = prepare_dir(public_root.as_ref(), "public").await?;

        tracing::info!(
            work_root = %work_root.display(),
            public_root = %public_root.display(),
            "Scratch area ready"
        );

        Ok(Self {
            work_root,
            public_root,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    /// Allocate a fresh working directory for `job_id`.
    pub async fn open_job(&self, job_id: JobId) -> Result<JobWorkspace, CodecError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let dir = self.work_root.join(format!("{job_id}-{seq}"));

        tokio::fs::create_dir(&dir)
            .await
            .map_err(CodecError::fs("creating job working directory"))?;

        tracing::debug!(%job_id, dir = %dir.display(), "Opened job workspace");

        Ok(JobWorkspace {
            job_id,
            dir,
            public_root: self.public_root.clone(),
            next_file: 0,
            owned_outputs: Vec::new(),
            released: false,
        })
    }
}

/// Create `dir`, resolve it to an absolute path, and prove it is writable.
async fn prepare_dir(dir: &Path, label: &str) -> Result<PathBuf, CodecError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(CodecError::fs(format!("creating {label} directory")))?;

    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(CodecError::fs(format!("resolving {label} directory")))?;

    let probe = dir.join(format!(".write-probe-{}", std::process::id()));
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(CodecError::fs(format!("writing to {label} directory")))?;
    remove_file_if_exists(&probe).await;

    Ok(dir)
}

// ---------------------------------------------------------------------------
// JobWorkspace
// ---------------------------------------------------------------------------

/// Files owned by a single job.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: JobId,
    dir: PathBuf,
    public_root: PathBuf,
    next_file: u32,
    owned_outputs: Vec<PathBuf>,
    released: bool,
}

impl JobWorkspace {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// The job's private working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of a file the external tool reads or writes implicitly.
    pub fn tool_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Persist an uploaded file under a unique name in the working directory.
    pub async fn stage(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, CodecError> {
        self.next_file += 1;
        let name = format!("upload-{}-{}", self.next_file, sanitize_file_name(file_name));
        self.stage_as(&name, bytes).await
    }

    /// Persist bytes at a fixed name in the working directory.
    pub async fn stage_as(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, CodecError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(CodecError::fs("staging upload"))?;
        Ok(path)
    }

    /// Allocate a unique public destination for an expected artifact.
    ///
    /// The path is owned by the job until [`commit`](Self::commit); release
    /// deletes it otherwise.
    pub fn reserve_output(&mut self, kind: ArtifactKind) -> ReservedOutput {
        self.next_file += 1;
        let name = format!(
            "{}-{}-{}.{}",
            kind.prefix(),
            self.job_id,
            self.next_file,
            kind.extension()
        );
        let path = self.public_root.join(&name);
        self.owned_outputs.push(path.clone());
        ReservedOutput { name, path }
    }

    /// Fail with [`CodecError::ArtifactNotProduced`] unless `source` exists.
    pub async fn expect_produced(&self, source: &Path, produced_by: &str) -> Result<(), CodecError> {
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(not_produced(source, produced_by)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_produced(source, produced_by)),
            Err(e) => Err(CodecError::fs("checking tool output")(e)),
        }
    }

    /// Copy a tool output out of the working directory into `reserved`.
    pub async fn harvest(
        &mut self,
        source: &Path,
        reserved: ReservedOutput,
        produced_by: &str,
    ) -> Result<Artifact, CodecError> {
        self.expect_produced(source, produced_by).await?;

        tokio::fs::copy(source, &reserved.path)
            .await
            .map_err(CodecError::fs("copying artifact to public directory"))?;

        let size_bytes = file_size(&reserved.path).await?;

        Ok(Artifact {
            path: format!("{PUBLIC_PREFIX}/{}", reserved.name),
            name: reserved.name,
            size_bytes,
            location: reserved.path,
        })
    }

    /// Hand `artifact` over to the public directory; release keeps it.
    pub fn commit(&mut self, artifact: &Artifact) {
        self.owned_outputs.retain(|p| p != &artifact.location);
    }

    /// Remove the working directory and every uncommitted output.
    ///
    /// Idempotent. Paths that are already gone are ignored; other removal
    /// failures are logged and do not stop the remaining cleanup.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove job working directory"
                );
            }
        }

        for path in &self.owned_outputs {
            remove_file_if_exists(path).await;
        }
        // Only now: a release cancelled midway leaves the drop guard armed.
        self.owned_outputs.clear();
        self.released = true;

        tracing::debug!(job_id = %self.job_id, "Released job workspace");
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::warn!(
            job_id = %self.job_id,
            "Job workspace dropped before release, cleaning up"
        );
        let _ = std::fs::remove_dir_all(&self.dir);
        for path in &self.owned_outputs {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Size of the file at `path` in bytes.
pub async fn file_size(path: &Path) -> Result<u64, CodecError> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(CodecError::fs("reading file size"))
}

fn not_produced(source: &Path, produced_by: &str) -> CodecError {
    CodecError::ArtifactNotProduced {
        command: produced_by.to_string(),
        artifact: source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string()),
    }
}

async fn remove_file_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

/// Reduce an uploaded file name to a safe basename.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STAGED_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn area(root: &Path) -> ScratchArea {
        ScratchArea::init(root.join("work"), root.join("public"))
            .await
            .expect("init scratch area")
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").path())
            .collect()
    }

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\music\\my song.wav"), "my_song.wav");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[tokio::test]
    async fn init_creates_absolute_roots() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        assert!(area.work_root().is_absolute());
        assert!(area.public_root().is_dir());
        assert!(entries(area.work_root()).is_empty(), "probe file must be removed");
    }

    #[tokio::test]
    async fn init_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let result = ScratchArea::init(&blocker, tmp.path().join("public")).await;
        assert_matches!(result, Err(CodecError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn jobs_get_distinct_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        let job_id = uuid::Uuid::new_v4();

        let mut a = area.open_job(job_id).await.unwrap();
        let mut b = area.open_job(job_id).await.unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_ne!(
            a.tool_path("compressed.bin"),
            b.tool_path("compressed.bin")
        );

        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn staging_same_name_twice_does_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();

        let first = ws.stage("take.wav", b"one").await.unwrap();
        let second = ws.stage("take.wav", b"two").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");

        ws.release().await;
    }

    #[tokio::test]
    async fn harvest_missing_output_is_not_produced() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();

        let reserved = ws.reserve_output(ArtifactKind::Compressed);
        let source = ws.tool_path("compressed.bin");
        let err = ws.harvest(&source, reserved, "compressor in.wav").await.unwrap_err();
        assert_matches!(
            err,
            CodecError::ArtifactNotProduced { ref command, ref artifact }
                if command == "compressor in.wav" && artifact == "compressed.bin"
        );

        ws.release().await;
    }

    #[tokio::test]
    async fn release_keeps_committed_and_removes_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();

        ws.stage_as("compressed.bin", b"payload").await.unwrap();
        ws.stage_as("output.wav", b"RIFFdata").await.unwrap();

        let reserved = ws.reserve_output(ArtifactKind::Compressed);
        let kept = ws
            .harvest(&ws.tool_path("compressed.bin"), reserved, "compressor")
            .await
            .unwrap();
        let reserved = ws.reserve_output(ArtifactKind::Reconstructed);
        let dropped = ws
            .harvest(&ws.tool_path("output.wav"), reserved, "compressor -d")
            .await
            .unwrap();

        assert_eq!(kept.size_bytes, 7);
        assert!(kept.path.starts_with("/uploads/compressed-"));
        ws.commit(&kept);

        let dir = ws.dir().to_path_buf();
        ws.release().await;

        assert!(!dir.exists());
        assert!(kept.location.exists());
        assert!(!dropped.location.exists());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;
        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();
        let _ = ws.reserve_output(ArtifactKind::Decompressed);

        std::fs::remove_dir_all(ws.dir()).unwrap();
        ws.release().await;
        ws.release().await;
        assert!(entries(area.work_root()).is_empty());
    }

    #[tokio::test]
    async fn cancelled_release_still_cleans_up_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;

        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();
        ws.stage_as("compressed.bin", b"bin").await.unwrap();
        let reserved = ws.reserve_output(ArtifactKind::Compressed);
        let artifact = ws
            .harvest(&ws.tool_path("compressed.bin"), reserved, "compressor")
            .await
            .unwrap();

        // A zero deadline polls `release` once, then drops it mid-flight.
        let _ = tokio::time::timeout(std::time::Duration::ZERO, ws.release()).await;
        drop(ws);

        assert!(!artifact.location.exists(), "uncommitted artifact leaked");
    }

    #[tokio::test]
    async fn drop_without_release_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let area = area(tmp.path()).await;

        let mut ws = area.open_job(uuid::Uuid::new_v4()).await.unwrap();
        ws.stage("a.wav", b"data").await.unwrap();
        ws.stage_as("compressed.bin", b"bin").await.unwrap();
        let reserved = ws.reserve_output(ArtifactKind::Compressed);
        let artifact = ws
            .harvest(&ws.tool_path("compressed.bin"), reserved, "compressor")
            .await
            .unwrap();
        drop(ws);

        assert!(entries(area.work_root()).is_empty());
        assert!(!artifact.location.exists());
    }
}
