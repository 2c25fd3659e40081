//! Central codec job orchestrator.
//!
//! Runs each job through its lifecycle:
//!
//! 1. Validate the upload count (before any file or process is touched).
//! 2. Open a private working directory and stage the uploads.
//! 3. Run the codec inside that directory.
//! 4. Harvest outputs into the public directory and stat sizes.
//! 5. Compress only: best-effort metrics run on input vs. reconstruction.
//! 6. Commit the returned artifacts and release everything else.
//!
//! Every exit path, including errors, goes through [`JobOrchestrator::finish`],
//! which releases the workspace before the result is returned.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ehco_core::error::CodecError;
use ehco_core::job::{Job, JobStatus, Operation};
use ehco_core::metrics::{self, MetricsReport};
use ehco_core::results::{compression_ratio, CompressionResult};
use ehco_core::scratch::{self, ArtifactKind, JobWorkspace, ScratchArea};
use ehco_core::tooling::binary::BinaryRunner;
use ehco_core::tooling::contract::{
    COMPRESSED_INTERMEDIATE, DECOMPRESS_FLAG, RECONSTRUCTED_INTERMEDIATE,
};
use ehco_core::tooling::executor::{ToolInvocation, ToolOutput, ToolRunner};
use serde::Serialize;
use tokio::sync::Semaphore;

use super::{CompressOutcome, DecompressOutcome, MetricsOutcome, UploadedFile};

/// Whether the configured executables are present and executable.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    pub compressor: bool,
    pub metrics_tool: bool,
}

/// Orchestrates compress, decompress, and metrics jobs.
///
/// Tool runs pass through `tool_gate`, a semaphore sized by
/// `TOOL_CONCURRENCY`. With the default of one permit the external tool never
/// runs twice at once, while staging, harvesting, and cleanup of other jobs
/// continue in parallel.
pub struct JobOrchestrator {
    scratch: ScratchArea,
    runner: BinaryRunner,
    compressor: PathBuf,
    metrics_tool: PathBuf,
    tool_timeout: Duration,
    tool_gate: Semaphore,
}

impl JobOrchestrator {
    pub fn new(
        scratch: ScratchArea,
        compressor: PathBuf,
        metrics_tool: PathBuf,
        tool_timeout: Duration,
        tool_concurrency: usize,
    ) -> Self {
        Self {
            scratch,
            runner: BinaryRunner,
            compressor,
            metrics_tool,
            tool_timeout,
            tool_gate: Semaphore::new(tool_concurrency.max(1)),
        }
    }

    pub fn scratch(&self) -> &ScratchArea {
        &self.scratch
    }

    pub async fn tool_status(&self) -> ToolStatus {
        ToolStatus {
            compressor: is_executable(&self.compressor).await,
            metrics_tool: is_executable(&self.metrics_tool).await,
        }
    }

    /// Compress one WAV, round-trip it, and measure the reconstruction.
    pub async fn compress(&self, uploads: Vec<UploadedFile>) -> Result<CompressOutcome, CodecError> {
        let (mut job, mut workspace) = self.start(Operation::Compress, uploads.len()).await?;
        let result = self.run_compress(&mut job, &mut workspace, uploads).await;
        finish(job, workspace, result).await
    }

    /// Decompress one codec file into a WAV.
    pub async fn decompress(
        &self,
        uploads: Vec<UploadedFile>,
    ) -> Result<DecompressOutcome, CodecError> {
        let (mut job, mut workspace) = self.start(Operation::Decompress, uploads.len()).await?;
        let result = self.run_decompress(&mut job, &mut workspace, uploads).await;
        finish(job, workspace, result).await
    }

    /// Compare two WAV files with the metrics tool.
    pub async fn metrics(&self, uploads: Vec<UploadedFile>) -> Result<MetricsOutcome, CodecError> {
        let (mut job, mut workspace) = self.start(Operation::Metrics, uploads.len()).await?;
        let result = self.run_metrics(&mut job, &mut workspace, uploads).await;
        finish(job, workspace, result).await
    }

    // -----------------------------------------------------------------------
    // Pipelines
    // -----------------------------------------------------------------------

    async fn start(
        &self,
        operation: Operation,
        upload_count: usize,
    ) -> Result<(Job, JobWorkspace), CodecError> {
        operation.validate_upload_count(upload_count)?;

        let mut job = Job::new(operation);
        tracing::info!(job_id = %job.id(), %operation, upload_count, "Job created");

        match self.scratch.open_job(job.id()).await {
            Ok(workspace) => Ok((job, workspace)),
            Err(e) => {
                job.fail(&e);
                tracing::error!(job_id = %job.id(), error = %e, "Could not open job workspace");
                Err(e)
            }
        }
    }

    async fn run_compress(
        &self,
        job: &mut Job,
        ws: &mut JobWorkspace,
        uploads: Vec<UploadedFile>,
    ) -> Result<CompressOutcome, CodecError> {
        let upload = single(uploads)?;
        let input = ws.stage(&upload.file_name, &upload.data).await?;
        job.add_input(input.clone());
        job.transition(JobStatus::Staged)?;

        let compress = self.codec(ws).arg(input.as_os_str());
        let compress_cmd = compress.command_line();
        self.run_tool(compress).await?;

        let compressed_tmp = ws.tool_path(COMPRESSED_INTERMEDIATE);
        // Harvested before `-d` runs, so the artifact is the compressor's
        // output even if the decoder touches the intermediate.
        let reserved = ws.reserve_output(ArtifactKind::Compressed);
        let compressed = ws.harvest(&compressed_tmp, reserved, &compress_cmd).await?;

        // Round trip in the same directory: `-d` reads the compressed.bin
        // the previous run left behind.
        let decompress = self.codec(ws).arg(DECOMPRESS_FLAG);
        let decompress_cmd = decompress.command_line();
        self.run_tool(decompress).await?;
        job.transition(JobStatus::Invoked)?;

        let reserved = ws.reserve_output(ArtifactKind::Reconstructed);
        let reconstructed = ws
            .harvest(&ws.tool_path(RECONSTRUCTED_INTERMEDIATE), reserved, &decompress_cmd)
            .await?;

        let original_size = scratch::file_size(&input).await?;
        // A zero-byte codec output fails here, before the metrics run.
        compression_ratio(original_size, compressed.size_bytes)?;
        job.transition(JobStatus::Harvested)?;

        job.transition(JobStatus::MetricsPending)?;
        let (report, metrics_error) = match self
            .measure(ws, &input, &reconstructed.location)
            .await
            .map_err(|e| CodecError::MetricsUnavailable(e.to_string()))
        {
            Ok(report) => (report, None),
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id(),
                    error = %e,
                    "Metrics unavailable, continuing with zeroed metrics"
                );
                (MetricsReport::unavailable(), Some(e.to_string()))
            }
        };

        let result = CompressionResult::new(original_size, compressed.size_bytes, report.metrics)?;

        job.transition(JobStatus::Completed)?;
        ws.commit(&compressed);
        ws.commit(&reconstructed);

        tracing::info!(
            job_id = %job.id(),
            original_size,
            compressed_size = compressed.size_bytes,
            compression_ratio = result.compression_ratio(),
            best_effort = report.is_best_effort(),
            "Compression finished"
        );

        Ok(CompressOutcome {
            job_id: job.id(),
            compressed,
            reconstructed,
            result,
            metrics: report,
            metrics_error,
        })
    }

    async fn run_decompress(
        &self,
        job: &mut Job,
        ws: &mut JobWorkspace,
        uploads: Vec<UploadedFile>,
    ) -> Result<DecompressOutcome, CodecError> {
        let upload = single(uploads)?;
        // The codec reads its input from the fixed intermediate name.
        let staged = ws.stage_as(COMPRESSED_INTERMEDIATE, &upload.data).await?;
        job.add_input(staged);
        job.transition(JobStatus::Staged)?;

        let decompress = self.codec(ws).arg(DECOMPRESS_FLAG);
        let decompress_cmd = decompress.command_line();
        self.run_tool(decompress).await?;
        job.transition(JobStatus::Invoked)?;

        let reserved = ws.reserve_output(ArtifactKind::Decompressed);
        let reconstructed = ws
            .harvest(&ws.tool_path(RECONSTRUCTED_INTERMEDIATE), reserved, &decompress_cmd)
            .await?;
        job.transition(JobStatus::Harvested)?;

        job.transition(JobStatus::Completed)?;
        ws.commit(&reconstructed);

        Ok(DecompressOutcome {
            job_id: job.id(),
            reconstructed,
        })
    }

    async fn run_metrics(
        &self,
        job: &mut Job,
        ws: &mut JobWorkspace,
        uploads: Vec<UploadedFile>,
    ) -> Result<MetricsOutcome, CodecError> {
        let mut staged = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            let path = ws.stage(&upload.file_name, &upload.data).await?;
            job.add_input(path.clone());
            staged.push(path);
        }
        job.transition(JobStatus::Staged)?;

        let [original, candidate] = staged.as_slice() else {
            return Err(CodecError::WrongFileCount {
                expected: 2,
                actual: staged.len(),
            });
        };

        job.transition(JobStatus::MetricsPending)?;
        let report = self.measure(ws, original, candidate).await?;
        job.transition(JobStatus::Completed)?;

        Ok(MetricsOutcome {
            job_id: job.id(),
            report,
        })
    }

    // -----------------------------------------------------------------------
    // Tool helpers
    // -----------------------------------------------------------------------

    fn codec(&self, ws: &JobWorkspace) -> ToolInvocation {
        ToolInvocation::new(&self.compressor, ws.dir(), self.tool_timeout)
    }

    async fn measure(
        &self,
        ws: &JobWorkspace,
        original: &Path,
        candidate: &Path,
    ) -> Result<MetricsReport, CodecError> {
        let invocation = ToolInvocation::new(&self.metrics_tool, ws.dir(), self.tool_timeout)
            .arg(original.as_os_str())
            .arg(candidate.as_os_str());
        let output = self.run_tool(invocation).await?;
        Ok(metrics::parse(&output.stdout))
    }

    /// Run one tool invocation under the gate, failing on a non-zero exit.
    async fn run_tool(&self, invocation: ToolInvocation) -> Result<ToolOutput, CodecError> {
        let command = invocation.command_line();

        let _permit = self
            .tool_gate
            .acquire()
            .await
            .map_err(|_| CodecError::ToolInvocation {
                command: command.clone(),
                reason: "tool gate closed".to_string(),
            })?;

        tracing::debug!(
            %command,
            cwd = %invocation.working_directory.display(),
            "Running external tool"
        );

        let output = self
            .runner
            .run(invocation)
            .await
            .and_then(ToolOutput::into_success)
            .map_err(|e| CodecError::from_tool(command.clone(), e))?;

        tracing::debug!(
            %command,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "External tool finished"
        );

        Ok(output)
    }
}

/// Record the outcome and release the workspace before returning.
async fn finish<T>(
    mut job: Job,
    mut workspace: JobWorkspace,
    result: Result<T, CodecError>,
) -> Result<T, CodecError> {
    match &result {
        Ok(_) => {
            tracing::info!(
                job_id = %job.id(),
                operation = %job.operation(),
                created_at = %job.created_at(),
                inputs = ?job.input_paths(),
                elapsed_ms = job.elapsed_ms(),
                "Job completed"
            );
        }
        Err(e) => {
            let failed_in = job.status();
            job.fail(e);
            tracing::warn!(
                job_id = %job.id(),
                operation = %job.operation(),
                created_at = %job.created_at(),
                inputs = ?job.input_paths(),
                %failed_in,
                code = e.code(),
                error = job.error().unwrap_or_default(),
                "Job failed"
            );
        }
    }

    workspace.release().await;
    result
}

fn single(uploads: Vec<UploadedFile>) -> Result<UploadedFile, CodecError> {
    uploads.into_iter().next().ok_or(CodecError::NoFileUploaded)
}

async fn is_executable(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        #[cfg(unix)]
        Ok(meta) => {
            use std::os::unix::fs::PermissionsExt;
            meta.is_file() && meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}
