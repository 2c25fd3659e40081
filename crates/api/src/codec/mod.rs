//! Codec job orchestration.
//!
//! The [`JobOrchestrator`](orchestrator::JobOrchestrator) ties the core
//! scratch, tooling, and metrics modules together into the compress,
//! decompress, and metrics pipelines. Held in
//! [`AppState`](crate::state::AppState) as an `Arc<JobOrchestrator>`.

pub mod orchestrator;

use axum::body::Bytes;
use ehco_core::job::Artifact;
use ehco_core::metrics::MetricsReport;
use ehco_core::results::CompressionResult;
use ehco_core::types::JobId;

/// One file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name (untrusted; sanitized before use).
    pub file_name: String,
    pub data: Bytes,
}

/// Everything a finished compress job hands back to the dispatcher.
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub job_id: JobId,
    pub compressed: Artifact,
    pub reconstructed: Artifact,
    pub result: CompressionResult,
    pub metrics: MetricsReport,
    /// Why metrics are all-zero, when the metrics tool itself failed.
    pub metrics_error: Option<String>,
}

/// Result of a decompress job.
#[derive(Debug, Clone)]
pub struct DecompressOutcome {
    pub job_id: JobId,
    pub reconstructed: Artifact,
}

/// Result of a metrics-only comparison.
#[derive(Debug, Clone)]
pub struct MetricsOutcome {
    pub job_id: JobId,
    pub report: MetricsReport,
}
