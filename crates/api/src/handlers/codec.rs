//! Handlers for the compress, decompress, and metrics endpoints.
//!
//! Handlers only collect multipart uploads and shape responses; all job
//! logic lives in [`JobOrchestrator`](crate::codec::orchestrator::JobOrchestrator).

use axum::extract::{Multipart, State};
use axum::Json;
use ehco_core::job::Artifact;
use ehco_core::metrics::MetricField;
use ehco_core::results::{CompressionMetrics, CompressionResult};
use ehco_core::types::JobId;
use serde::Serialize;

use crate::codec::{CompressOutcome, DecompressOutcome, MetricsOutcome, UploadedFile};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the WAV to compress.
pub const COMPRESS_FIELD: &str = "audio";

/// Multipart field carrying the codec file to decompress.
pub const DECOMPRESS_FIELD: &str = "compressed";

/// Multipart field carrying the two WAVs to compare (repeated).
pub const METRICS_FIELD: &str = "audio";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Sizes, ratio, and flattened metrics of a compress job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
    #[serde(rename = "originalTHD")]
    pub original_thd: f64,
    #[serde(rename = "outputTHD")]
    pub output_thd: f64,
    pub mse: f64,
    pub snr: f64,
    pub psnr: f64,
    #[serde(rename = "thDifference")]
    pub thd_difference: f64,
}

impl From<&CompressionResult> for CompressionSummary {
    fn from(result: &CompressionResult) -> Self {
        let metrics = result.metrics();
        Self {
            original_size: result.original_size(),
            compressed_size: result.compressed_size(),
            compression_ratio: result.compression_ratio(),
            original_thd: metrics.thd.input,
            output_thd: metrics.thd.output,
            mse: metrics.mse,
            snr: metrics.snr,
            psnr: metrics.psnr,
            thd_difference: result.thd_difference(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    pub success: bool,
    pub job_id: JobId,
    pub compressed_file: Artifact,
    pub reconstructed_file: Artifact,
    pub results: CompressionSummary,
    /// Metric fields that could not be parsed and were reported as `0`.
    pub metrics_defaulted: Vec<MetricField>,
    pub best_effort: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
}

impl From<CompressOutcome> for CompressResponse {
    fn from(outcome: CompressOutcome) -> Self {
        Self {
            success: true,
            job_id: outcome.job_id,
            results: CompressionSummary::from(&outcome.result),
            best_effort: outcome.metrics.is_best_effort(),
            metrics_defaulted: outcome.metrics.defaulted,
            compressed_file: outcome.compressed,
            reconstructed_file: outcome.reconstructed,
            metrics_error: outcome.metrics_error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompressResponse {
    pub success: bool,
    pub job_id: JobId,
    pub reconstructed_file: Artifact,
}

impl From<DecompressOutcome> for DecompressResponse {
    fn from(outcome: DecompressOutcome) -> Self {
        Self {
            success: true,
            job_id: outcome.job_id,
            reconstructed_file: outcome.reconstructed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub success: bool,
    pub job_id: JobId,
    pub metrics: CompressionMetrics,
    pub metrics_defaulted: Vec<MetricField>,
    pub best_effort: bool,
}

impl From<MetricsOutcome> for MetricsResponse {
    fn from(outcome: MetricsOutcome) -> Self {
        Self {
            success: true,
            job_id: outcome.job_id,
            best_effort: outcome.report.is_best_effort(),
            metrics: outcome.report.metrics,
            metrics_defaulted: outcome.report.defaulted,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/compress
///
/// Compress the uploaded WAV, decompress it again, and report sizes plus
/// quality metrics of the round trip.
pub async fn compress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<CompressResponse>> {
    let uploads = collect_uploads(multipart, COMPRESS_FIELD).await?;
    let outcome = state.orchestrator.compress(uploads).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/decompress
///
/// Decompress the uploaded codec file. No metrics: there is no original to
/// compare against.
pub async fn decompress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DecompressResponse>> {
    let uploads = collect_uploads(multipart, DECOMPRESS_FIELD).await?;
    let outcome = state.orchestrator.decompress(uploads).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/metrics
///
/// Compare exactly two uploaded WAVs. Nothing is retained.
pub async fn metrics(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<MetricsResponse>> {
    let uploads = collect_uploads(multipart, METRICS_FIELD).await?;
    let outcome = state.orchestrator.metrics(uploads).await?;
    Ok(Json(outcome.into()))
}

/// Read every file part named `field_name`; other parts are skipped.
///
/// Browsers submit an empty, unnamed part for a file input left blank, so
/// such parts do not count as uploads.
async fn collect_uploads(
    mut multipart: Multipart,
    field_name: &str,
) -> AppResult<Vec<UploadedFile>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if file_name.is_empty() && data.is_empty() {
            continue;
        }

        uploads.push(UploadedFile { file_name, data });
    }

    Ok(uploads)
}
