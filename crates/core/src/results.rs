//! Signal-quality metrics and derived compression results.

use serde::Serialize;

use crate::error::CodecError;

/// Total harmonic distortion measured on each side of the codec, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThdMeasurement {
    pub input: f64,
    pub output: f64,
}

/// Quality metrics comparing an original and a reconstructed signal.
///
/// `psnr` is `+inf` when the signals are identical (MSE of zero). Non-finite
/// values serialize as JSON `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CompressionMetrics {
    pub mse: f64,
    pub snr: f64,
    pub psnr: f64,
    pub thd: ThdMeasurement,
}

impl CompressionMetrics {
    /// `thd.output - thd.input`, in percentage points.
    pub fn thd_difference(&self) -> f64 {
        self.thd.output - self.thd.input
    }
}

/// Outcome of a compress job: sizes, ratio, and metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionResult {
    original_size: u64,
    compressed_size: u64,
    compression_ratio: f64,
    metrics: CompressionMetrics,
}

impl CompressionResult {
    /// Fails with [`CodecError::EmptyArtifact`] when `compressed_size` is zero.
    pub fn new(
        original_size: u64,
        compressed_size: u64,
        metrics: CompressionMetrics,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            original_size,
            compressed_size,
            compression_ratio: compression_ratio(original_size, compressed_size)?,
            metrics,
        })
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }

    pub fn metrics(&self) -> &CompressionMetrics {
        &self.metrics
    }

    pub fn thd_difference(&self) -> f64 {
        self.metrics.thd_difference()
    }
}

/// `original / compressed`, refusing to divide by zero.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> Result<f64, CodecError> {
    if compressed_size == 0 {
        return Err(CodecError::EmptyArtifact {
            artifact: "compressed artifact".to_string(),
        });
    }
    Ok(original_size as f64 / compressed_size as f64)
}
