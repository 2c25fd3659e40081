//! Metrics report parsing.
//!
//! The metrics tool prints a free-text report with one labeled value per
//! line:
//!
//! ```text
//! MSE: 0.000123
//! PSNR: 42.5 dB
//! SNR: 38.1 dB
//! THD (Input): 1.20%
//! THD (Output): 1.35%
//! ```
//!
//! Parsing never fails. A field whose pattern does not match becomes `0` and
//! is listed in [`MetricsReport::defaulted`], so callers can tell a verified
//! zero from a missing value.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::results::{CompressionMetrics, ThdMeasurement};

/// Non-negative decimal, optionally with an exponent.
const UNSIGNED: &str = r"(\d+(?:\.\d*)?(?:[eE][-+]?\d+)?|\.\d+(?:[eE][-+]?\d+)?)";

/// Signed decimal or infinity (PSNR of identical signals).
const SIGNED: &str =
    r"([-+]?(?:(?i:inf(?:inity)?)|\d+(?:\.\d*)?(?:[eE][-+]?\d+)?|\.\d+(?:[eE][-+]?\d+)?))";

static MSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\bMSE:\s*{UNSIGNED}")).expect("valid regex"));

static PSNR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\bPSNR:\s*{SIGNED}\s*dB")).expect("valid regex"));

// `\b` keeps "PSNR:" from matching as "SNR:".
static SNR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\bSNR:\s*{SIGNED}\s*dB")).expect("valid regex"));

static THD_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bTHD\s*\(Input\):\s*{UNSIGNED}\s*%")).expect("valid regex")
});

static THD_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bTHD\s*\(Output\):\s*{UNSIGNED}\s*%")).expect("valid regex")
});

/// Identifies one field of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    Mse,
    Snr,
    Psnr,
    ThdInput,
    ThdOutput,
}

impl MetricField {
    pub const ALL: [MetricField; 5] = [
        Self::Mse,
        Self::Snr,
        Self::Psnr,
        Self::ThdInput,
        Self::ThdOutput,
    ];
}

/// Raw per-field parse result; `None` means the pattern did not match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParsedFields {
    pub mse: Option<f64>,
    pub snr: Option<f64>,
    pub psnr: Option<f64>,
    pub thd_input: Option<f64>,
    pub thd_output: Option<f64>,
}

/// Parsed metrics plus the list of fields that fell back to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub metrics: CompressionMetrics,
    pub defaulted: Vec<MetricField>,
}

impl MetricsReport {
    /// All-zero report used when the metrics tool could not produce output.
    pub fn unavailable() -> Self {
        Self {
            metrics: CompressionMetrics::default(),
            defaulted: MetricField::ALL.to_vec(),
        }
    }

    /// `true` when at least one field is a default rather than a parsed value.
    pub fn is_best_effort(&self) -> bool {
        !self.defaulted.is_empty()
    }
}

/// Extract every field independently.
pub fn parse_fields(raw: &str) -> ParsedFields {
    ParsedFields {
        mse: capture(&MSE_RE, raw),
        snr: capture(&SNR_RE, raw),
        psnr: capture(&PSNR_RE, raw),
        thd_input: capture(&THD_INPUT_RE, raw),
        thd_output: capture(&THD_OUTPUT_RE, raw),
    }
}

/// Parse a metrics report, defaulting unmatched fields to zero.
pub fn parse(raw: &str) -> MetricsReport {
    let fields = parse_fields(raw);
    let mut defaulted = Vec::new();

    let mut take = |value: Option<f64>, field: MetricField| {
        value.unwrap_or_else(|| {
            defaulted.push(field);
            0.0
        })
    };

    let metrics = CompressionMetrics {
        mse: take(fields.mse, MetricField::Mse),
        snr: take(fields.snr, MetricField::Snr),
        psnr: take(fields.psnr, MetricField::Psnr),
        thd: ThdMeasurement {
            input: take(fields.thd_input, MetricField::ThdInput),
            output: take(fields.thd_output, MetricField::ThdOutput),
        },
    };

    if !defaulted.is_empty() {
        tracing::debug!(?defaulted, "Metrics report missing fields, defaulted to zero");
    }

    MetricsReport { metrics, defaulted }
}

/// First capture group of `re` in `raw`, parsed as `f64`.
fn capture(re: &Regex, raw: &str) -> Option<f64> {
    let token = re.captures(raw)?.get(1)?.as_str();
    token.to_ascii_lowercase().parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
