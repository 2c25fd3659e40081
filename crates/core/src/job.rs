//! Job model and lifecycle state machine.
//!
//! A [`Job`] lives for exactly one request. Its status only moves forward
//! along the edges returned by [`JobStatus::valid_transitions`]; `Failed`
//! is reachable from every non-terminal state.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::CodecError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// What a job does with its uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Compress,
    Decompress,
    Metrics,
}

impl Operation {
    /// Number of uploaded files the operation consumes.
    pub fn expected_inputs(self) -> usize {
        match self {
            Self::Compress | Self::Decompress => 1,
            Self::Metrics => 2,
        }
    }

    /// Reject an upload count that does not match [`expected_inputs`](Self::expected_inputs).
    ///
    /// Zero files is always [`CodecError::NoFileUploaded`].
    pub fn validate_upload_count(self, actual: usize) -> Result<(), CodecError> {
        let expected = self.expected_inputs();
        match actual {
            0 => Err(CodecError::NoFileUploaded),
            n if n == expected => Ok(()),
            _ => Err(CodecError::WrongFileCount { expected, actual }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Decompress => "decompress",
            Self::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Staged,
    Invoked,
    Harvested,
    MetricsPending,
    Completed,
    Failed,
}

impl JobStatus {
    /// Statuses reachable from `self`. Terminal states return an empty slice.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        use JobStatus::*;
        match self {
            Created => &[Staged, Failed],
            // Metrics-only jobs go straight from staging to the metrics tool.
            Staged => &[Invoked, MetricsPending, Failed],
            Invoked => &[Harvested, Failed],
            // Decompress has no metrics step.
            Harvested => &[MetricsPending, Completed, Failed],
            MetricsPending => &[Completed, Failed],
            Completed | Failed => &[],
        }
    }

    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Staged => "staged",
            Self::Invoked => "invoked",
            Self::Harvested => "harvested",
            Self::MetricsPending => "metrics_pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One orchestrated request lifecycle.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    operation: Operation,
    input_paths: Vec<PathBuf>,
    created_at: Timestamp,
    status: JobStatus,
    error: Option<String>,
}

impl Job {
    pub fn new(operation: Operation) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            operation,
            input_paths: Vec::with_capacity(operation.expected_inputs()),
            created_at: chrono::Utc::now(),
            status: JobStatus::Created,
            error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn input_paths(&self) -> &[PathBuf] {
        &self.input_paths
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Record a staged input file.
    pub fn add_input(&mut self, path: PathBuf) {
        self.input_paths.push(path);
    }

    /// Move to `to`, rejecting edges the state machine does not allow.
    pub fn transition(&mut self, to: JobStatus) -> Result<(), CodecError> {
        if !self.status.can_transition(to) {
            return Err(CodecError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Mark the job failed with `err`. No-op once the job is terminal.
    pub fn fail(&mut self, err: &CodecError) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.error = Some(err.to_string());
    }

    /// Milliseconds since the job was created.
    pub fn elapsed_ms(&self) -> i64 {
        (chrono::Utc::now() - self.created_at).num_milliseconds()
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// A file produced by a job and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// File name inside the public directory.
    pub name: String,
    /// URL path the artifact is served under.
    pub path: String,
    /// Size on disk in bytes.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Absolute location on disk.
    #[serde(skip)]
    pub location: PathBuf,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn compress_happy_path_transitions() {
        let mut job = Job::new(Operation::Compress);
        for next in [
            JobStatus::Staged,
            JobStatus::Invoked,
            JobStatus::Harvested,
            JobStatus::MetricsPending,
            JobStatus::Completed,
        ] {
            job.transition(next).expect("valid transition");
        }
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn decompress_skips_metrics() {
        assert!(JobStatus::Harvested.can_transition(JobStatus::Completed));
    }

    #[test]
    fn metrics_job_skips_invoke_and_harvest() {
        assert!(JobStatus::Staged.can_transition(JobStatus::MetricsPending));
    }

    #[test]
    fn cannot_skip_staging() {
        let mut job = Job::new(Operation::Decompress);
        let err = job.transition(JobStatus::Invoked).unwrap_err();
        assert_matches!(
            err,
            CodecError::InvalidTransition {
                from: JobStatus::Created,
                to: JobStatus::Invoked
            }
        );
        assert_eq!(job.status(), JobStatus::Created);
    }

    #[test]
    fn failed_is_reachable_from_every_non_terminal_state() {
        for status in [
            JobStatus::Created,
            JobStatus::Staged,
            JobStatus::Invoked,
            JobStatus::Harvested,
            JobStatus::MetricsPending,
        ] {
            assert!(status.can_transition(JobStatus::Failed), "{status}");
        }
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(JobStatus::Completed.valid_transitions().is_empty());
        assert!(JobStatus::Failed.valid_transitions().is_empty());
    }

    #[test]
    fn fail_records_error_once() {
        let mut job = Job::new(Operation::Compress);
        job.fail(&CodecError::NoFileUploaded);
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error(), Some("No file uploaded"));

        job.fail(&CodecError::MetricsUnavailable("later".into()));
        assert_eq!(job.error(), Some("No file uploaded"));
    }

    #[test]
    fn upload_count_validation() {
        assert_matches!(
            Operation::Decompress.validate_upload_count(0),
            Err(CodecError::NoFileUploaded)
        );
        assert!(Operation::Compress.validate_upload_count(1).is_ok());
        assert_matches!(
            Operation::Metrics.validate_upload_count(1),
            Err(CodecError::WrongFileCount {
                expected: 2,
                actual: 1
            })
        );
        assert_matches!(
            Operation::Metrics.validate_upload_count(0),
            Err(CodecError::NoFileUploaded)
        );
        assert!(Operation::Metrics.validate_upload_count(2).is_ok());
    }

    #[test]
    fn artifact_serializes_size_and_hides_location() {
        let artifact = Artifact {
            name: "compressed-1.bin".into(),
            path: "/uploads/compressed-1.bin".into(),
            size_bytes: 512,
            location: PathBuf::from("/srv/public/compressed-1.bin"),
        };
        let json = serde_json::to_value(&artifact).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "name": "compressed-1.bin",
                "path": "/uploads/compressed-1.bin",
                "size": 512
            })
        );
    }
}
