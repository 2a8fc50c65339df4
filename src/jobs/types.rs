//! Batch job data types.
//!
//! The backend reports job state with inconsistent field names and status
//! spellings; everything here normalizes them at the boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Status spellings reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Running,
    Completed,
    Done,
    Success,
    Failed,
    Error,
    /// Anything else. Treated as still active.
    Other(String),
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Done => "done",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> JobPhase {
        match self {
            Self::Completed | Self::Done | Self::Success => JobPhase::Succeeded,
            Self::Failed | Self::Error => JobPhase::Failed,
            Self::Pending | Self::Queued | Self::Processing | Self::Running | Self::Other(_) => {
                JobPhase::Active
            }
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }
}

impl FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "pending" => Self::Pending,
            "queued" => Self::Queued,
            "processing" => Self::Processing,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "done" => Self::Done,
            "success" => Self::Success,
            "failed" => Self::Failed,
            "error" => Self::Error,
            _ => Self::Other(s.trim().to_string()),
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Collapsed job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Active,
    Succeeded,
    Failed,
}

impl JobPhase {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Which job endpoint family a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Import,
    Export,
}

impl JobKind {
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Import => "imports",
            Self::Export => "exports",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "import",
            Self::Export => "export",
        })
    }
}

/// A server-tracked import or export job.
///
/// Deserialization accepts the field aliases the backend uses and an
/// optional `job`/`data` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchJob {
    pub id: String,
    pub status: Option<JobStatus>,
    pub job_status: Option<JobStatus>,
    pub progress_percentage: Option<f64>,
    pub total_records: Option<u64>,
    pub processed_records: Option<u64>,
    pub successful_records: Option<u64>,
    pub failed_records: Option<u64>,
    pub skipped_records: Option<u64>,
    pub error_summary: Option<String>,
    pub download_url: Option<String>,
}

impl BatchJob {
    /// Lifecycle phase.
    ///
    /// `job_status` wins whenever it is terminal; otherwise `status` decides.
    #[must_use]
    pub fn phase(&self) -> JobPhase {
        let from_job_status = self.job_status.as_ref().map(JobStatus::phase);
        let from_status = self.status.as_ref().map(JobStatus::phase);

        match (from_job_status, from_status) {
            (Some(phase), _) if phase.is_terminal() => phase,
            (_, Some(phase)) => phase,
            _ => JobPhase::Active,
        }
    }

    /// The status to show, preferring whichever field drove [`BatchJob::phase`].
    #[must_use]
    pub fn display_status(&self) -> &str {
        match (&self.job_status, &self.status) {
            (Some(js), _) if js.is_terminal() => js.as_str(),
            (_, Some(s)) => s.as_str(),
            (Some(js), None) => js.as_str(),
            (None, None) => "unknown",
        }
    }

    /// Rows handled so far.
    ///
    /// Falls back to the sum of the outcome counters when the backend does
    /// not report `processed_records`.
    #[must_use]
    pub fn processed(&self) -> Option<u64> {
        self.processed_records.or_else(|| {
            let parts = [
                self.successful_records,
                self.failed_records,
                self.skipped_records,
            ];
            parts
                .iter()
                .any(Option::is_some)
                .then(|| parts.iter().flatten().sum())
        })
    }

    /// Row count the job will handle.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.total_records
    }

    /// Percentage complete in `0..=100`.
    ///
    /// Uses `progress_percentage` when present, else processed/total.
    #[must_use]
    pub fn progress(&self) -> f64 {
        let raw = self.progress_percentage.or_else(|| {
            let total = self.total().filter(|t| *t > 0)?;
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.processed()? as f64 / total as f64;
            Some(ratio * 100.0)
        });

        match raw {
            Some(p) if p.is_finite() => p.clamp(0.0, 100.0),
            _ if self.phase() == JobPhase::Succeeded => 100.0,
            _ => 0.0,
        }
    }
}

impl<'de> Deserialize<'de> for BatchJob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(mut obj) = value else {
            return Err(serde::de::Error::custom("expected a job object"));
        };

        for envelope in ["job", "data"] {
            if let Some(Value::Object(inner)) = obj.get(envelope) {
                if !obj.contains_key("id") && !obj.contains_key("status") {
                    obj = inner.clone();
                    break;
                }
            }
        }

        let id = first_text(&obj, &["id", "job_id", "task_id"])
            .ok_or_else(|| serde::de::Error::missing_field("id"))?;

        Ok(Self {
            id,
            status: first_text(&obj, &["status"]).and_then(|s| s.parse().ok()),
            job_status: first_text(&obj, &["job_status"]).and_then(|s| s.parse().ok()),
            progress_percentage: first_number(&obj, &["progress_percentage", "progress"]),
            total_records: first_count(&obj, &["total_records", "total_rows", "total"]),
            processed_records: first_count(&obj, &["processed_records", "processed_rows"]),
            successful_records: first_count(&obj, &["successful_records", "success_count"]),
            failed_records: first_count(&obj, &["failed_records", "error_count"]),
            skipped_records: first_count(&obj, &["skipped_records"]),
            error_summary: first_text(&obj, &["error_summary", "error_message", "error"]),
            download_url: first_text(&obj, &["download_url", "file_url"]),
        })
    }
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match first_value(obj, keys)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match first_value(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn first_count(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    first_number(obj, keys)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
}

/// What the poller has observed so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollState {
    pub job: Option<BatchJob>,
    pub phase: JobPhase,
    /// Never decreases while the job is active.
    pub progress: f64,
    /// Status checks issued, successful or not.
    pub checks: u64,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            job: None,
            phase: JobPhase::Active,
            progress: 0.0,
            checks: 0,
        }
    }
}

impl PollState {
    pub(crate) fn observe(&mut self, job: BatchJob) {
        self.phase = job.phase();
        self.progress = match self.phase {
            JobPhase::Active => self.progress.max(job.progress()),
            _ => job.progress(),
        };
        self.job = Some(job);
    }
}

/// Terminal outcome of a job, reported exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(BatchJob),
    Failed(BatchJob),
}

impl JobOutcome {
    #[must_use]
    pub const fn job(&self) -> &BatchJob {
        match self {
            Self::Succeeded(job) | Self::Failed(job) => job,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Turn a failed job into `Error::JobFailed` carrying the server's
    /// error summary verbatim.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobFailed` for a failed outcome.
    pub fn into_result(self) -> Result<BatchJob> {
        match self {
            Self::Succeeded(job) => Ok(job),
            Self::Failed(job) => Err(Error::JobFailed {
                id: job.id,
                summary: job.error_summary,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: Value) -> BatchJob {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("COMPLETED".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert_eq!(" Error ".parse::<JobStatus>().unwrap(), JobStatus::Error);
        assert_eq!(
            "archived".parse::<JobStatus>().unwrap(),
            JobStatus::Other("archived".into())
        );
        assert!(!JobStatus::Other("archived".into()).is_terminal());
    }

    #[test]
    fn test_terminal_sets() {
        for s in ["completed", "done", "success"] {
            assert_eq!(s.parse::<JobStatus>().unwrap().phase(), JobPhase::Succeeded);
        }
        for s in ["failed", "error"] {
            assert_eq!(s.parse::<JobStatus>().unwrap().phase(), JobPhase::Failed);
        }
        for s in ["pending", "queued", "processing", "running"] {
            assert_eq!(s.parse::<JobStatus>().unwrap().phase(), JobPhase::Active);
        }
    }

    #[test]
    fn test_job_status_takes_precedence_when_terminal() {
        let j = job(json!({"id": 9, "status": "running", "job_status": "failed"}));
        assert_eq!(j.phase(), JobPhase::Failed);
        assert_eq!(j.display_status(), "failed");

        let j = job(json!({"id": 9, "status": "DONE", "job_status": "processing"}));
        assert_eq!(j.phase(), JobPhase::Succeeded);
        assert_eq!(j.display_status(), "done");

        let j = job(json!({"id": 9, "job_status": "Success"}));
        assert_eq!(j.phase(), JobPhase::Succeeded);

        let j = job(json!({"id": 9}));
        assert_eq!(j.phase(), JobPhase::Active);
        assert_eq!(j.display_status(), "unknown");
    }

    #[test]
    fn test_field_aliases() {
        let j = job(json!({
            "job_id": "exp-1",
            "status": "processing",
            "progress": "40%",
            "total_records": 200,
            "successful_records": 70,
            "failed_records": 10,
            "error_message": "10 rows rejected",
            "file_url": "/media/exports/orders.xlsx"
        }));
        assert_eq!(j.id, "exp-1");
        assert_eq!(j.progress_percentage, Some(40.0));
        assert_eq!(j.processed(), Some(80));
        assert_eq!(j.error_summary.as_deref(), Some("10 rows rejected"));
        assert_eq!(j.download_url.as_deref(), Some("/media/exports/orders.xlsx"));
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let j = job(json!({"job": {"id": 4, "status": "queued"}}));
        assert_eq!(j.id, "4");
        assert_eq!(j.status, Some(JobStatus::Queued));

        let j = job(json!({"data": {"id": "imp-2", "status": "done"}}));
        assert_eq!(j.phase(), JobPhase::Succeeded);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(serde_json::from_value::<BatchJob>(json!({"status": "done"})).is_err());
        assert!(serde_json::from_value::<BatchJob>(json!([1, 2])).is_err());
    }

    #[test]
    fn test_progress_fallbacks() {
        let j = job(json!({
            "id": 1, "status": "running", "total_records": 50, "processed_records": 20
        }));
        assert!((j.progress() - 40.0).abs() < f64::EPSILON);

        let j = job(json!({"id": 1, "status": "running", "progress_percentage": 180}));
        assert!((j.progress() - 100.0).abs() < f64::EPSILON);

        let j = job(json!({"id": 1, "status": "completed"}));
        assert!((j.progress() - 100.0).abs() < f64::EPSILON);

        let j = job(json!({"id": 1, "status": "pending", "total_records": 0}));
        assert!(j.progress().abs() < f64::EPSILON);
    }

    #[test]
    fn test_poll_state_progress_is_monotonic_while_active() {
        let mut state = PollState::default();
        state.observe(job(json!({"id": 1, "status": "running", "progress": 60})));
        state.observe(job(json!({"id": 1, "status": "running", "progress": 45})));
        assert!((state.progress - 60.0).abs() < f64::EPSILON);
        assert_eq!(state.phase, JobPhase::Active);

        state.observe(job(json!({"id": 1, "status": "failed", "progress": 45})));
        assert_eq!(state.phase, JobPhase::Failed);
    }

    #[test]
    fn test_outcome_into_result() {
        let failed = JobOutcome::Failed(job(
            json!({"id": 3, "status": "error", "error_summary": "Row 4: unknown partner"}),
        ));
        assert!(!failed.is_success());
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Job 3 failed: Row 4: unknown partner");
        assert_eq!(err.exit_code(), 6);

        let ok = JobOutcome::Succeeded(job(json!({"id": 3, "status": "done"})));
        assert_eq!(ok.into_result().unwrap().id, "3");
    }
}
