//! Background analysis jobs
//!
//! A job walks one document through [`JobStep`]s in a fixed order. The stored
//! `current_step` is the next step to run, so a retried job resumes where it
//! failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Job type of per-document analysis jobs
pub const DOCUMENT_ANALYSIS: &str = "document_analysis";

string_enum! {
    pub enum JobStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    pub enum JobStep {
        Queued => "queued",
        Uploading => "uploading",
        Vectorizing => "vectorizing",
        Summarizing => "summarizing",
        GeneratingInsights => "generating_insights",
        Completed => "completed",
    }
}

impl JobStep {
    pub fn next(&self) -> Option<JobStep> {
        match self {
            JobStep::Queued => Some(JobStep::Uploading),
            JobStep::Uploading => Some(JobStep::Vectorizing),
            JobStep::Vectorizing => Some(JobStep::Summarizing),
            JobStep::Summarizing => Some(JobStep::GeneratingInsights),
            JobStep::GeneratingInsights => Some(JobStep::Completed),
            JobStep::Completed => None,
        }
    }

    /// Percent complete once the job has reached this step
    pub fn progress(&self) -> u8 {
        match self {
            JobStep::Queued => 0,
            JobStep::Uploading => 10,
            JobStep::Vectorizing => 35,
            JobStep::Summarizing => 60,
            JobStep::GeneratingInsights => 85,
            JobStep::Completed => 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundJob {
    pub id: Uuid,
    pub job_type: String,
    pub document_id: Uuid,
    pub status: JobStatus,
    pub current_step: JobStep,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BackgroundJob {
    /// Another failed attempt still leaves room for a retry
    pub fn can_retry_after_failure(&self) -> bool {
        self.attempts + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_progress() {
        let mut step = JobStep::Queued;
        let mut seen = vec![(step, step.progress())];
        while let Some(next) = step.next() {
            seen.push((next, next.progress()));
            step = next;
        }

        assert_eq!(
            seen,
            vec![
                (JobStep::Queued, 0),
                (JobStep::Uploading, 10),
                (JobStep::Vectorizing, 35),
                (JobStep::Summarizing, 60),
                (JobStep::GeneratingInsights, 85),
                (JobStep::Completed, 100),
            ]
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        for pair in JobStep::ALL.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
    }
}
