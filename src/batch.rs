//! Sequential batch driver.
//!
//! Each endpoint row is driven `calls_per_endpoint` times, one job attempt
//! at a time. A failing attempt is logged and the batch moves on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::delay::Pause;
use crate::orchestrator::JobOrchestrator;
use crate::recorder::OutcomeRecord;
use crate::remote::JobTransport;
use crate::state_machine::JobRequest;
use crate::ui::BatchProgress;

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub attempts: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Attempts whose outcome could not be written to the log.
    pub errors: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            attempts: 0,
            succeeded: 0,
            failed: 0,
            errors: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

pub async fn run_batch<T: JobTransport, P: Pause>(
    orchestrator: &JobOrchestrator<T, P>,
    jobs: &[JobRequest],
    calls_per_endpoint: u32,
    progress: &BatchProgress,
) -> BatchSummary {
    let mut summary = BatchSummary::start();
    let span = tracing::info_span!("batch", run_id = %summary.run_id);
    drive(orchestrator, jobs, calls_per_endpoint, progress, &mut summary)
        .instrument(span)
        .await;
    summary
}

async fn drive<T: JobTransport, P: Pause>(
    orchestrator: &JobOrchestrator<T, P>,
    jobs: &[JobRequest],
    calls_per_endpoint: u32,
    progress: &BatchProgress,
    summary: &mut BatchSummary,
) {
    tracing::info!(
        endpoints = jobs.len(),
        calls_per_endpoint,
        "starting batch"
    );

    for job in jobs {
        for call in 0..calls_per_endpoint {
            tracing::info!(api_call_count = call, endpoint = %job.endpoint, "api call");
            progress.attempt(&job.endpoint, call + 1, calls_per_endpoint);
            summary.attempts += 1;

            match orchestrator.run_job(job).await {
                Ok(report) => {
                    tracing::debug!(
                        submissions = report.submissions,
                        path = ?report.transitions,
                        "attempt finished"
                    );
                    if report.termination.is_success() {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    progress.finished(&report);
                }
                Err(e) => {
                    tracing::error!(error = %e, endpoint = %job.endpoint, "job attempt aborted");
                    summary.errors += 1;
                    progress.aborted(&job.endpoint, &e.to_string());
                }
            }
        }
    }

    summary.finished_at = Utc::now();
    tracing::info!(
        attempts = summary.attempts,
        succeeded = summary.succeeded,
        failed = summary.failed,
        errors = summary.errors,
        "batch finished"
    );
}

/// Counts records per status string.
pub fn tally_statuses(records: &[OutcomeRecord]) -> BTreeMap<String, usize> {
    let mut tally = BTreeMap::new();
    for record in records {
        *tally.entry(record.status.clone()).or_insert(0) += 1;
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::testing::RecordedPauses;
    use crate::recorder::{NewRecord, OutcomeRecorder};
    use crate::remote::{RemoteError, RemoteOutcome};
    use crate::state_machine::{RetryPolicy, Termination};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Succeeds for endpoints ending in `/ok`, answers `failed` otherwise.
    #[derive(Default)]
    struct EndpointTransport {
        submitted: Mutex<Vec<String>>,
    }

    impl JobTransport for EndpointTransport {
        async fn submit(
            &self,
            request: &JobRequest,
        ) -> Result<Option<RemoteOutcome>, RemoteError> {
            self.submitted.lock().unwrap().push(request.endpoint.clone());
            if request.endpoint.ends_with("/ok") {
                Ok(Some(RemoteOutcome::Success {
                    output: vec!["https://cdn/a.png".into()],
                    generation_time: Some(1.0),
                }))
            } else {
                Ok(Some(RemoteOutcome::Failed { message: None }))
            }
        }

        async fn fetch_result(
            &self,
            _: &str,
            _: &JobRequest,
        ) -> Result<Option<RemoteOutcome>, RemoteError> {
            unreachable!("no job is queued")
        }

        async fn probe_link(&self, _: &str) -> Result<u16, RemoteError> {
            Ok(200)
        }
    }

    fn job(endpoint: &str) -> JobRequest {
        JobRequest::new(
            endpoint,
            serde_json::Map::new(),
            BTreeMap::new(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn every_call_produces_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let orch = JobOrchestrator::new(
            EndpointTransport::default(),
            RecordedPauses::default(),
            OutcomeRecorder::new(dir.path().join("data.csv")),
            RetryPolicy {
                max_retries: 2,
                ..Default::default()
            },
        );
        let jobs = vec![job("https://api/ok"), job("https://api/broken")];

        let summary = run_batch(&orch, &jobs, 3, &BatchProgress::hidden()).await;

        assert_eq!(summary.attempts, 6);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.errors, 0);
        assert!(summary.finished_at >= summary.started_at);

        let records = orch.recorder.read_all().unwrap();
        assert_eq!(records.len(), 6);
        let serials: Vec<u64> = records.iter().map(|r| r.serial_number).collect();
        assert_eq!(serials, (1..=6).collect::<Vec<u64>>());
        assert!(records[..3].iter().all(|r| r.endpoint == "https://api/ok"));

        // 3 successful submissions + 3 attempts * 2 failed submissions.
        assert_eq!(orch.transport.submitted.lock().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn unwritable_log_is_counted_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes every append fail.
        let log_path = dir.path().join("data.csv");
        std::fs::create_dir(&log_path).unwrap();
        let orch = JobOrchestrator::new(
            EndpointTransport::default(),
            RecordedPauses::default(),
            OutcomeRecorder::new(log_path),
            RetryPolicy::default(),
        );
        let jobs = vec![job("https://api/ok"), job("https://api/ok")];

        let summary = run_batch(&orch, &jobs, 1, &BatchProgress::hidden()).await;

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(orch.transport.submitted.lock().unwrap().len(), 2);
    }

    #[test]
    fn tally_counts_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = OutcomeRecorder::new(dir.path().join("data.csv"));
        for termination in [
            Termination::SubmissionExhausted,
            Termination::PollingExhausted,
            Termination::SubmissionExhausted,
        ] {
            recorder
                .append(NewRecord::terminal("https://api/x", &termination))
                .unwrap();
        }

        let tally = tally_statuses(&recorder.read_all().unwrap());
        assert_eq!(tally["failed"], 2);
        assert_eq!(tally["failed: max_retries exceeded"], 1);
    }
}
