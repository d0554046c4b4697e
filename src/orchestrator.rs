use std::time::Duration;

use crate::delay::Pause;
use crate::error::Result;
use crate::recorder::{NewRecord, OutcomeRecord, OutcomeRecorder};
use crate::remote::{JobTransport, RemoteOutcome};
use crate::state_machine::{JobAttempt, JobRequest, RetryPolicy, State, Termination};
use crate::verifier::LinkVerifier;

/// What one job attempt produced.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub record: OutcomeRecord,
    pub termination: Termination,
    pub transitions: Vec<State>,
    pub submissions: u32,
}

/// Drives a job attempt from submission to exactly one recorded outcome.
pub struct JobOrchestrator<T, P> {
    pub transport: T,
    pub pause: P,
    pub recorder: OutcomeRecorder,
    pub policy: RetryPolicy,
}

impl<T: JobTransport, P: Pause> JobOrchestrator<T, P> {
    pub fn new(transport: T, pause: P, recorder: OutcomeRecorder, policy: RetryPolicy) -> Self {
        Self {
            transport,
            pause,
            recorder,
            policy,
        }
    }

    /// Run one job attempt and append its outcome to the log.
    ///
    /// Remote failures never surface as `Err`: they end the attempt with a
    /// failure record. Only a failure to write that record is returned.
    #[tracing::instrument(skip_all, fields(endpoint = %request.endpoint))]
    pub async fn run_job(&self, request: &JobRequest) -> Result<AttemptReport> {
        let mut attempt = JobAttempt::start(request);
        let (termination, new) = self.submit_until_settled(&mut attempt).await;
        attempt.advance(State::Recorded);
        let record = self.recorder.append(new)?;

        Ok(AttemptReport {
            record,
            termination,
            transitions: attempt.transitions(),
            submissions: attempt.submissions,
        })
    }

    async fn submit_until_settled(&self, attempt: &mut JobAttempt<'_>) -> (Termination, NewRecord) {
        let request = attempt.request;
        let mut budget = self.policy.budget();

        while !budget.is_exhausted() {
            attempt.submissions += 1;
            let outcome = match self.transport.submit(request).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    tracing::warn!(retry = budget.used(), "submission timed out, retrying");
                    budget.spend();
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "submission failed");
                    return terminal(request, Termination::RequestFailed(e.to_string()));
                }
            };

            match outcome {
                RemoteOutcome::Success {
                    output,
                    generation_time,
                } => return self.on_success(attempt, output, generation_time, 0.0).await,
                RemoteOutcome::Processing { eta, fetch_result } => {
                    return self.poll_until_done(attempt, eta, &fetch_result).await;
                }
                RemoteOutcome::Pending { message } => {
                    // Nothing to poll without a fetch URL.
                    tracing::error!(
                        message = message.as_deref().unwrap_or(""),
                        "processing response without a valid eta and fetch_result"
                    );
                    return terminal(
                        request,
                        Termination::UnexpectedStatus {
                            status: "processing".to_string(),
                            message: "processing response without a valid eta and fetch_result"
                                .to_string(),
                        },
                    );
                }
                RemoteOutcome::Failed { message } => {
                    tracing::error!(
                        retry = budget.used(),
                        message = message.as_deref().unwrap_or(""),
                        "request failed, retrying"
                    );
                    budget.spend();
                }
                RemoteOutcome::Other { status, message } => {
                    tracing::error!(status = %status, message = %message, "unexpected status");
                    return terminal(request, Termination::UnexpectedStatus { status, message });
                }
            }
        }

        tracing::error!(max_retries = budget.max(), "submission retries exhausted");
        terminal(request, Termination::SubmissionExhausted)
    }

    async fn poll_until_done(
        &self,
        attempt: &mut JobAttempt<'_>,
        eta: f64,
        fetch_url: &str,
    ) -> (Termination, NewRecord) {
        let request = attempt.request;
        attempt.advance(State::Polling);

        tracing::info!(eta, "results processing, waiting for eta");
        let wait = match Duration::try_from_secs_f64(eta) {
            Ok(wait) => wait,
            Err(e) => {
                tracing::warn!(eta, error = %e, "unusable eta, polling right away");
                Duration::ZERO
            }
        };
        self.pause.pause(wait).await;

        let mut budget = self.policy.budget();
        while !budget.is_exhausted() {
            match self.transport.fetch_result(fetch_url, request).await {
                Ok(Some(RemoteOutcome::Success {
                    output,
                    generation_time,
                })) => return self.on_success(attempt, output, generation_time, eta).await,
                Ok(Some(RemoteOutcome::Processing { .. } | RemoteOutcome::Pending { .. })) => {
                    tracing::info!(
                        retry = budget.used(),
                        wait_secs = self.policy.poll_interval.as_secs_f64(),
                        "still processing"
                    );
                    self.pause.pause(self.policy.poll_interval).await;
                }
                Ok(Some(other)) => {
                    tracing::error!(
                        status = other.status(),
                        retry = budget.used(),
                        "unexpected status while polling, retrying"
                    );
                }
                Ok(None) => {
                    tracing::warn!(retry = budget.used(), "poll timed out, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, "poll failed");
                    return terminal(request, Termination::RequestFailed(e.to_string()));
                }
            }
            budget.spend();
        }

        tracing::error!(max_retries = budget.max(), "polling retries exhausted");
        terminal(request, Termination::PollingExhausted)
    }

    async fn on_success(
        &self,
        attempt: &mut JobAttempt<'_>,
        output: Vec<String>,
        generation_time: Option<f64>,
        eta: f64,
    ) -> (Termination, NewRecord) {
        attempt.advance(State::Verifying);
        tracing::info!(links = output.len(), "output generation was successful");

        let generation_time = generation_time.unwrap_or_else(|| attempt.elapsed_secs());
        let checks = LinkVerifier::new(&self.transport, &self.pause, &self.policy)
            .verify(&output, attempt.started())
            .await;

        let termination = if checks.is_empty() {
            Termination::ArtifactsUnreachable
        } else {
            Termination::Delivered
        };

        let new = NewRecord {
            endpoint: attempt.request.endpoint.clone(),
            estimated_time_of_arrival: Some(eta),
            image_links: output,
            generation_time: Some(generation_time),
            images_delivery_time: Some(checks),
            status: termination.status(),
        };
        (termination, new)
    }
}

fn terminal(request: &JobRequest, termination: Termination) -> (Termination, NewRecord) {
    let new = NewRecord::terminal(&request.endpoint, &termination);
    (termination, new)
}
