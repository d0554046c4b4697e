use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::job::JobRequest;

/// Phases of a single job attempt.
///
/// Every attempt starts in `Submitting` and ends in `Recorded`:
/// SUBMITTING → (POLLING →) (VERIFYING →) RECORDED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Submitting,
    Polling,
    Verifying,
    Recorded,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Submitting => write!(f, "SUBMITTING"),
            State::Polling => write!(f, "POLLING"),
            State::Verifying => write!(f, "VERIFYING"),
            State::Recorded => write!(f, "RECORDED"),
        }
    }
}

/// Live bookkeeping for one job attempt: current state, history and the
/// wall-clock start used for generation and delivery timings.
#[derive(Debug, Clone)]
pub struct JobAttempt<'a> {
    pub request: &'a JobRequest,
    pub state: State,
    pub history: Vec<State>,
    pub submissions: u32,
    started: Instant,
}

impl<'a> JobAttempt<'a> {
    pub fn start(request: &'a JobRequest) -> Self {
        Self {
            request,
            state: State::Submitting,
            history: Vec::new(),
            submissions: 0,
            started: Instant::now(),
        }
    }

    /// Moves to `next`. `Recorded` is terminal and cannot be left.
    pub fn advance(&mut self, next: State) {
        if self.state == State::Recorded || self.state == next {
            return;
        }
        tracing::debug!(
            endpoint = %self.request.endpoint,
            from = %self.state,
            to = %next,
            "job attempt transition"
        );
        self.history.push(self.state);
        self.state = next;
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed seconds rounded to two decimals.
    pub fn elapsed_secs(&self) -> f64 {
        round2(self.elapsed().as_secs_f64())
    }

    /// Full path including the current state.
    pub fn transitions(&self) -> Vec<State> {
        let mut all = self.history.clone();
        all.push(self.state);
        all
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
