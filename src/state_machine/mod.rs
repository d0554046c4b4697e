mod job;
mod state;

pub use job::{JobRequest, RetryBudget, RetryPolicy, Termination};
pub use state::{JobAttempt, State, round2};
