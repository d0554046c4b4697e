//! Delivery checks for generated image links.
//!
//! Each link is fetched until it answers HTTP 200 or its own retry budget
//! runs out, with a fixed wait between fetches. Links are checked one after
//! another. A link that never answers 200 is left out of the result.

use std::time::{Duration, Instant};

use crate::delay::Pause;
use crate::recorder::LinkCheck;
use crate::remote::JobTransport;
use crate::state_machine::{RetryBudget, RetryPolicy, round2};

pub struct LinkVerifier<'a, T, P> {
    transport: &'a T,
    pause: &'a P,
    max_retries: u32,
    retry_delay: Duration,
}

impl<'a, T: JobTransport, P: Pause> LinkVerifier<'a, T, P> {
    pub fn new(transport: &'a T, pause: &'a P, policy: &RetryPolicy) -> Self {
        Self {
            transport,
            pause,
            max_retries: policy.max_retries,
            retry_delay: policy.link_retry_delay,
        }
    }

    /// Checks every link; `started` is the job start used for delivery times.
    pub async fn verify(&self, links: &[String], started: Instant) -> Vec<LinkCheck> {
        let mut checks = Vec::with_capacity(links.len());
        for link in links {
            match self.verify_one(link, started).await {
                Some(check) => checks.push(check),
                None => tracing::warn!(link = %link, "link never became reachable"),
            }
        }
        checks
    }

    async fn verify_one(&self, link: &str, started: Instant) -> Option<LinkCheck> {
        let mut budget = RetryBudget::new(self.max_retries);
        while !budget.is_exhausted() {
            match self.transport.probe_link(link).await {
                Ok(200) => {
                    return Some(LinkCheck {
                        link: link.to_string(),
                        delivery_time: round2(started.elapsed().as_secs_f64()),
                        retry_count: budget.used(),
                    });
                }
                Ok(status) => {
                    tracing::info!(link, status, retry = budget.used(), "link not working, retrying");
                }
                Err(e) => {
                    tracing::warn!(link, error = %e, retry = budget.used(), "link fetch failed, retrying");
                }
            }
            self.pause.pause(self.retry_delay).await;
            budget.spend();
        }
        None
    }
}
