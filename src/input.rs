//! Endpoint list reader.
//!
//! The input CSV has an `EndPoint` column (URL) and a `Json` column holding
//! a JSON object used as the request payload. Any problem here aborts the
//! run before a single job starts.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::state_machine::JobRequest;

#[derive(Debug, Deserialize)]
struct EndpointRow {
    #[serde(rename = "EndPoint")]
    endpoint: String,
    #[serde(rename = "Json")]
    json: String,
}

/// Reads every row into a [`JobRequest`] carrying the configured headers
/// and timeout.
pub fn read_jobs(path: &Path, config: &ProbeConfig) -> Result<Vec<JobRequest>> {
    if !path.is_file() {
        return Err(ProbeError::InvalidInput(format!(
            "endpoints file {} not found",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut jobs = Vec::new();
    for (index, row) in reader.deserialize::<EndpointRow>().enumerate() {
        let row_number = index + 1;
        let row = row?;
        let endpoint = row.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ProbeError::InvalidInput(format!(
                "row {row_number}: empty EndPoint"
            )));
        }
        let payload = match serde_json::from_str::<Value>(&row.json) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(ProbeError::ParseFailure(format!(
                    "row {row_number}: Json must be an object, got {other}"
                )));
            }
            Err(e) => {
                return Err(ProbeError::ParseFailure(format!(
                    "row {row_number}: invalid Json: {e}"
                )));
            }
        };
        jobs.push(JobRequest::new(
            endpoint,
            payload,
            config.headers.clone(),
            config.timeout(),
        ));
    }

    tracing::info!(path = %path.display(), rows = jobs.len(), "loaded endpoints");
    Ok(jobs)
}
