//! Wire shapes of the image-generation API and their normalized form.
//!
//! Responses are decoded into [`WireResponse`] exactly as the server sends
//! them (including the `messege` field spelling and camel-cased
//! `generationTime`), then folded into the [`RemoteOutcome`] tagged union.
//! A `processing` reply without a usable `eta` and `fetch_result` becomes
//! [`RemoteOutcome::Pending`]; a `success` reply without `output` becomes
//! [`RemoteOutcome::Other`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// `output` is either a single URL or a list of URLs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(link) => vec![link],
            OneOrMany::Many(links) => links,
        }
    }
}

/// Raw JSON body returned by a submission or fetch-result call.
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    pub status: String,
    #[serde(default)]
    pub output: Option<OneOrMany>,
    #[serde(default, rename = "generationTime")]
    pub generation_time: Option<f64>,
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub fetch_result: Option<String>,
    #[serde(default, rename = "messege")]
    pub message: Option<Value>,
}

/// Strings pass through as-is; objects and arrays keep their JSON text.
fn render_message(message: Option<Value>) -> Option<String> {
    match message? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Normalized result of one submission or poll call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    Success {
        output: Vec<String>,
        generation_time: Option<f64>,
    },
    Processing {
        eta: f64,
        fetch_result: String,
    },
    /// `processing` without a usable eta or fetch URL. Fine while polling,
    /// a dead end right after submission.
    Pending {
        message: Option<String>,
    },
    Failed {
        message: Option<String>,
    },
    Other {
        status: String,
        message: String,
    },
}

impl RemoteOutcome {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let wire: WireResponse = serde_json::from_str(body)?;
        Ok(wire.into())
    }

    /// Status label as sent on the wire.
    pub fn status(&self) -> &str {
        match self {
            RemoteOutcome::Success { .. } => "success",
            RemoteOutcome::Processing { .. } | RemoteOutcome::Pending { .. } => "processing",
            RemoteOutcome::Failed { .. } => "failed",
            RemoteOutcome::Other { status, .. } => status,
        }
    }
}

impl From<WireResponse> for RemoteOutcome {
    fn from(wire: WireResponse) -> Self {
        match wire.status.as_str() {
            "success" => match wire.output {
                Some(output) => RemoteOutcome::Success {
                    output: output.into_vec(),
                    generation_time: wire.generation_time,
                },
                None => RemoteOutcome::Other {
                    status: wire.status,
                    message: "success response without output".to_string(),
                },
            },
            "processing" => match (wire.eta, wire.fetch_result) {
                (Some(eta), Some(fetch_result))
                    if Duration::try_from_secs_f64(eta).is_ok() =>
                {
                    RemoteOutcome::Processing { eta, fetch_result }
                }
                _ => RemoteOutcome::Pending {
                    message: render_message(wire.message),
                },
            },
            "failed" => RemoteOutcome::Failed {
                message: render_message(wire.message),
            },
            _ => RemoteOutcome::Other {
                status: wire.status,
                message: render_message(wire.message).unwrap_or_default(),
            },
        }
    }
}
