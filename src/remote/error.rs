//! Errors raised at the network boundary.
//!
//! A request timeout is not an error here: the transport reports it as
//! `Ok(None)` and the caller counts it against its retry budget.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with something other than HTTP 200.
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// DNS, connection or body-read failure other than a timeout.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON document.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display() {
        let err = RemoteError::RequestFailed {
            status: 401,
            body: "invalid key".into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 401: invalid key"
        );
    }

    #[test]
    fn parse_error_wraps_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = RemoteError::from(serde_err);
        assert!(err.to_string().starts_with("failed to parse response"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteError>();
    }
}
