use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse failure: {0}")]
    ParseFailure(String),

    #[error("Remote error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display() {
        let err = ProbeError::InvalidInput("data/endpoints.csv not found".into());
        assert_eq!(err.to_string(), "Invalid input: data/endpoints.csv not found");
    }

    #[test]
    fn serde_error_converts() {
        let serde_err = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err();
        let err: ProbeError = serde_err.into();
        assert!(matches!(err, ProbeError::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn remote_error_converts() {
        let remote = crate::remote::RemoteError::RequestFailed {
            status: 401,
            body: "bad key".into(),
        };
        let err: ProbeError = remote.into();
        assert!(matches!(err, ProbeError::Remote(_)));
        assert_eq!(
            err.to_string(),
            "Remote error: request failed with status 401: bad key"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProbeError>();
    }
}
