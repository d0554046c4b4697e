use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use super::error::RemoteError;
use super::types::RemoteOutcome;
use crate::state_machine::JobRequest;

/// Field the API key is injected under in every request body.
const KEY_FIELD: &str = "key";

/// Network seam used by the orchestrator and the link verifier.
///
/// `Ok(None)` from `submit`/`fetch_result` means the call timed out.
#[allow(async_fn_in_trait)]
pub trait JobTransport {
    async fn submit(&self, request: &JobRequest) -> Result<Option<RemoteOutcome>, RemoteError>;

    async fn fetch_result(
        &self,
        url: &str,
        request: &JobRequest,
    ) -> Result<Option<RemoteOutcome>, RemoteError>;

    /// Issues a GET and returns the HTTP status code.
    async fn probe_link(&self, link: &str) -> Result<u16, RemoteError>;
}

pub struct RemoteClient {
    api_key: String,
    client: Client,
}

impl RemoteClient {
    pub fn new(api_key: String) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { api_key, client })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        request: &JobRequest,
    ) -> Result<Option<RemoteOutcome>, RemoteError> {
        let sent = self
            .client
            .post(url)
            .headers(header_map(&request.headers))
            .timeout(request.timeout)
            .json(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url, timeout_secs = request.timeout.as_secs_f64(), "request timed out");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            tracing::error!(url, status = status.as_u16(), body = %body, "request failed");
            return Err(RemoteError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url, "response body timed out");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(RemoteOutcome::parse(&text)?))
    }
}

impl JobTransport for RemoteClient {
    async fn submit(&self, request: &JobRequest) -> Result<Option<RemoteOutcome>, RemoteError> {
        let mut payload = request.payload.clone();
        payload.insert(KEY_FIELD.to_string(), Value::String(self.api_key.clone()));
        tracing::info!(service = request.service_name(), "performing post request");
        self.post_json(&request.endpoint, &Value::Object(payload), request)
            .await
    }

    async fn fetch_result(
        &self,
        url: &str,
        request: &JobRequest,
    ) -> Result<Option<RemoteOutcome>, RemoteError> {
        let body = json!({ KEY_FIELD: self.api_key });
        self.post_json(url, &body, request).await
    }

    async fn probe_link(&self, link: &str) -> Result<u16, RemoteError> {
        let response = self.client.get(link).send().await?;
        Ok(response.status().as_u16())
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid header"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(endpoint: String, timeout: Duration) -> JobRequest {
        let mut payload = Map::new();
        payload.insert("prompt".into(), json!("a red fox"));
        let headers = BTreeMap::from([("X-Client".to_string(), "genprobe".to_string())]);
        JobRequest::new(endpoint, payload, headers, timeout)
    }

    #[tokio::test]
    async fn submit_injects_key_and_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text2img"))
            .and(header("X-Client", "genprobe"))
            .and(body_json(json!({"prompt": "a red fox", "key": "k-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "output": ["https://cdn/a.png"],
                "generationTime": 1.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new("k-1".into()).unwrap();
        let req = request(format!("{}/text2img", server.uri()), Duration::from_secs(5));
        let outcome = client.submit(&req).await.unwrap();

        assert_eq!(
            outcome,
            Some(RemoteOutcome::Success {
                output: vec!["https://cdn/a.png".into()],
                generation_time: Some(1.5),
            })
        );
        assert!(!req.payload.contains_key("key"));
    }

    #[tokio::test]
    async fn non_200_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RemoteClient::new("k".into()).unwrap();
        let req = request(format!("{}/text2img", server.uri()), Duration::from_secs(5));
        let err = client.submit(&req).await.unwrap_err();

        match err {
            RemoteError::RequestFailed { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_yields_no_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "output": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = RemoteClient::new("k".into()).unwrap();
        let req = request(format!("{}/text2img", server.uri()), Duration::from_millis(50));
        let outcome = client.submit(&req).await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = RemoteClient::new("k".into()).unwrap();
        let req = request(format!("{}/text2img", server.uri()), Duration::from_secs(5));
        let err = client.submit(&req).await.unwrap_err();
        assert!(matches!(err, RemoteError::Parse(_)));
    }

    #[tokio::test]
    async fn fetch_result_sends_only_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fetch/42"))
            .and(body_json(json!({"key": "k-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "processing",
                "eta": 3,
                "fetch_result": "https://api/fetch/42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemoteClient::new("k-2".into()).unwrap();
        let req = request(format!("{}/text2img", server.uri()), Duration::from_secs(5));
        let outcome = client
            .fetch_result(&format!("{}/fetch/42", server.uri()), &req)
            .await
            .unwrap();
        assert!(matches!(outcome, Some(RemoteOutcome::Processing { .. })));
    }

    #[tokio::test]
    async fn probe_link_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = RemoteClient::new("k".into()).unwrap();
        assert_eq!(
            client
                .probe_link(&format!("{}/a.png", server.uri()))
                .await
                .unwrap(),
            200
        );
        assert_eq!(
            client
                .probe_link(&format!("{}/missing.png", server.uri()))
                .await
                .unwrap(),
            404
        );
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let headers = BTreeMap::from([
            ("Accept".to_string(), "application/json".to_string()),
            ("bad header".to_string(), "x".to_string()),
        ]);
        let map = header_map(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["accept"], "application/json");
    }
}
