use crate::error::{IngestError, IngestResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, header};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Name of the multipart text part carrying the ingestion request
pub const REQUEST_PART: &str = "DHIS2IngestionRequest";

/// Name of the multipart part carrying the CSV upload
pub const FILE_PART: &str = "file";

/// Data type declared in every ingestion request
pub const DATA_TYPE: &str = "Users";

/// Configuration for the ingestion client
#[derive(Debug, Clone)]
pub struct IngestionClientConfig {
    /// Ingestion endpoint
    pub api_url: String,
    /// Tenant the users are ingested into
    pub tenant_id: String,
    /// Token sent in `requestInfo.authToken`
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for IngestionClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            tenant_id: "bi".to_string(),
            auth_token: None,
            timeout_seconds: 60,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("user-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        is_success_response(self.status, &self.body)
    }
}

/// Decide whether the endpoint accepted an upload.
///
/// The status must be 2xx, and a JSON object body must not carry a non-empty
/// `Errors`/`errors` array or a `status` of `FAILED`/`ERROR`.
pub fn is_success_response(status: u16, body: &str) -> bool {
    if !(200..300).contains(&status) {
        return false;
    }

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return true;
    };

    let has_errors = ["Errors", "errors"].iter().any(|key| {
        fields
            .get(*key)
            .and_then(Value::as_array)
            .is_some_and(|errors| !errors.is_empty())
    });
    let failed_status = fields
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("FAILED") || s.eq_ignore_ascii_case("ERROR"));

    !has_errors && !failed_status
}

/// Async client for the user ingestion endpoint
pub struct IngestionClient {
    client: Client,
    config: IngestionClientConfig,
}

impl IngestionClient {
    /// Create a new ingestion client with the given configuration
    pub fn new(config: IngestionClientConfig) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(IngestError::from)?;

        Ok(Self { client, config })
    }

    /// JSON body of the `DHIS2IngestionRequest` part
    pub fn build_payload(&self) -> Value {
        let tenant_id = &self.config.tenant_id;
        json!({
            "tenantId": tenant_id,
            "dataType": DATA_TYPE,
            "requestInfo": {
                "authToken": self.config.auth_token,
                "userInfo": {
                    "userName": "system",
                    "name": "System User",
                    "type": "EMPLOYEE",
                    "active": true,
                    "tenantId": tenant_id,
                    "uuid": format!("{tenant_id}-system"),
                }
            }
        })
    }

    /// Upload one CSV document, retrying transient failures with exponential
    /// backoff.
    ///
    /// Any HTTP response is returned as `Ok`, including a final 5xx after the
    /// retries are exhausted; only transport failures are `Err`.
    pub async fn upload_csv(&self, csv: &[u8]) -> IngestResult<ApiResponse> {
        let mut current_attempt = 0;

        loop {
            match self.make_request(csv).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && current_attempt < self.config.retry_attempts {
                        warn!(
                            status = status.as_u16(),
                            attempt = current_attempt + 1,
                            "Server error from ingestion endpoint, retrying"
                        );
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }

                    let body = response.text().await.map_err(IngestError::from)?;
                    debug!(status = status.as_u16(), "Ingestion endpoint responded");
                    return Ok(ApiResponse {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(error) => {
                    if current_attempt < self.config.retry_attempts && self.is_retryable_error(&error)
                    {
                        warn!(%error, attempt = current_attempt + 1, "Upload failed, retrying");
                        self.wait_before_retry(current_attempt).await;
                        current_attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    fn build_form(&self, csv: &[u8]) -> IngestResult<Form> {
        let file = Part::bytes(csv.to_vec())
            .file_name(FILE_PART)
            .mime_str("application/octet-stream")
            .map_err(|e| IngestError::Payload(e.to_string()))?;
        Ok(Form::new()
            .text(REQUEST_PART, self.build_payload().to_string())
            .part(FILE_PART, file))
    }

    /// Make a single HTTP request with timeout
    async fn make_request(&self, csv: &[u8]) -> IngestResult<Response> {
        let request_future = self
            .client
            .post(&self.config.api_url)
            .header(header::ACCEPT, "application/json")
            .multipart(self.build_form(csv)?)
            .send();

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request_future,
        )
        .await
        .map_err(|_| IngestError::Timeout {
            url: self.config.api_url.clone(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(IngestError::from)
    }

    /// Wait before retry with exponential backoff
    async fn wait_before_retry(&self, attempt: u32) {
        sleep(self.retry_delay(attempt)).await;
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    /// Check if an error is retryable
    fn is_retryable_error(&self, error: &IngestError) -> bool {
        match error {
            IngestError::Http(reqwest_error) => {
                reqwest_error.is_timeout() || reqwest_error.is_connect()
            }
            IngestError::Timeout { .. } => true,
            _ => false,
        }
    }
}
