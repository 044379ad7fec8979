use std::time::Duration;

use async_trait::async_trait;
use pseudo_core::CooperativeCancellationToken;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    envelope::{parse_execution_envelope, parse_success_envelope},
    request_id::new_request_id,
    AuthClient, AuthStatus, ContinueRequest, ExampleProgram, ExecutionResponse, FileSummary,
    FileUpdate, HealthReport, RemoteError, RemoteExecutionClient, RemoteFile, RemoteFileClient,
    RunRequest, User,
};

pub const REQUEST_ID_HEADER: &str = "x-pseudo-request-id";
const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_USER_AGENT: &str = concat!("pseudo-rs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
/// Connection settings for [`HttpApiClient`].
pub struct RemoteConfig {
    pub api_base: String,
    /// Timeout for every non-execution call; also bounds connection setup.
    pub request_timeout_ms: u64,
    /// Timeout for run and continue calls. `None` waits until the program
    /// finishes or the caller cancels.
    pub execution_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            execution_timeout_ms: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
/// reqwest-backed client for the editor's HTTP API.
///
/// One instance carries one cookie jar, so the run, file, and auth calls made
/// through it share the same server-side session.
pub struct HttpApiClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Debug, Deserialize)]
struct FileListPayload {
    #[serde(default)]
    files: Vec<FileSummary>,
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    user: User,
}

#[derive(Debug, Deserialize)]
struct ExamplesPayload {
    #[serde(default)]
    examples: std::collections::BTreeMap<String, ExampleProgram>,
}

impl HttpApiClient {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        if config.api_base.trim().is_empty() {
            return Err(RemoteError::InvalidConfig(
                "api base URL cannot be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| {
                RemoteError::InvalidConfig(format!("invalid user agent header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.api_base.trim().trim_end_matches('/');
        let base = base.strip_suffix("/api").unwrap_or(base);
        format!("{base}/api/{}", path.trim_start_matches('/'))
    }

    /// URL of one stored file; the id is percent-encoded as a single path segment.
    fn file_url(&self, id: &str) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.endpoint("files"))
            .map_err(|e| RemoteError::InvalidConfig(format!("invalid api base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::InvalidConfig("api base URL cannot carry a path".to_string())
            })?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.request_to(method, self.endpoint(path))
            .timeout(self.request_timeout())
    }

    fn file_request(
        &self,
        method: Method,
        id: &str,
    ) -> Result<reqwest::RequestBuilder, RemoteError> {
        Ok(self
            .request_to(method, self.file_url(id)?.to_string())
            .timeout(self.request_timeout()))
    }

    fn request_to(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        let request_id = new_request_id();
        tracing::debug!(
            %method,
            url = url.as_str(),
            request_id = request_id.as_str(),
            "remote request"
        );
        self.client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms.max(1))
    }

    async fn send_enveloped(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let raw = response.text().await?;
        parse_success_envelope(status, &raw)
    }

    async fn send_execution(
        request: reqwest::RequestBuilder,
    ) -> Result<ExecutionResponse, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let raw = response.text().await?;
        if status.is_success() {
            return parse_execution_envelope(&raw);
        }

        match parse_execution_envelope(&raw) {
            Ok(parsed @ ExecutionResponse::Error { .. }) => Ok(parsed),
            _ => Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            }),
        }
    }

    async fn post_execution(
        &self,
        path: &str,
        body: Value,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        let mut request = self.request_to(Method::POST, self.endpoint(path)).json(&body);
        if let Some(timeout_ms) = self.config.execution_timeout_ms {
            request = request.timeout(Duration::from_millis(timeout_ms.max(1)));
        }
        // Dropping the in-flight future aborts the underlying HTTP request.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RemoteError::Cancelled),
            result = Self::send_execution(request) => result,
        }
    }

    /// Calls `GET /api/health`.
    pub async fn health(&self) -> Result<HealthReport, RemoteError> {
        let value = self
            .send_enveloped(self.request(Method::GET, "health"))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetches the example catalogue, ordered by key.
    pub async fn examples(&self) -> Result<Vec<ExampleProgram>, RemoteError> {
        let value = self
            .send_enveloped(self.request(Method::GET, "examples"))
            .await?;
        let payload: ExamplesPayload = serde_json::from_value(value)?;
        Ok(payload
            .examples
            .into_iter()
            .map(|(key, mut example)| {
                example.key = key;
                example
            })
            .collect())
    }

    async fn authenticate(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<User, RemoteError> {
        let value = self
            .send_enveloped(
                self.request(Method::POST, path)
                    .json(&json!({ "username": username, "password": password })),
            )
            .await?;
        let payload: UserPayload = serde_json::from_value(value)?;
        Ok(payload.user)
    }
}

#[async_trait]
impl RemoteExecutionClient for HttpApiClient {
    async fn run(
        &self,
        request: RunRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        self.post_execution("run", serde_json::to_value(&request)?, cancel)
            .await
    }

    async fn continue_execution(
        &self,
        request: ContinueRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        self.post_execution("input", serde_json::to_value(&request)?, cancel)
            .await
    }
}

#[async_trait]
impl RemoteFileClient for HttpApiClient {
    async fn list_files(&self) -> Result<Vec<FileSummary>, RemoteError> {
        let value = self
            .send_enveloped(self.request(Method::GET, "files"))
            .await?;
        let payload: FileListPayload = serde_json::from_value(value)?;
        Ok(payload.files)
    }

    async fn fetch_file(&self, id: &str) -> Result<RemoteFile, RemoteError> {
        let value = self
            .send_enveloped(self.file_request(Method::GET, id)?)
            .await?;
        let payload: FilePayload = serde_json::from_value(value)?;
        Ok(payload.file)
    }

    async fn create_file(&self, name: &str) -> Result<RemoteFile, RemoteError> {
        let value = self
            .send_enveloped(
                self.request(Method::POST, "files")
                    .json(&json!({ "name": name })),
            )
            .await?;
        let payload: FilePayload = serde_json::from_value(value)?;
        Ok(payload.file)
    }

    async fn update_file(&self, id: &str, update: FileUpdate) -> Result<(), RemoteError> {
        self.send_enveloped(self.file_request(Method::PUT, id)?.json(&update))
            .await?;
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> Result<(), RemoteError> {
        self.send_enveloped(self.file_request(Method::DELETE, id)?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthClient for HttpApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        self.authenticate("auth/login", username, password).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        self.authenticate("auth/register", username, password)
            .await
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.send_enveloped(self.request(Method::POST, "auth/logout"))
            .await?;
        Ok(())
    }

    async fn status(&self) -> Result<AuthStatus, RemoteError> {
        let value = self
            .send_enveloped(self.request(Method::GET, "auth/status"))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
