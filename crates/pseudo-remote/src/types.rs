use async_trait::async_trait;
use pseudo_core::CooperativeCancellationToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Body of a `POST /api/run` request.
pub struct RunRequest {
    pub code: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Body of a `POST /api/input` continuation request.
pub struct ContinueRequest {
    pub execution_id: String,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Three-way outcome returned by both the run and continue endpoints.
pub enum ExecutionResponse {
    Success {
        output: Vec<String>,
    },
    InputRequired {
        prompt: String,
        execution_id: Option<String>,
    },
    Error {
        error: String,
        output: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Listing entry returned by `GET /api/files`.
pub struct FileSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Full document as returned by file create/fetch calls.
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Partial update for `PUT /api/files/{id}`; absent fields are left untouched.
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Result of the `GET /api/auth/status` session check.
pub struct AuthStatus {
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub interpreter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One entry of the `GET /api/examples` catalogue.
pub struct ExampleProgram {
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
}

#[derive(Debug, Error)]
/// Enumerates failures of any remote call.
pub enum RemoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Rejected(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl RemoteError {
    /// True when the service answered with a structured refusal.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[async_trait]
/// Issues run and continue requests for user programs.
///
/// Implementations must resolve with [`RemoteError::Cancelled`] promptly once
/// `cancel` fires, abandoning the outstanding request.
pub trait RemoteExecutionClient: Send + Sync {
    async fn run(
        &self,
        request: RunRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError>;

    async fn continue_execution(
        &self,
        request: ContinueRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError>;
}

#[async_trait]
/// CRUD access to the authenticated user's remote document store.
pub trait RemoteFileClient: Send + Sync {
    async fn list_files(&self) -> Result<Vec<FileSummary>, RemoteError>;

    async fn fetch_file(&self, id: &str) -> Result<RemoteFile, RemoteError>;

    async fn create_file(&self, name: &str) -> Result<RemoteFile, RemoteError>;

    async fn update_file(&self, id: &str, update: FileUpdate) -> Result<(), RemoteError>;

    async fn delete_file(&self, id: &str) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<User, RemoteError>;

    async fn register(&self, username: &str, password: &str) -> Result<User, RemoteError>;

    async fn logout(&self) -> Result<(), RemoteError>;

    async fn status(&self) -> Result<AuthStatus, RemoteError>;
}
