use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pseudo_core::CooperativeCancellationToken;
use pseudo_remote::{
    AuthClient, AuthStatus, ContinueRequest, ExecutionResponse, FileSummary, FileUpdate,
    RemoteError, RemoteExecutionClient, RemoteFile, RemoteFileClient, RunRequest, User,
};
use tokio::sync::Semaphore;

use crate::{FileSessionConfig, FileSessionManager};

#[derive(Debug, Clone)]
pub(crate) enum Failure {
    Reject(&'static str),
    Network,
}

impl Failure {
    fn to_error(&self) -> RemoteError {
        match self {
            Self::Reject(message) => RemoteError::Rejected((*message).to_string()),
            Self::Network => RemoteError::HttpStatus {
                status: 503,
                body: "service unavailable".to_string(),
            },
        }
    }
}

pub(crate) fn success(lines: &[&str]) -> Result<ExecutionResponse, RemoteError> {
    Ok(ExecutionResponse::Success {
        output: lines.iter().map(|line| line.to_string()).collect(),
    })
}

pub(crate) fn input_required(
    prompt: &str,
    execution_id: &str,
) -> Result<ExecutionResponse, RemoteError> {
    Ok(ExecutionResponse::InputRequired {
        prompt: prompt.to_string(),
        execution_id: Some(execution_id.to_string()),
    })
}

pub(crate) fn execution_error(message: &str) -> Result<ExecutionResponse, RemoteError> {
    Ok(ExecutionResponse::Error {
        error: message.to_string(),
        output: Vec::new(),
    })
}

/// Execution client replaying queued responses, optionally held behind a gate.
pub(crate) struct ScriptedExecutionClient {
    responses: Mutex<VecDeque<Result<ExecutionResponse, RemoteError>>>,
    runs: Mutex<Vec<RunRequest>>,
    continues: Mutex<Vec<ContinueRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Semaphore>,
    honor_cancellation: bool,
}

impl ScriptedExecutionClient {
    pub(crate) fn new(responses: Vec<Result<ExecutionResponse, RemoteError>>) -> Arc<Self> {
        Arc::new(Self::build(responses, None, true))
    }

    /// Every request waits for a [`release`](Self::release) permit.
    pub(crate) fn gated(responses: Vec<Result<ExecutionResponse, RemoteError>>) -> Arc<Self> {
        Arc::new(Self::build(responses, Some(Semaphore::new(0)), true))
    }

    /// Gated and deaf to cancellation, so responses can arrive after a cancel.
    pub(crate) fn stubborn(responses: Vec<Result<ExecutionResponse, RemoteError>>) -> Arc<Self> {
        Arc::new(Self::build(responses, Some(Semaphore::new(0)), false))
    }

    fn build(
        responses: Vec<Result<ExecutionResponse, RemoteError>>,
        gate: Option<Semaphore>,
        honor_cancellation: bool,
    ) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            runs: Mutex::new(Vec::new()),
            continues: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate,
            honor_cancellation,
        }
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn runs(&self) -> Vec<RunRequest> {
        self.runs.lock().expect("runs lock").clone()
    }

    pub(crate) fn continues(&self) -> Vec<ContinueRequest> {
        self.continues.lock().expect("continues lock").clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.runs().len() + self.continues().len()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let result = self.wait_and_pop(cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn wait_and_pop(
        &self,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        match &self.gate {
            Some(gate) if self.honor_cancellation => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RemoteError::Cancelled),
                    permit = gate.acquire() => permit.expect("gate open").forget(),
                }
            }
            Some(gate) => gate.acquire().await.expect("gate open").forget(),
            None => {
                tokio::task::yield_now().await;
                if self.honor_cancellation && cancel.is_cancelled() {
                    return Err(RemoteError::Cancelled);
                }
            }
        }
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(RemoteError::InvalidResponse(
                    "scripted response queue exhausted".to_string(),
                ))
            })
    }
}

#[async_trait]
impl RemoteExecutionClient for ScriptedExecutionClient {
    async fn run(
        &self,
        request: RunRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        self.runs.lock().expect("runs lock").push(request);
        self.respond(cancel).await
    }

    async fn continue_execution(
        &self,
        request: ContinueRequest,
        cancel: &CooperativeCancellationToken,
    ) -> Result<ExecutionResponse, RemoteError> {
        self.continues.lock().expect("continues lock").push(request);
        self.respond(cancel).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum FileOp {
    List,
    Fetch,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileCall {
    List,
    Fetch(String),
    Create(String),
    Update(String, FileUpdate),
    Delete(String),
}

/// In-memory stand-in for the remote per-user file store.
pub(crate) struct MemoryFileStore {
    files: Mutex<Vec<RemoteFile>>,
    calls: Mutex<Vec<FileCall>>,
    failures: Mutex<HashMap<FileOp, Failure>>,
    next_id: AtomicU64,
}

impl MemoryFileStore {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_files(&[])
    }

    pub(crate) fn with_files(files: &[(&str, &str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(id, name, content)| RemoteFile {
                        id: id.to_string(),
                        name: name.to_string(),
                        content: content.to_string(),
                        updated_at: None,
                    })
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn fail(&self, op: FileOp, failure: Failure) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(op, failure);
    }

    pub(crate) fn heal(&self, op: FileOp) {
        self.failures.lock().expect("failures lock").remove(&op);
    }

    pub(crate) fn calls(&self) -> Vec<FileCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    pub(crate) fn stored(&self, id: &str) -> Option<RemoteFile> {
        self.files
            .lock()
            .expect("files lock")
            .iter()
            .find(|file| file.id == id)
            .cloned()
    }

    pub(crate) fn stored_ids(&self) -> Vec<String> {
        self.files
            .lock()
            .expect("files lock")
            .iter()
            .map(|file| file.id.clone())
            .collect()
    }

    fn record(&self, call: FileCall, op: FileOp) -> Result<(), RemoteError> {
        self.calls.lock().expect("calls lock").push(call);
        match self.failures.lock().expect("failures lock").get(&op) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn missing(id: &str) -> RemoteError {
        RemoteError::Rejected(format!("file {id} does not exist"))
    }
}

#[async_trait]
impl RemoteFileClient for MemoryFileStore {
    async fn list_files(&self) -> Result<Vec<FileSummary>, RemoteError> {
        self.record(FileCall::List, FileOp::List)?;
        Ok(self
            .files
            .lock()
            .expect("files lock")
            .iter()
            .map(|file| FileSummary {
                id: file.id.clone(),
                name: file.name.clone(),
                updated_at: None,
            })
            .collect())
    }

    async fn fetch_file(&self, id: &str) -> Result<RemoteFile, RemoteError> {
        self.record(FileCall::Fetch(id.to_string()), FileOp::Fetch)?;
        self.stored(id).ok_or_else(|| Self::missing(id))
    }

    async fn create_file(&self, name: &str) -> Result<RemoteFile, RemoteError> {
        self.record(FileCall::Create(name.to_string()), FileOp::Create)?;
        let id = format!("remote_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let file = RemoteFile {
            id,
            name: name.to_string(),
            content: String::new(),
            updated_at: None,
        };
        self.files.lock().expect("files lock").push(file.clone());
        Ok(file)
    }

    async fn update_file(&self, id: &str, update: FileUpdate) -> Result<(), RemoteError> {
        self.record(FileCall::Update(id.to_string(), update.clone()), FileOp::Update)?;
        let mut files = self.files.lock().expect("files lock");
        let file = files
            .iter_mut()
            .find(|file| file.id == id)
            .ok_or_else(|| Self::missing(id))?;
        if let Some(name) = update.name {
            file.name = name;
        }
        if let Some(content) = update.content {
            file.content = content;
        }
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> Result<(), RemoteError> {
        self.record(FileCall::Delete(id.to_string()), FileOp::Delete)?;
        let mut files = self.files.lock().expect("files lock");
        let before = files.len();
        files.retain(|file| file.id != id);
        if files.len() == before {
            return Err(Self::missing(id));
        }
        Ok(())
    }
}

/// Auth service accepting a single password and answering status checks from a script.
pub(crate) struct ScriptedAuthClient {
    status: Mutex<Result<AuthStatus, Failure>>,
    logout_failure: Mutex<Option<Failure>>,
    logouts: AtomicUsize,
}

pub(crate) const VALID_PASSWORD: &str = "secret1";

impl ScriptedAuthClient {
    pub(crate) fn anonymous() -> Arc<Self> {
        Self::with_status(Ok(AuthStatus::default()))
    }

    pub(crate) fn logged_in(username: &str) -> Arc<Self> {
        Self::with_status(Ok(AuthStatus {
            logged_in: true,
            user: Some(User {
                username: username.to_string(),
            }),
        }))
    }

    pub(crate) fn with_status(status: Result<AuthStatus, Failure>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            logout_failure: Mutex::new(None),
            logouts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_logout(&self, failure: Failure) {
        *self.logout_failure.lock().expect("logout lock") = Some(failure);
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    fn authenticate(username: &str, password: &str) -> Result<User, RemoteError> {
        if password != VALID_PASSWORD {
            return Err(RemoteError::Rejected(
                "invalid username or password".to_string(),
            ));
        }
        Ok(User {
            username: username.to_string(),
        })
    }
}

#[async_trait]
impl AuthClient for ScriptedAuthClient {
    async fn login(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        Self::authenticate(username, password)
    }

    async fn register(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        Self::authenticate(username, password)
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        match self.logout_failure.lock().expect("logout lock").as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn status(&self) -> Result<AuthStatus, RemoteError> {
        self.status
            .lock()
            .expect("status lock")
            .clone()
            .map_err(|failure| failure.to_error())
    }
}

pub(crate) fn anonymous_manager(store: &Arc<MemoryFileStore>) -> FileSessionManager {
    FileSessionManager::new(store.clone(), FileSessionConfig::default())
}

/// Manager with remote sync enabled and the remote listing already loaded.
pub(crate) async fn authenticated_manager(store: &Arc<MemoryFileStore>) -> FileSessionManager {
    let mut manager = anonymous_manager(store);
    manager.enable_remote_sync();
    manager.load_all().await.expect("initial load");
    store.clear_calls();
    manager
}
