use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pseudo_core::CooperativeCancellationToken;
use pseudo_remote::{
    ContinueRequest, ExecutionResponse, RemoteError, RemoteExecutionClient, RunRequest,
};

use crate::{ErrorClass, SessionError};

/// Error reported to the UI when the user stops a running program.
pub const EXECUTION_ABORTED_MESSAGE: &str = "execution aborted by user";
/// Status notice shown when the user declines an input request.
pub const INPUT_DECLINED_NOTICE: &str = "cancelled";

const MISSING_EXECUTION_ID_MESSAGE: &str = "service requested input without an execution id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Lifecycle states of one execution session.
pub enum ExecutionStatus {
    #[default]
    Idle,
    Running,
    AwaitingInput,
    Cancelled,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    /// Running or waiting on the user; a new run is refused while active.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::AwaitingInput)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }

    /// Status-bar text for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "ready",
            Self::Running => "running...",
            Self::AwaitingInput => "waiting for input",
            Self::Cancelled => "stopped",
            Self::Succeeded => "run succeeded",
            Self::Failed => "run error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub strict: bool,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one network round-trip, as seen by the caller.
pub enum ExecutionOutcome {
    Succeeded { output: Vec<String> },
    AwaitingInput { prompt: String },
    Failed { message: String, output: Vec<String> },
    Cancelled,
}

impl ExecutionOutcome {
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Succeeded { .. } => ExecutionStatus::Succeeded,
            Self::AwaitingInput { .. } => ExecutionStatus::AwaitingInput,
            Self::Failed { .. } => ExecutionStatus::Failed,
            Self::Cancelled => ExecutionStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Renderable view of the session for the UI layer.
pub struct ExecutionSnapshot {
    pub status: ExecutionStatus,
    pub execution_id: Option<String>,
    pub prompt: Option<String>,
    pub output: Vec<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[async_trait]
/// Collaborator that asks the user for a value while a program waits on input.
pub trait InputPrompter: Send + Sync {
    /// Returns `None` when the user declines.
    async fn prompt(&self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Default)]
struct ExecutionState {
    status: ExecutionStatus,
    execution_id: Option<String>,
    prompt: Option<String>,
    output: Vec<String>,
    error: Option<String>,
    notice: Option<String>,
    token: CooperativeCancellationToken,
    generation: u64,
    in_flight: usize,
}

impl ExecutionState {
    fn clear_results(&mut self) {
        self.execution_id = None;
        self.prompt = None;
        self.output.clear();
        self.error = None;
        self.notice = None;
    }

    fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            status: self.status,
            execution_id: self.execution_id.clone(),
            prompt: self.prompt.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
            notice: self.notice.clone(),
        }
    }

    fn fail(&mut self, message: String, output: Vec<String>) -> ExecutionOutcome {
        self.status = ExecutionStatus::Failed;
        self.error = Some(message.clone());
        self.output = output.clone();
        ExecutionOutcome::Failed { message, output }
    }

    fn mark_cancelled(&mut self) -> ExecutionOutcome {
        self.token.cancel();
        self.status = ExecutionStatus::Cancelled;
        self.prompt = None;
        ExecutionOutcome::Cancelled
    }
}

/// Releases the in-flight slot if a request future is dropped before it settles.
struct InFlightGuard<'a> {
    session: &'a ExecutionSession,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.session.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
    }
}

/// Single-flight state machine for one remote program run and its input round-trips.
///
/// All methods take `&self` so the UI can hold the session behind an `Arc` and
/// call [`cancel`](Self::cancel) while a run or continuation is awaiting the
/// network. The internal lock is never held across an await point.
pub struct ExecutionSession {
    client: Arc<dyn RemoteExecutionClient>,
    state: Mutex<ExecutionState>,
}

impl ExecutionSession {
    pub fn new(client: Arc<dyn RemoteExecutionClient>) -> Self {
        Self {
            client,
            state: Mutex::new(ExecutionState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ExecutionStatus {
        self.lock_state().status
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.lock_state().snapshot()
    }

    /// Submits `source` for a fresh run.
    ///
    /// A terminal session is reset to Idle first; an active one is refused
    /// with [`SessionError::ExecutionBusy`].
    pub async fn start(
        &self,
        source: &str,
        options: RunOptions,
    ) -> Result<ExecutionOutcome, SessionError> {
        let code = source.trim();
        let (generation, token) = {
            let mut state = self.lock_state();
            if state.status.is_active() || state.in_flight > 0 {
                return Err(SessionError::ExecutionBusy);
            }
            if code.is_empty() {
                return Err(SessionError::EmptySource);
            }
            if state.status.is_terminal() {
                tracing::debug!(from = state.status.label(), "execution session reset to idle");
            }
            state.clear_results();
            state.generation = state.generation.wrapping_add(1);
            state.token = CooperativeCancellationToken::new();
            state.status = ExecutionStatus::Running;
            state.in_flight += 1;
            (state.generation, state.token.clone())
        };
        tracing::debug!(
            generation,
            strict = options.strict,
            "execution session running"
        );

        let guard = InFlightGuard {
            session: self,
            armed: true,
        };
        let response = self
            .client
            .run(
                RunRequest {
                    code: code.to_string(),
                    debug: options.debug,
                    strict: options.strict,
                },
                &token,
            )
            .await;
        Ok(self.settle(guard, generation, &token, None, response))
    }

    /// Answers the pending input request; `None` means the user declined.
    pub async fn submit_input(
        &self,
        value: Option<String>,
    ) -> Result<ExecutionOutcome, SessionError> {
        let (generation, token, execution_id, input) = {
            let mut state = self.lock_state();
            if state.status != ExecutionStatus::AwaitingInput || state.in_flight > 0 {
                return Err(SessionError::NotAwaitingInput);
            }
            let Some(execution_id) = state.execution_id.clone() else {
                return Err(SessionError::NotAwaitingInput);
            };
            let Some(input) = value else {
                state.notice = Some(INPUT_DECLINED_NOTICE.to_string());
                tracing::debug!(generation = state.generation, "input declined");
                return Ok(state.mark_cancelled());
            };
            state.status = ExecutionStatus::Running;
            state.prompt = None;
            state.in_flight += 1;
            (state.generation, state.token.clone(), execution_id, input)
        };

        let guard = InFlightGuard {
            session: self,
            armed: true,
        };
        let response = self
            .client
            .continue_execution(
                ContinueRequest {
                    execution_id: execution_id.clone(),
                    input,
                },
                &token,
            )
            .await;
        Ok(self.settle(guard, generation, &token, Some(&execution_id), response))
    }

    /// Stops an active run. Returns false (and does nothing) when idle or terminal.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock_state();
        if !state.status.is_active() {
            return false;
        }
        state.mark_cancelled();
        state.error = Some(EXECUTION_ABORTED_MESSAGE.to_string());
        state.notice = Some(EXECUTION_ABORTED_MESSAGE.to_string());
        tracing::debug!(generation = state.generation, "execution cancelled by user");
        true
    }

    /// Clears a finished run back to Idle. Active sessions are left untouched.
    pub fn reset(&self) -> bool {
        let mut state = self.lock_state();
        if state.status.is_active() {
            return false;
        }
        state.clear_results();
        state.status = ExecutionStatus::Idle;
        true
    }

    /// Runs `source` to a terminal outcome, asking `prompter` for every input.
    ///
    /// Input rounds are processed in a loop, so programs issuing many input
    /// requests do not grow the call stack. A [`cancel`](Self::cancel) while the
    /// prompter is waiting ends the run immediately.
    pub async fn run_interactive(
        &self,
        source: &str,
        options: RunOptions,
        prompter: &dyn InputPrompter,
    ) -> Result<ExecutionOutcome, SessionError> {
        let mut outcome = self.start(source, options).await?;
        loop {
            let prompt = match outcome {
                ExecutionOutcome::AwaitingInput { prompt } => prompt,
                finished => return Ok(finished),
            };
            let token = self.lock_state().token.clone();
            let value = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(ExecutionOutcome::Cancelled),
                value = prompter.prompt(&prompt) => value,
            };
            outcome = match self.submit_input(value).await {
                Err(SessionError::NotAwaitingInput) => ExecutionOutcome::Cancelled,
                other => other?,
            };
        }
    }

    fn settle(
        &self,
        mut guard: InFlightGuard<'_>,
        generation: u64,
        token: &CooperativeCancellationToken,
        expected_execution_id: Option<&str>,
        response: Result<ExecutionResponse, RemoteError>,
    ) -> ExecutionOutcome {
        let mut state = self.lock_state();
        state.in_flight = state.in_flight.saturating_sub(1);
        guard.armed = false;

        if state.generation != generation
            || token.is_cancelled()
            || state.status != ExecutionStatus::Running
        {
            tracing::debug!(
                generation,
                current_generation = state.generation,
                error_class = ErrorClass::ProtocolViolation.as_str(),
                "discarding stale execution response"
            );
            return ExecutionOutcome::Cancelled;
        }

        match response {
            Ok(ExecutionResponse::Success { output }) => {
                state.status = ExecutionStatus::Succeeded;
                state.output = output.clone();
                tracing::debug!(generation, lines = output.len(), "execution succeeded");
                ExecutionOutcome::Succeeded { output }
            }
            Ok(ExecutionResponse::InputRequired {
                prompt,
                execution_id,
            }) => {
                let execution_id = match (expected_execution_id, execution_id) {
                    (Some(expected), Some(received)) if expected != received => {
                        tracing::warn!(
                            expected,
                            received = received.as_str(),
                            error_class = ErrorClass::ProtocolViolation.as_str(),
                            "discarding input request for a different execution"
                        );
                        return state.mark_cancelled();
                    }
                    (_, Some(received)) => received,
                    (Some(expected), None) => expected.to_string(),
                    (None, None) => {
                        return state.fail(MISSING_EXECUTION_ID_MESSAGE.to_string(), Vec::new());
                    }
                };
                tracing::debug!(
                    generation,
                    execution_id = execution_id.as_str(),
                    "execution awaiting input"
                );
                state.status = ExecutionStatus::AwaitingInput;
                state.execution_id = Some(execution_id);
                state.prompt = Some(prompt.clone());
                ExecutionOutcome::AwaitingInput { prompt }
            }
            Ok(ExecutionResponse::Error { error, output }) => {
                tracing::debug!(generation, "execution failed");
                state.fail(error, output)
            }
            Err(RemoteError::Cancelled) => state.mark_cancelled(),
            Err(RemoteError::Rejected(message)) => state.fail(message, Vec::new()),
            Err(error) => {
                tracing::debug!(
                    generation,
                    error_class = ErrorClass::NetworkFailure.as_str(),
                    %error,
                    "execution request failed"
                );
                state.fail(format!("network error: {error}"), Vec::new())
            }
        }
    }
}
