use pseudo_remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Coarse failure categories used for user messaging and log fields.
pub enum ErrorClass {
    /// Transport or parse failure on a remote call; never retried automatically.
    NetworkFailure,
    /// Structured refusal from the service, surfaced verbatim.
    RemoteRejection,
    /// Stale or mismatched execution response; discarded, never surfaced.
    ProtocolViolation,
    /// Locally refused request that would break a session invariant.
    InvariantViolation,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::RemoteRejection => "remote_rejection",
            Self::ProtocolViolation => "protocol_violation",
            Self::InvariantViolation => "invariant_violation",
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates failures surfaced by session operations.
pub enum SessionError {
    #[error("an execution is already in progress")]
    ExecutionBusy,
    #[error("please enter code before running")]
    EmptySource,
    #[error("execution is not waiting for input")]
    NotAwaitingInput,
    #[error("at least one file must be kept")]
    LastFile,
    #[error("file '{0}' does not exist")]
    UnknownFile(String),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("only .txt files can be uploaded, got '{0}'")]
    UnsupportedUpload(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Remote(RemoteError::Rejected(_)) => ErrorClass::RemoteRejection,
            Self::Remote(_) => ErrorClass::NetworkFailure,
            Self::ExecutionBusy
            | Self::EmptySource
            | Self::NotAwaitingInput
            | Self::LastFile
            | Self::UnknownFile(_)
            | Self::PasswordMismatch
            | Self::UnsupportedUpload(_) => ErrorClass::InvariantViolation,
        }
    }
}
