//! Remote service boundary for the pseudocode editor.
//!
//! Defines the wire types and client traits the session core consumes, plus a
//! reqwest-backed implementation that talks to the editor's HTTP API.
mod client;
mod envelope;
mod request_id;
mod types;

pub use client::{HttpApiClient, RemoteConfig, REQUEST_ID_HEADER};
pub use envelope::{parse_execution_envelope, parse_success_envelope};
pub use request_id::new_request_id;
pub use types::{
    AuthClient, AuthStatus, ContinueRequest, ExampleProgram, ExecutionResponse, FileSummary,
    FileUpdate, HealthReport, RemoteError, RemoteExecutionClient, RemoteFile, RemoteFileClient,
    RunRequest, User,
};
