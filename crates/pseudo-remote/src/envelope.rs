use serde::Deserialize;
use serde_json::Value;

use crate::{ExecutionResponse, RemoteError};

const DEFAULT_EXECUTION_ERROR: &str = "execution failed";
const DEFAULT_REJECTION: &str = "request rejected by service";

#[derive(Debug, Default, Deserialize)]
struct RawExecutionEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses a run/continue response body into its three-way outcome.
///
/// A body without `status` but with `success: false` is the service's early
/// rejection (for example empty code) and maps to an error outcome.
pub fn parse_execution_envelope(raw: &str) -> Result<ExecutionResponse, RemoteError> {
    let envelope: RawExecutionEnvelope = serde_json::from_str(raw)?;
    let output = envelope.output.unwrap_or_default();
    match envelope.status.as_deref().map(str::trim) {
        Some("success") => Ok(ExecutionResponse::Success { output }),
        Some("input_required") => Ok(ExecutionResponse::InputRequired {
            prompt: envelope.prompt.unwrap_or_default(),
            execution_id: envelope
                .execution_id
                .filter(|execution_id| !execution_id.trim().is_empty()),
        }),
        Some("error") => Ok(ExecutionResponse::Error {
            error: envelope
                .error
                .unwrap_or_else(|| DEFAULT_EXECUTION_ERROR.to_string()),
            output,
        }),
        Some(other) => Err(RemoteError::InvalidResponse(format!(
            "unknown execution status '{other}'"
        ))),
        None if envelope.success == Some(false) => Ok(ExecutionResponse::Error {
            error: envelope
                .error
                .unwrap_or_else(|| DEFAULT_EXECUTION_ERROR.to_string()),
            output,
        }),
        None => Err(RemoteError::InvalidResponse(
            "execution response is missing a status".to_string(),
        )),
    }
}

/// Unwraps a `{success, ..., error}` envelope used by file and auth endpoints.
///
/// `success: false` is a rejection regardless of HTTP status; otherwise a
/// non-2xx status is reported with the raw body.
pub fn parse_success_envelope(status: u16, raw: &str) -> Result<Value, RemoteError> {
    let is_success_status = (200..300).contains(&status);
    if raw.trim().is_empty() {
        if is_success_status {
            return Ok(Value::Null);
        }
        return Err(RemoteError::HttpStatus {
            status,
            body: String::new(),
        });
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) if !is_success_status => {
            return Err(RemoteError::HttpStatus {
                status,
                body: raw.to_string(),
            });
        }
        Err(error) => return Err(RemoteError::Serde(error)),
    };

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(DEFAULT_REJECTION);
        return Err(RemoteError::Rejected(message.to_string()));
    }

    if !is_success_status {
        return Err(RemoteError::HttpStatus {
            status,
            body: raw.to_string(),
        });
    }
    Ok(value)
}
