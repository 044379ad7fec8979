#![no_main]

use libfuzzer_sys::fuzz_target;
use pseudo_remote::{parse_execution_envelope, ExecutionResponse};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(ExecutionResponse::InputRequired {
        execution_id: Some(execution_id),
        ..
    }) = parse_execution_envelope(&raw)
    {
        assert!(!execution_id.trim().is_empty());
    }
});
