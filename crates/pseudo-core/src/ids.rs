use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Builds a client-side identifier of the form `<prefix>_<unix-ms>_<counter>`.
pub fn next_local_id(prefix: &str) -> String {
    let count = LOCAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{count}", current_unix_timestamp_ms())
}
