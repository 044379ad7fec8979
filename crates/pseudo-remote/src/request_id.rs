use std::sync::atomic::{AtomicU64, Ordering};

use pseudo_core::current_unix_timestamp_ms;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn new_request_id() -> String {
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("pseudo-rs-{}-{count}", current_unix_timestamp_ms())
}
