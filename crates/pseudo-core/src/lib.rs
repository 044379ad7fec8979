//! Foundational primitives shared across the pseudocode editor crates.
//!
//! Provides the cooperative cancellation token threaded through remote calls
//! and the local identifier helpers used for client-side documents and uploads.

pub mod cancellation;
pub mod ids;

pub use cancellation::CooperativeCancellationToken;
pub use ids::{current_unix_timestamp_ms, next_local_id};
