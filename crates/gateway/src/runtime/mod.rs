//! Per-session concurrency control for the private-chat flow.

pub mod session_lock;
