//! Stepwise catalog browsing: the option cache, per-user sessions and the
//! flow engine that drives them.

pub mod cache;
pub mod flow;
pub mod session;

pub use cache::{OptionCache, OptionKey};
pub use flow::{FlowEngine, Reply};
pub use session::{FlowSession, FlowSessionStore, MemorySessionStore, SessionStatus};
