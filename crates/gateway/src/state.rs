use std::sync::Arc;

use shelf_browse::{FlowEngine, MemorySessionStore, OptionCache};
use shelf_domain::config::Config;
use shelf_intake::{Aggregator, ChannelPost, IntakePipeline};

use crate::catalog::MemoryCatalog;
use crate::outbox::Outbox;
use crate::runtime::session_lock::SessionLockMap;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core**: config and the catalog store
/// - **Intake**: album aggregator and the pipeline behind it
/// - **Browse**: option cache, flow engine, sessions and their locks
/// - **Delivery**: the outbox connectors drain
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub catalog: Arc<MemoryCatalog>,

    // ── Intake ────────────────────────────────────────────────────────
    pub aggregator: Arc<Aggregator<ChannelPost>>,
    pub intake: Arc<IntakePipeline>,

    // ── Browse ────────────────────────────────────────────────────────
    pub option_cache: Arc<OptionCache>,
    pub flow: Arc<FlowEngine>,
    pub sessions: Arc<MemorySessionStore>,
    pub session_locks: Arc<SessionLockMap>,

    // ── Delivery ──────────────────────────────────────────────────────
    pub outbox: Arc<Outbox>,

    // ── Security ──────────────────────────────────────────────────────
    /// SHA-256 of the API bearer token; `None` disables auth (dev mode).
    pub api_token_hash: Option<Vec<u8>>,
}
