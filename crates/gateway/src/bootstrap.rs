//! AppState construction and background tasks, shared by `serve` and the
//! integration tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};

use shelf_browse::{FlowEngine, MemorySessionStore, OptionCache};
use shelf_domain::caption::CaptionParser;
use shelf_domain::config::{Config, ConfigSeverity};
use shelf_intake::{Aggregator, IntakePipeline};

use crate::catalog::MemoryCatalog;
use crate::outbox::Outbox;
use crate::runtime::session_lock::SessionLockMap;
use crate::state::AppState;

/// Validate config, open the stores and wire intake and browse together.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Catalog ──────────────────────────────────────────────────────
    let state_path = &config.storage.state_path;
    let catalog = Arc::new(
        MemoryCatalog::open(state_path)
            .with_context(|| format!("opening catalog under {}", state_path.display()))?,
    );

    // ── Browse ───────────────────────────────────────────────────────
    let option_cache = Arc::new(OptionCache::from_config(&config.browse));
    let outbox = Arc::new(Outbox::new(state_path));
    let flow = Arc::new(FlowEngine::new(
        &config.browse,
        catalog.clone(),
        option_cache.clone(),
        outbox.clone(),
    ));
    tracing::info!(steps = ?config.browse.steps, "browse flow ready");

    // ── Intake ───────────────────────────────────────────────────────
    let parser = CaptionParser::new().context("compiling caption pattern")?;
    let cache_for_hook = option_cache.clone();
    let intake = Arc::new(
        IntakePipeline::new(catalog.clone(), parser, &config.intake).with_on_write(Arc::new(
            move || {
                cache_for_hook.invalidate(None);
            },
        )),
    );
    let aggregator = Arc::new(Aggregator::new(
        Duration::from_millis(config.intake.quiescence_ms),
        intake.clone(),
    ));
    tracing::info!(
        quiescence_ms = config.intake.quiescence_ms,
        fuzzy_threshold = config.intake.fuzzy_threshold,
        "intake pipeline ready"
    );

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!("API bearer-token auth DISABLED; set {env_var} to enable it");
                None
            }
        }
    };

    Ok(AppState {
        config,
        catalog,
        aggregator,
        intake,
        option_cache,
        flow,
        sessions: Arc::new(MemorySessionStore::new()),
        session_locks: Arc::new(SessionLockMap::new()),
        outbox,
        api_token_hash,
    })
}

pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic lock pruning ────────────────────────────────────────
    let locks = state.session_locks.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            locks.prune_idle();
        }
    });
}
