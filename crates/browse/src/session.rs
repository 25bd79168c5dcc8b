//! Per-user browse state and its store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use shelf_domain::error::Result;
use shelf_domain::step::{Filter, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// One user's progress through the steps.
///
/// `answers` holds the values chosen so far, in step order; a well-formed
/// session always answers a prefix of the configured step list.  `offered`
/// is the option set shown with the latest prompt and is what an answer is
/// validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    pub key: String,
    pub answers: IndexMap<StepKind, String>,
    pub offered: Vec<String>,
    pub status: SessionStatus,
    pub updated_at: DateTime<Utc>,
}

impl FlowSession {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            answers: IndexMap::new(),
            offered: Vec::new(),
            status: SessionStatus::Open,
            updated_at: Utc::now(),
        }
    }

    pub fn depth(&self) -> usize {
        self.answers.len()
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    pub fn filter(&self) -> Filter {
        self.answers
            .iter()
            .map(|(step, value)| (*step, value.clone()))
            .collect()
    }

    /// Whether `answers` covers exactly the first `depth()` of `steps`, in
    /// order.
    pub fn is_prefix_of(&self, steps: &[StepKind]) -> bool {
        self.answers.len() <= steps.len()
            && self.answers.keys().zip(steps).all(|(a, b)| a == b)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Session persistence keyed by session key.
#[async_trait]
pub trait FlowSessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<FlowSession>>;
    async fn put(&self, session: FlowSession) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-process session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, FlowSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl FlowSessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<FlowSession>> {
        Ok(self.sessions.read().get(key).cloned())
    }

    async fn put(&self, mut session: FlowSession) -> Result<()> {
        session.touch();
        self.sessions.write().insert(session.key.clone(), session);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.sessions.write().remove(key);
        Ok(())
    }
}
