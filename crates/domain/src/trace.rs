use serde::Serialize;

/// Structured trace events emitted across all Shelf crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BatchFlushed {
        group_key: Option<String>,
        size: usize,
        waited_ms: u64,
    },
    NameResolved {
        candidate: String,
        resolved: String,
        score: u8,
    },
    CatalogUpserted {
        course: String,
        created: bool,
        items: usize,
    },
    CatalogItemRemoved {
        chat_id: i64,
        message_id: i64,
    },
    FlowStep {
        session_key: String,
        step: usize,
        options: usize,
    },
    ItemsDelivered {
        destination: String,
        count: usize,
    },
    CacheInvalidated {
        scope: String,
        entries: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "shelf_event");
    }
}
