//! Delivery outbox: the [`DeliveryChannel`] the browse flow hands items to.
//!
//! Connectors pick deliveries up from `GET /v1/deliveries` or the SSE feed
//! and forward the archived messages to the user.  Deliveries are appended to
//! `deliveries.jsonl` and kept in a bounded in-memory ring.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use shelf_domain::catalog::ItemRef;
use shelf_domain::delivery::DeliveryChannel;
use shelf_domain::error::{Error, Result};

const MAX_DELIVERIES: usize = 1000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxDelivery {
    pub id: Uuid,
    /// Session key of the user the items go to.
    pub destination: String,
    pub items: Vec<ItemRef>,
    pub created_at: DateTime<Utc>,
}

pub struct Outbox {
    inner: RwLock<VecDeque<OutboxDelivery>>,
    persist_path: PathBuf,
    event_tx: broadcast::Sender<OutboxDelivery>,
}

impl Outbox {
    pub fn new(state_path: &Path) -> Self {
        let persist_path = state_path.join("deliveries.jsonl");
        let (event_tx, _) = broadcast::channel(64);
        let deliveries = Self::load(&persist_path);
        Self {
            inner: RwLock::new(deliveries),
            persist_path,
            event_tx,
        }
    }

    /// Read back the most recent deliveries; unreadable lines are skipped.
    fn load(path: &Path) -> VecDeque<OutboxDelivery> {
        let Ok(data) = std::fs::read_to_string(path) else {
            return VecDeque::new();
        };
        let mut deliveries: VecDeque<OutboxDelivery> = data
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        while deliveries.len() > MAX_DELIVERIES {
            deliveries.pop_front();
        }
        if !deliveries.is_empty() {
            tracing::info!(count = deliveries.len(), "loaded deliveries from disk");
        }
        deliveries
    }

    fn persist_one(&self, delivery: &OutboxDelivery) -> Result<()> {
        use std::io::Write;

        if let Some(parent) = self.persist_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let json = serde_json::to_string(delivery)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.persist_path)
            .map_err(Error::Io)?;
        writeln!(f, "{json}").map_err(Error::Io)?;
        Ok(())
    }

    pub async fn push(&self, destination: &str, items: &[ItemRef]) -> Result<OutboxDelivery> {
        let delivery = OutboxDelivery {
            id: Uuid::new_v4(),
            destination: destination.to_string(),
            items: items.to_vec(),
            created_at: Utc::now(),
        };

        {
            let mut inner = self.inner.write().await;
            inner.push_back(delivery.clone());
            while inner.len() > MAX_DELIVERIES {
                inner.pop_front();
            }
        }

        if let Err(e) = self.persist_one(&delivery) {
            tracing::warn!(error = %e, "delivery not persisted");
        }
        let _ = self.event_tx.send(delivery.clone());
        Ok(delivery)
    }

    /// Most recent first, optionally only those bound for `destination`.
    /// The count is of every matching delivery, not just the page.
    pub async fn list(
        &self,
        destination: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> (Vec<OutboxDelivery>, usize) {
        let inner = self.inner.read().await;
        let matching: Vec<&OutboxDelivery> = inner
            .iter()
            .rev()
            .filter(|d| destination.map_or(true, |dest| d.destination == dest))
            .collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (page, total)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboxDelivery> {
        self.event_tx.subscribe()
    }
}

#[async_trait]
impl DeliveryChannel for Outbox {
    async fn deliver_items(&self, destination: &str, items: &[ItemRef]) -> Result<()> {
        self.push(destination, items).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_domain::catalog::{MediaKind, SourceRef};

    fn item(message_id: i64) -> ItemRef {
        ItemRef {
            source: SourceRef {
                chat_id: -100,
                message_id,
            },
            title: format!("item {message_id}"),
            file_id: format!("f{message_id}"),
            media: MediaKind::Document,
        }
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::new(dir.path());
        for i in 0..3 {
            outbox.deliver_items("peer:1", &[item(i)]).await.unwrap();
        }
        let (page, total) = outbox.list(None, 2, 0).await;
        assert_eq!(total, 3);
        assert_eq!(page[0].items[0].source.message_id, 2);
        assert_eq!(page[1].items[0].source.message_id, 1);

        let (rest, _) = outbox.list(None, 2, 2).await;
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_destination() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::new(dir.path());
        outbox.deliver_items("peer:1", &[item(1)]).await.unwrap();
        outbox.deliver_items("peer:2", &[item(2)]).await.unwrap();
        outbox.deliver_items("peer:1", &[item(3)]).await.unwrap();

        let (page, total) = outbox.list(Some("peer:1"), 10, 0).await;
        assert_eq!(total, 2);
        assert!(page.iter().all(|d| d.destination == "peer:1"));
        assert_eq!(page[0].items[0].source.message_id, 3);
    }

    #[tokio::test]
    async fn deliveries_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let outbox = Outbox::new(dir.path());
            outbox.deliver_items("peer:1", &[item(1), item(2)]).await.unwrap();
        }
        let outbox = Outbox::new(dir.path());
        let (page, total) = outbox.list(None, 10, 0).await;
        assert_eq!(total, 1);
        assert_eq!(page[0].items.len(), 2);
        assert_eq!(page[0].destination, "peer:1");
    }

    #[tokio::test]
    async fn subscribers_see_new_deliveries() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = Outbox::new(dir.path());
        let mut rx = outbox.subscribe();
        let sent = outbox.push("peer:9", &[item(5)]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().id, sent.id);
    }
}
