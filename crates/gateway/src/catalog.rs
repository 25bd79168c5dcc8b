//! In-process catalog store backed by `catalog.json` under the state path.
//!
//! Every write is flushed to disk before it returns; the file is replaced via
//! a temp file and rename so a crash never leaves a half-written catalog.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use shelf_domain::catalog::{
    self, CatalogEntry, CatalogQuery, CatalogWriter, EntryDraft, Item, ItemRef, SearchPage,
    SourceRef, UpsertOutcome,
};
use shelf_domain::error::{Error, Result};
use shelf_domain::step::{Filter, StepKind};

pub const SEARCH_PAGE_SIZE: usize = 20;

pub struct MemoryCatalog {
    path: PathBuf,
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    /// Load or create the catalog at `state_path/catalog.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("catalog.json");
        let entries: Vec<CatalogEntry> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };

        tracing::info!(
            entries = entries.len(),
            path = %path.display(),
            "catalog loaded"
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Register a new course.  Returns `false` when a course with the same
    /// name, ignoring case and spacing, already exists.
    pub fn add_entry(&self, entry: CatalogEntry) -> Result<bool> {
        {
            let mut entries = self.entries.write();
            if entries.iter().any(|e| e.is_named(&entry.name)) {
                return Ok(false);
            }
            tracing::info!(course = %entry.name, "catalog entry added");
            entries.push(entry);
        }
        self.flush()?;
        Ok(true)
    }

    pub fn search(&self, query: &str, offset: usize, limit: usize) -> SearchPage {
        catalog::search(&self.entries.read(), query, offset, limit)
    }

    /// Write the catalog to disk.
    pub fn flush(&self) -> Result<()> {
        let json = {
            let entries = self.entries.read();
            serde_json::to_string_pretty(&*entries)
                .map_err(|e| Error::Catalog(format!("serializing catalog: {e}")))?
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(Error::Io)?;
        Ok(())
    }
}

#[async_trait]
impl CatalogQuery for MemoryCatalog {
    async fn find_options(&self, filter: &Filter, field: StepKind) -> Result<Vec<String>> {
        Ok(catalog::options_for(&self.entries.read(), filter, field))
    }

    async fn find_items(&self, filter: &Filter) -> Result<Vec<ItemRef>> {
        Ok(catalog::items_for(&self.entries.read(), filter))
    }
}

#[async_trait]
impl CatalogWriter for MemoryCatalog {
    async fn names(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().iter().map(|e| e.name.clone()).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.entries.read().iter().find(|e| e.name == name).cloned())
    }

    async fn upsert_items(&self, draft: &EntryDraft, items: Vec<Item>) -> Result<UpsertOutcome> {
        let outcome = {
            let mut entries = self.entries.write();
            let mut outcome = UpsertOutcome::default();
            let idx = match entries.iter().position(|e| e.name == draft.name) {
                Some(idx) => idx,
                None => {
                    entries.push(CatalogEntry::from_draft(draft));
                    outcome.created = true;
                    entries.len() - 1
                }
            };
            let entry = &mut entries[idx];
            for item in items {
                if entry.upsert_item(item) {
                    outcome.replaced += 1;
                } else {
                    outcome.appended += 1;
                }
            }
            outcome
        };
        self.flush()?;
        Ok(outcome)
    }

    async fn remove_item(&self, source: &SourceRef) -> Result<bool> {
        let removed = self
            .entries
            .write()
            .iter_mut()
            .fold(false, |removed, e| e.remove_item(source) || removed);
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shelf_domain::catalog::MediaKind;

    fn item(title: &str, message_id: i64) -> Item {
        Item {
            title: title.into(),
            source: SourceRef {
                chat_id: -100,
                message_id,
            },
            file_id: format!("f{message_id}"),
            media: MediaKind::Document,
            original_name: None,
            mime_type: None,
            size_bytes: None,
            extension: None,
            created_at: Utc::now(),
        }
    }

    fn draft(name: &str) -> EntryDraft {
        EntryDraft {
            name: name.into(),
            level: 1,
            term: 2,
            category: "theory".into(),
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_replaces_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryCatalog::open(dir.path()).unwrap();

        let out = store
            .upsert_items(&draft("Algebra"), vec![item("Sheet 1", 1), item("Sheet 2", 2)])
            .await
            .unwrap();
        assert!(out.created);
        assert_eq!(out.appended, 2);

        let out = store
            .upsert_items(&draft("Algebra"), vec![item("Sheet 1 (fixed)", 1)])
            .await
            .unwrap();
        assert!(!out.created);
        assert_eq!(out.replaced, 1);

        let reopened = MemoryCatalog::open(dir.path()).unwrap();
        let entry = reopened.find_by_name("Algebra").await.unwrap().unwrap();
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.items[0].title, "Sheet 1 (fixed)");
    }

    #[tokio::test]
    async fn remove_item_finds_any_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryCatalog::open(dir.path()).unwrap();
        store.upsert_items(&draft("A"), vec![item("x", 1)]).await.unwrap();
        store.upsert_items(&draft("B"), vec![item("y", 2)]).await.unwrap();

        let src = SourceRef {
            chat_id: -100,
            message_id: 2,
        };
        assert!(store.remove_item(&src).await.unwrap());
        assert!(!store.remove_item(&src).await.unwrap());
        assert!(store.find_by_name("B").await.unwrap().unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn options_and_items_follow_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryCatalog::open(dir.path()).unwrap();
        store
            .upsert_items(&draft("Algebra"), vec![item("x", 1), item("y", 2)])
            .await
            .unwrap();

        let filter = Filter::new().with(StepKind::Level, "1");
        assert_eq!(
            store.find_options(&filter, StepKind::Term).await.unwrap(),
            vec!["2"]
        );
        let filter = filter.with(StepKind::Item, "y");
        let items = store.find_items(&filter).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "y");
    }

    #[test]
    fn add_entry_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryCatalog::open(dir.path()).unwrap();
        let entry = CatalogEntry::from_draft(&draft("Physics"));
        assert!(store.add_entry(entry.clone()).unwrap());
        assert!(!store.add_entry(entry).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn add_entry_ignores_case_and_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryCatalog::open(dir.path()).unwrap();
        assert!(store
            .add_entry(CatalogEntry::from_draft(&draft("Organic Chemistry")))
            .unwrap());
        assert!(!store
            .add_entry(CatalogEntry::from_draft(&draft("organic  CHEMISTRY")))
            .unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("catalog.json"), "{not json").unwrap();
        assert!(MemoryCatalog::open(dir.path()).is_err());
    }
}
