//! Catalog model and the store contracts the browse flow and the intake
//! pipeline talk to.
//!
//! The query helpers at the bottom are pure functions over a slice of
//! entries so every store implementation answers option and item queries the
//! same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::step::{Filter, StepKind};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The archive message that carries a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Document,
    Video,
    Audio,
    Photo,
    Voice,
}

/// A single file filed under a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub source: SourceRef,
    pub file_id: String,
    pub media: MediaKind,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub extension: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn to_ref(&self) -> ItemRef {
        ItemRef {
            source: self.source,
            title: self.title.clone(),
            file_id: self.file_id.clone(),
            media: self.media,
        }
    }
}

/// What a delivery channel needs to hand an item to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub source: SourceRef,
    pub title: String,
    pub file_id: String,
    pub media: MediaKind,
}

/// One course in the catalog.  `name` is the canonical join key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub tutor: Option<String>,
    pub level: u8,
    pub term: u8,
    pub category: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Lowercase and collapse whitespace.  Two course names that normalize the
/// same refer to the same course.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl CatalogEntry {
    /// Whether `name` refers to this course, ignoring case and spacing.
    pub fn is_named(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn from_draft(draft: &EntryDraft) -> Self {
        Self {
            name: draft.name.clone(),
            tutor: None,
            level: draft.level,
            term: draft.term,
            category: draft.category.clone(),
            items: Vec::new(),
        }
    }

    /// Whether every answer in `filter` holds for this entry.
    pub fn matches(&self, filter: &Filter) -> bool {
        filter.iter().all(|(step, value)| match step {
            StepKind::Level => self.level.to_string() == value,
            StepKind::Term => self.term.to_string() == value,
            StepKind::Category => self.category == value,
            StepKind::Course => self.name == value,
            StepKind::Item => self.items.iter().any(|i| i.title == value),
        })
    }

    /// Values this entry contributes to the options of `field`.
    pub fn values_of(&self, field: StepKind) -> Vec<String> {
        match field {
            StepKind::Level => vec![self.level.to_string()],
            StepKind::Term => vec![self.term.to_string()],
            StepKind::Category => vec![self.category.clone()],
            StepKind::Course => vec![self.name.clone()],
            StepKind::Item => self.items.iter().map(|i| i.title.clone()).collect(),
        }
    }

    /// Insert or replace an item keyed by its source.  Returns `true` when an
    /// existing item was replaced.
    pub fn upsert_item(&mut self, item: Item) -> bool {
        match self.items.iter_mut().find(|i| i.source == item.source) {
            Some(existing) => {
                *existing = item;
                true
            }
            None => {
                self.items.push(item);
                false
            }
        }
    }

    pub fn remove_item(&mut self, source: &SourceRef) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.source != *source);
        self.items.len() != before
    }
}

/// Attributes used to create an entry when intake meets an unknown course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub name: String,
    pub level: u8,
    pub term: u8,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
    pub replaced: usize,
    pub appended: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store contracts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read side used by the browse flow.  Read-mostly and idempotent.
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    /// Distinct values for `field` among entries matching `filter`.
    async fn find_options(&self, filter: &Filter, field: StepKind) -> Result<Vec<String>>;

    /// Items matching a complete answer set.
    async fn find_items(&self, filter: &Filter) -> Result<Vec<ItemRef>>;
}

/// Write side used by the intake pipeline.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    /// Canonical names of every entry, in catalog order.
    async fn names(&self) -> Result<Vec<String>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<CatalogEntry>>;

    /// Upsert `items` into the entry named `draft.name`, creating the entry
    /// from `draft` when it does not exist.
    async fn upsert_items(&self, draft: &EntryDraft, items: Vec<Item>) -> Result<UpsertOutcome>;

    /// Remove the item carried by `source`, wherever it is filed.
    async fn remove_item(&self, source: &SourceRef) -> Result<bool>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pure query helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Distinct option values for `field`, first-seen order.  Level and term are
/// sorted numerically.
pub fn options_for(entries: &[CatalogEntry], filter: &Filter, field: StepKind) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in entries.iter().filter(|e| e.matches(filter)) {
        for value in entry.values_of(field) {
            if !out.contains(&value) {
                out.push(value);
            }
        }
    }
    if matches!(field, StepKind::Level | StepKind::Term) {
        out.sort_by_key(|v| v.parse::<u32>().unwrap_or(u32::MAX));
    }
    out
}

/// Items of every matching entry.  When the filter names an item, only items
/// with that title are returned.
pub fn items_for(entries: &[CatalogEntry], filter: &Filter) -> Vec<ItemRef> {
    let wanted = filter.get(StepKind::Item);
    entries
        .iter()
        .filter(|e| e.matches(filter))
        .flat_map(|e| e.items.iter())
        .filter(|i| wanted.map_or(true, |t| i.title == t))
        .map(Item::to_ref)
        .collect()
}

/// One row of a free-text catalog search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub course: String,
    pub tutor: Option<String>,
    pub level: u8,
    pub term: u8,
    pub title: String,
    pub file_id: String,
    pub original_name: Option<String>,
    pub media: MediaKind,
    #[serde(skip)]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

/// Case-insensitive substring search over course name, tutor, item title and
/// original file name.  Sorted by title, newest first within a title.
pub fn search(entries: &[CatalogEntry], query: &str, offset: usize, limit: usize) -> SearchPage {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchPage {
            hits: Vec::new(),
            next_offset: None,
        };
    }

    let contains = |s: &str| s.to_lowercase().contains(&needle);
    let mut hits: Vec<SearchHit> = Vec::new();
    for entry in entries {
        let entry_hit = contains(&entry.name) || entry.tutor.as_deref().is_some_and(contains);
        for item in &entry.items {
            let item_hit = contains(&item.title)
                || item.original_name.as_deref().is_some_and(contains);
            if entry_hit || item_hit {
                hits.push(SearchHit {
                    course: entry.name.clone(),
                    tutor: entry.tutor.clone(),
                    level: entry.level,
                    term: entry.term,
                    title: item.title.clone(),
                    file_id: item.file_id.clone(),
                    original_name: item.original_name.clone(),
                    media: item.media,
                    created_at: item.created_at,
                });
            }
        }
    }

    hits.sort_by(|a, b| a.title.cmp(&b.title).then(b.created_at.cmp(&a.created_at)));

    let page: Vec<SearchHit> = hits.into_iter().skip(offset).take(limit).collect();
    let next_offset = (limit > 0 && page.len() >= limit).then_some(offset + limit);
    SearchPage {
        hits: page,
        next_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, message_id: i64) -> Item {
        Item {
            title: title.into(),
            source: SourceRef {
                chat_id: -100,
                message_id,
            },
            file_id: format!("file-{message_id}"),
            media: MediaKind::Document,
            original_name: Some(format!("{title}.pdf")),
            mime_type: Some("application/pdf".into()),
            size_bytes: Some(1024),
            extension: Some("pdf".into()),
            created_at: Utc::now(),
        }
    }

    fn entry(name: &str, level: u8, term: u8, category: &str, items: Vec<Item>) -> CatalogEntry {
        CatalogEntry {
            name: name.into(),
            tutor: None,
            level,
            term,
            category: category.into(),
            items,
        }
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            entry("Physics", 2, 1, "theory", vec![item("Lecture 1", 1)]),
            entry("Algebra", 1, 2, "theory", vec![item("Sheet 1", 2), item("Sheet 2", 3)]),
            entry("Chemistry Lab", 1, 2, "practical", vec![item("Lab 1", 4)]),
            entry("Calculus", 1, 1, "theory", vec![]),
        ]
    }

    #[test]
    fn names_match_ignoring_case_and_spacing() {
        let e = entry("Organic Chemistry", 1, 1, "theory", vec![]);
        assert!(e.is_named("organic  chemistry"));
        assert!(e.is_named(" ORGANIC Chemistry "));
        assert!(!e.is_named("Organic Chemistry II"));
        assert_eq!(normalize_name("  A   b "), "a b");
    }

    #[test]
    fn level_options_are_numeric_and_distinct() {
        let opts = options_for(&catalog(), &Filter::new(), StepKind::Level);
        assert_eq!(opts, vec!["1", "2"]);
    }

    #[test]
    fn options_respect_filter_prefix() {
        let filter = Filter::new()
            .with(StepKind::Level, "1")
            .with(StepKind::Term, "2");
        let cats = options_for(&catalog(), &filter, StepKind::Category);
        assert_eq!(cats, vec!["theory", "practical"]);

        let filter = filter.with(StepKind::Category, "theory");
        let courses = options_for(&catalog(), &filter, StepKind::Course);
        assert_eq!(courses, vec!["Algebra"]);
    }

    #[test]
    fn item_options_follow_entry_order() {
        let filter = Filter::new().with(StepKind::Course, "Algebra");
        let titles = options_for(&catalog(), &filter, StepKind::Item);
        assert_eq!(titles, vec!["Sheet 1", "Sheet 2"]);
    }

    #[test]
    fn items_for_selects_named_item_only() {
        let filter = Filter::new()
            .with(StepKind::Course, "Algebra")
            .with(StepKind::Item, "Sheet 2");
        let items = items_for(&catalog(), &filter);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source.message_id, 3);
    }

    #[test]
    fn upsert_replaces_by_source() {
        let mut e = entry("Algebra", 1, 2, "theory", vec![item("Sheet 1", 2)]);
        assert!(e.upsert_item(item("Sheet 1 (fixed)", 2)));
        assert!(!e.upsert_item(item("Sheet 3", 9)));
        assert_eq!(e.items.len(), 2);
        assert_eq!(e.items[0].title, "Sheet 1 (fixed)");
    }

    #[test]
    fn remove_item_reports_change() {
        let mut e = entry("Algebra", 1, 2, "theory", vec![item("Sheet 1", 2)]);
        let src = SourceRef {
            chat_id: -100,
            message_id: 2,
        };
        assert!(e.remove_item(&src));
        assert!(!e.remove_item(&src));
    }

    #[test]
    fn search_matches_course_and_file_name() {
        let page = search(&catalog(), "lab", 0, 20);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].course, "Chemistry Lab");

        let page = search(&catalog(), "SHEET 2.PDF", 0, 20);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].title, "Sheet 2");
    }

    #[test]
    fn search_pages_and_reports_next_offset() {
        let page = search(&catalog(), "e", 0, 2);
        assert_eq!(page.hits.len(), 2);
        assert_eq!(page.next_offset, Some(2));

        let rest = search(&catalog(), "e", 2, 2);
        assert!(rest.hits.len() <= 2);
    }

    #[test]
    fn blank_search_returns_nothing() {
        let page = search(&catalog(), "   ", 0, 20);
        assert!(page.hits.is_empty());
        assert!(page.next_offset.is_none());
    }
}
