//! Intake pipeline: flushed archive batches → parsed items → catalog upserts.
//!
//! Also handles the curator commands posted in the archive channel: a reply
//! containing `del` removes the replied-to file, a reply containing `edit`
//! re-files it from its (edited) caption, and a direct caption edit does the
//! same without the reply.

use std::sync::Arc;

use async_trait::async_trait;

use shelf_domain::caption::{CaptionFields, CaptionParser};
use shelf_domain::catalog::{CatalogWriter, EntryDraft, Item, SourceRef, UpsertOutcome};
use shelf_domain::config::IntakeConfig;
use shelf_domain::error::Result;
use shelf_domain::trace::TraceEvent;

use crate::aggregator::{Batch, BatchSink};
use crate::post::ChannelPost;
use crate::resolver;

/// Called after every successful catalog write.
pub type OnWrite = Arc<dyn Fn() + Send + Sync>;

/// What one batch did to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    /// Posts that became catalog items.
    pub accepted: usize,
    /// Posts dropped for lacking a file or a parseable caption.
    pub skipped: usize,
    pub courses: Vec<CourseWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseWrite {
    pub course: String,
    pub outcome: UpsertOutcome,
}

/// A curator instruction carried by a reply in the archive channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CuratorCommand {
    Delete(SourceRef),
    Edit(ChannelPost),
}

impl CuratorCommand {
    /// Recognize a command reply.  The replied-to post must carry a file;
    /// `del` is checked before `edit`.
    pub fn parse(post: &ChannelPost) -> Option<Self> {
        let target = post.reply_to.as_deref()?;
        target.media.as_ref()?;
        let text = post.text.as_deref()?.to_lowercase();
        if text.contains("del") {
            Some(Self::Delete(target.source()))
        } else if text.contains("edit") {
            Some(Self::Edit(target.clone()))
        } else {
            None
        }
    }
}

pub struct IntakePipeline {
    catalog: Arc<dyn CatalogWriter>,
    parser: CaptionParser,
    fuzzy_threshold: u8,
    default_category: String,
    on_write: Option<OnWrite>,
}

impl IntakePipeline {
    pub fn new(catalog: Arc<dyn CatalogWriter>, parser: CaptionParser, config: &IntakeConfig) -> Self {
        Self {
            catalog,
            parser,
            fuzzy_threshold: config.fuzzy_threshold,
            default_category: config.default_category.clone(),
            on_write: None,
        }
    }

    pub fn with_on_write(mut self, hook: OnWrite) -> Self {
        self.on_write = Some(hook);
        self
    }

    /// File every post of one batch.
    ///
    /// Posts without a caption of their own borrow the batch's last caption,
    /// since albums usually carry a single caption.  Items are grouped by
    /// course title and each group is upserted once.
    pub async fn ingest(&self, posts: &[ChannelPost]) -> Result<IntakeReport> {
        let fallback = posts
            .last()
            .and_then(|p| p.caption.as_deref())
            .unwrap_or("");

        let mut report = IntakeReport::default();
        let mut groups: Vec<(CaptionFields, Vec<Item>)> = Vec::new();

        for post in posts {
            let caption = post.caption.as_deref().unwrap_or(fallback);
            let parsed = self
                .parser
                .parse(caption)
                .and_then(|fields| post.to_item(&fields).map(|item| (fields, item)));
            let Some((fields, item)) = parsed else {
                tracing::debug!(message_id = post.message_id, "post skipped");
                report.skipped += 1;
                continue;
            };
            report.accepted += 1;
            match groups.iter_mut().find(|(f, _)| f.course == fields.course) {
                Some((_, items)) => items.push(item),
                None => groups.push((fields, vec![item])),
            }
        }

        if groups.is_empty() {
            return Ok(report);
        }

        let mut known = self.catalog.names().await?;
        for (fields, items) in groups {
            let course = self.file_items(&known, &fields, items).await?;
            if course.outcome.created {
                known.push(course.course.clone());
            }
            report.courses.push(course);
        }
        self.notify_write();
        Ok(report)
    }

    /// Re-file a single post from its current caption.  Returns `false` when
    /// the post carries no file or its caption does not parse.
    pub async fn apply_edit(&self, post: &ChannelPost) -> Result<bool> {
        let Some(fields) = post.caption.as_deref().and_then(|c| self.parser.parse(c)) else {
            return Ok(false);
        };
        let Some(item) = post.to_item(&fields) else {
            return Ok(false);
        };
        let known = self.catalog.names().await?;
        self.file_items(&known, &fields, vec![item]).await?;
        self.notify_write();
        Ok(true)
    }

    /// Remove the item carried by `source`.  Returns whether anything was
    /// removed.
    pub async fn remove(&self, source: SourceRef) -> Result<bool> {
        let removed = self.catalog.remove_item(&source).await?;
        if removed {
            TraceEvent::CatalogItemRemoved {
                chat_id: source.chat_id,
                message_id: source.message_id,
            }
            .emit();
            self.notify_write();
        }
        Ok(removed)
    }

    pub async fn run_command(&self, command: CuratorCommand) -> Result<bool> {
        match command {
            CuratorCommand::Delete(source) => self.remove(source).await,
            CuratorCommand::Edit(post) => self.apply_edit(&post).await,
        }
    }

    async fn file_items(
        &self,
        known: &[String],
        fields: &CaptionFields,
        items: Vec<Item>,
    ) -> Result<CourseWrite> {
        let resolution = resolver::resolve_detailed(&fields.course, known, self.fuzzy_threshold);
        if resolution.corrected {
            TraceEvent::NameResolved {
                candidate: fields.course.clone(),
                resolved: resolution.name.clone(),
                score: resolution.score.unwrap_or(0),
            }
            .emit();
        }

        let draft = match self.catalog.find_by_name(&resolution.name).await? {
            Some(existing) => EntryDraft {
                name: existing.name,
                level: existing.level,
                term: existing.term,
                category: existing.category,
            },
            None => EntryDraft {
                name: resolution.name,
                level: fields.level,
                term: fields.term,
                category: fields
                    .category
                    .clone()
                    .unwrap_or_else(|| self.default_category.clone()),
            },
        };

        let count = items.len();
        let outcome = self.catalog.upsert_items(&draft, items).await?;
        TraceEvent::CatalogUpserted {
            course: draft.name.clone(),
            created: outcome.created,
            items: count,
        }
        .emit();

        Ok(CourseWrite {
            course: draft.name,
            outcome,
        })
    }

    fn notify_write(&self) {
        if let Some(hook) = &self.on_write {
            hook();
        }
    }
}

#[async_trait]
impl BatchSink<ChannelPost> for IntakePipeline {
    async fn deliver(&self, batch: Batch<ChannelPost>) -> Result<()> {
        let group_key = batch.group_key.clone();
        let report = self.ingest(&batch.into_payloads()).await?;
        tracing::info!(
            group_key = ?group_key,
            accepted = report.accepted,
            skipped = report.skipped,
            courses = report.courses.len(),
            "archive batch filed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_domain::catalog::MediaKind;

    use crate::post::MediaAttachment;

    fn file_post(message_id: i64) -> ChannelPost {
        ChannelPost {
            chat_id: -100,
            message_id,
            media_group_id: None,
            caption: None,
            text: None,
            media: Some(MediaAttachment {
                kind: MediaKind::Document,
                file_id: format!("f{message_id}"),
                file_name: None,
                mime_type: None,
                file_size: None,
            }),
            reply_to: None,
            date: None,
        }
    }

    fn reply(text: &str, target: ChannelPost) -> ChannelPost {
        ChannelPost {
            chat_id: -100,
            message_id: 999,
            media_group_id: None,
            caption: None,
            text: Some(text.into()),
            media: None,
            reply_to: Some(Box::new(target)),
            date: None,
        }
    }

    #[test]
    fn del_reply_is_a_delete() {
        let cmd = CuratorCommand::parse(&reply("please DEL", file_post(7)));
        assert_eq!(
            cmd,
            Some(CuratorCommand::Delete(SourceRef {
                chat_id: -100,
                message_id: 7
            }))
        );
    }

    #[test]
    fn edit_reply_carries_target() {
        match CuratorCommand::parse(&reply("edit", file_post(8))) {
            Some(CuratorCommand::Edit(post)) => assert_eq!(post.message_id, 8),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reply_to_text_post_is_not_a_command() {
        let mut target = file_post(9);
        target.media = None;
        assert!(CuratorCommand::parse(&reply("del", target)).is_none());
        assert!(CuratorCommand::parse(&reply("thanks", file_post(9))).is_none());
        assert!(CuratorCommand::parse(&file_post(9)).is_none());
    }
}
