use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelf_domain::catalog::{Item, MediaKind, SourceRef};
use shelf_domain::caption::CaptionFields;

/// A file attached to a channel post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl MediaAttachment {
    /// Lowercased suffix of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_lowercase())
    }
}

/// A message posted (or edited) in the archive channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPost {
    pub chat_id: i64,
    pub message_id: i64,
    /// Shared by every member of an album.
    #[serde(default)]
    pub media_group_id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaAttachment>,
    /// The post this one replies to; curator commands reply to the file they
    /// act on.
    #[serde(default)]
    pub reply_to: Option<Box<ChannelPost>>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl ChannelPost {
    pub fn source(&self) -> SourceRef {
        SourceRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    /// Build the catalog item for this post, titled from `fields`.
    /// `None` when the post carries no file.
    pub fn to_item(&self, fields: &CaptionFields) -> Option<Item> {
        let media = self.media.as_ref()?;
        Some(Item {
            title: fields.title.clone(),
            source: self.source(),
            file_id: media.file_id.clone(),
            media: media.kind,
            original_name: media.file_name.clone(),
            mime_type: media.mime_type.clone(),
            size_bytes: media.file_size,
            extension: media.extension(),
            created_at: self.date.unwrap_or_else(Utc::now),
        })
    }
}
