use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Intake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Archive-channel intake: album debouncing and course-name resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Chat ID of the archive channel.  Posts from other chats are ignored.
    /// `0` accepts posts from any chat (development only).
    #[serde(default)]
    pub archive_chat_id: i64,

    /// Quiescence window in milliseconds.  An album is flushed once no new
    /// member has arrived for this long; every new member restarts the window.
    #[serde(default = "d_quiescence_ms")]
    pub quiescence_ms: u64,

    /// Minimum similarity (0–100) for a caption's course name to be
    /// corrected to an existing catalog name.
    #[serde(default = "d_fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    /// Category assigned to new courses whose caption carries no `Type:`.
    #[serde(default = "d_default_category")]
    pub default_category: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            archive_chat_id: 0,
            quiescence_ms: d_quiescence_ms(),
            fuzzy_threshold: d_fuzzy_threshold(),
            default_category: d_default_category(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_quiescence_ms() -> u64 {
    50
}
fn d_fuzzy_threshold() -> u8 {
    85
}
fn d_default_category() -> String {
    "theory".into()
}
