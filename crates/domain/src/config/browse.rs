use serde::{Deserialize, Serialize};

use crate::step::StepKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browse flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Ordered selection steps.  The flow asks for each in turn and delivers
    /// the matching items once all are answered.
    #[serde(default = "d_steps")]
    pub steps: Vec<StepKind>,

    /// Maximum number of cached option lists (least recently used evicted).
    #[serde(default = "d_cache_capacity")]
    pub cache_capacity: usize,

    /// Age after which a cached option list is recomputed.  `None` keeps
    /// entries until evicted or invalidated.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    #[serde(default)]
    pub navigation: NavigationLabels,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            steps: d_steps(),
            cache_capacity: d_cache_capacity(),
            cache_ttl_secs: None,
            navigation: NavigationLabels::default(),
        }
    }
}

/// Button texts recognized as navigation instead of answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationLabels {
    #[serde(default = "d_back")]
    pub back: String,
    #[serde(default = "d_restart")]
    pub restart: String,
    #[serde(default = "d_exit")]
    pub exit: String,
}

impl Default for NavigationLabels {
    fn default() -> Self {
        Self {
            back: d_back(),
            restart: d_restart(),
            exit: d_exit(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_steps() -> Vec<StepKind> {
    vec![
        StepKind::Level,
        StepKind::Term,
        StepKind::Category,
        StepKind::Course,
        StepKind::Item,
    ]
}
fn d_cache_capacity() -> usize {
    128
}
fn d_back() -> String {
    "🔙 Back".into()
}
fn d_restart() -> String {
    "🔄 Restart".into()
}
fn d_exit() -> String {
    "🚫 Exit".into()
}
