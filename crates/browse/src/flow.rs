//! The browse flow: a stepwise menu over the catalog.
//!
//! Each step narrows the catalog by one field.  The engine is stateless
//! between calls; every transition takes the user's [`FlowSession`] by
//! mutable reference and returns the replies to show.  Callers serialize
//! transitions per session.

use std::sync::Arc;

use serde::Serialize;

use shelf_domain::catalog::CatalogQuery;
use shelf_domain::config::{BrowseConfig, NavigationLabels};
use shelf_domain::delivery::DeliveryChannel;
use shelf_domain::error::{Error, Result};
use shelf_domain::step::{Filter, StepKind};
use shelf_domain::trace::TraceEvent;

use crate::cache::{OptionCache, OptionKey};
use crate::session::{FlowSession, SessionStatus};

pub const TRY_AGAIN_LATER: &str = "Something went wrong. Please try again later.";
pub const INVALID_CHOICE: &str = "Please choose one of the options below.";
pub const RESTARTED: &str = "Your selection was reset. Let's start over.";
pub const GOODBYE: &str = "Closed. Send /browse to start again.";

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Prompt {
        text: String,
        options: Vec<String>,
        can_go_back: bool,
    },
    Notice {
        text: String,
    },
    Delivered {
        count: usize,
    },
    Closed,
}

impl Reply {
    fn notice(text: impl Into<String>) -> Self {
        Self::Notice { text: text.into() }
    }
}

pub struct FlowEngine {
    steps: Vec<StepKind>,
    navigation: NavigationLabels,
    catalog: Arc<dyn CatalogQuery>,
    cache: Arc<OptionCache>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl FlowEngine {
    pub fn new(
        config: &BrowseConfig,
        catalog: Arc<dyn CatalogQuery>,
        cache: Arc<OptionCache>,
        delivery: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            steps: config.steps.clone(),
            navigation: config.navigation.clone(),
            catalog,
            cache,
            delivery,
        }
    }

    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    pub fn navigation(&self) -> &NavigationLabels {
        &self.navigation
    }

    /// Show the prompt for the session's current step, reopening a closed
    /// session.  With every step answered, delivers the matching items first.
    pub async fn enter(&self, session: &mut FlowSession) -> Vec<Reply> {
        session.status = SessionStatus::Open;
        self.transition(session, |_| {}).await
    }

    /// Record `text` as the answer to the current step.  Text outside the
    /// offered options is rejected without touching the session.
    pub async fn answer(&self, session: &mut FlowSession, text: &str) -> Vec<Reply> {
        if !session.is_open() {
            return Vec::new();
        }
        let depth = session.depth();
        if depth >= self.steps.len() || !session.is_prefix_of(&self.steps) {
            return self.restart_corrupted(session).await;
        }
        let offered = session.offered.iter().any(|o| o == text);
        let Some(step) = self.steps.get(depth).copied().filter(|_| offered) else {
            let mut replies = vec![Reply::notice(INVALID_CHOICE)];
            replies.extend(self.reprompt(session));
            return replies;
        };

        let value = text.to_string();
        self.transition(session, move |s| {
            s.answers.insert(step, value);
        })
        .await
    }

    /// Step back one answer.  At the first step this closes the flow.
    pub async fn back(&self, session: &mut FlowSession) -> Vec<Reply> {
        if !session.is_open() {
            return Vec::new();
        }
        if session.answers.is_empty() {
            return self.exit(session);
        }
        self.transition(session, |s| {
            s.answers.pop();
        })
        .await
    }

    /// Drop every answer and start from the first step with fresh options.
    pub async fn restart(&self, session: &mut FlowSession) -> Vec<Reply> {
        if !session.is_open() {
            return Vec::new();
        }
        self.cache.invalidate(None);
        self.transition(session, |s| s.answers.clear()).await
    }

    /// A session whose answers no longer fit the steps starts over.
    async fn restart_corrupted(&self, session: &mut FlowSession) -> Vec<Reply> {
        tracing::warn!(session_key = %session.key, depth = session.depth(), "corrupted browse state; restarting");
        self.cache.invalidate(None);
        let mut replies = vec![Reply::notice(RESTARTED)];
        replies.extend(self.transition(session, |s| s.answers.clear()).await);
        replies
    }

    pub fn exit(&self, session: &mut FlowSession) -> Vec<Reply> {
        session.answers.clear();
        session.offered.clear();
        session.status = SessionStatus::Closed;
        vec![Reply::Closed]
    }

    /// Route free text: navigation labels first, anything else is an answer.
    pub async fn handle_text(&self, session: &mut FlowSession, text: &str) -> Vec<Reply> {
        let text = text.trim();
        if text == self.navigation.back {
            self.back(session).await
        } else if text == self.navigation.restart {
            self.restart(session).await
        } else if text == self.navigation.exit {
            if session.is_open() {
                self.exit(session)
            } else {
                Vec::new()
            }
        } else {
            self.answer(session, text).await
        }
    }

    // ── transitions ─────────────────────────────────────────────────

    /// Apply `mutate`, then settle the session on its next prompt.  Any
    /// failure restores answers and offered options to what they were before
    /// the call.
    async fn transition<F>(&self, session: &mut FlowSession, mutate: F) -> Vec<Reply>
    where
        F: FnOnce(&mut FlowSession),
    {
        let answers_before = session.answers.clone();
        let offered_before = session.offered.clone();
        let mut replies = Vec::new();

        mutate(session);
        if let Err(e) = self.settle(session, &mut replies).await {
            tracing::warn!(session_key = %session.key, error = %e, "browse transition failed");
            session.answers = answers_before;
            session.offered = offered_before;
            replies.retain(|r| matches!(r, Reply::Delivered { .. }));
            replies.push(Reply::notice(TRY_AGAIN_LATER));
        }
        replies
    }

    /// Walk from the current depth to the next prompt.
    ///
    /// A full answer set delivers and then drops the last answer so the user
    /// lands back on the final step.  A step with no options drops the
    /// previous answer and tries again one level up.  Either way the depth
    /// only shrinks, so this settles within `steps.len() + 2` rounds.
    async fn settle(&self, session: &mut FlowSession, replies: &mut Vec<Reply>) -> Result<()> {
        let n = self.steps.len();
        for _ in 0..n + 2 {
            if !session.is_prefix_of(&self.steps) {
                tracing::warn!(session_key = %session.key, depth = session.depth(), "corrupted browse state; restarting");
                session.answers.clear();
                self.cache.invalidate(None);
                replies.push(Reply::notice(RESTARTED));
                continue;
            }

            let depth = session.depth();
            let filter = session.filter();

            if depth == n {
                self.deliver(session, &filter, replies).await?;
                // Stay on the last step so the user can pick another item.
                if session.answers.pop().is_none() {
                    replies.extend(self.exit(session));
                    return Ok(());
                }
                continue;
            }

            let step = self.steps[depth];
            let options = self.options_for(&filter, step).await?;
            if options.is_empty() {
                replies.push(Reply::notice(step.empty_notice()));
                if session.answers.pop().is_none() {
                    replies.extend(self.exit(session));
                    return Ok(());
                }
                continue;
            }

            TraceEvent::FlowStep {
                session_key: session.key.clone(),
                step: depth,
                options: options.len(),
            }
            .emit();
            session.offered = options.clone();
            replies.push(Reply::Prompt {
                text: step.prompt().to_string(),
                options,
                can_go_back: depth > 0,
            });
            return Ok(());
        }
        Err(Error::Other(format!(
            "browse session {} did not settle",
            session.key
        )))
    }

    async fn options_for(&self, filter: &Filter, step: StepKind) -> Result<Vec<String>> {
        let key = OptionKey::new(filter.clone(), step);
        self.cache
            .get_or_compute(&key, || self.catalog.find_options(filter, step))
            .await
    }

    async fn deliver(
        &self,
        session: &FlowSession,
        filter: &Filter,
        replies: &mut Vec<Reply>,
    ) -> Result<()> {
        let items = self.catalog.find_items(filter).await?;
        self.delivery.deliver_items(&session.key, &items).await?;
        TraceEvent::ItemsDelivered {
            destination: session.key.clone(),
            count: items.len(),
        }
        .emit();
        replies.push(Reply::Delivered { count: items.len() });
        Ok(())
    }

    fn reprompt(&self, session: &FlowSession) -> Option<Reply> {
        let step = self.steps.get(session.depth())?;
        if session.offered.is_empty() {
            return None;
        }
        Some(Reply::Prompt {
            text: step.prompt().to_string(),
            options: session.offered.clone(),
            can_go_back: session.depth() > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_serializes_with_kind_tag() {
        let json = serde_json::to_value(Reply::Delivered { count: 2 }).unwrap();
        assert_eq!(json["kind"], "delivered");
        assert_eq!(json["count"], 2);

        let json = serde_json::to_value(Reply::Closed).unwrap();
        assert_eq!(json["kind"], "closed");
    }
}
