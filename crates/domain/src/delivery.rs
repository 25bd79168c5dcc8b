use async_trait::async_trait;

use crate::catalog::ItemRef;
use crate::error::Result;

/// Outbound channel that hands selected items to a user.
///
/// Invoked once per completed selection.  Implementations decide how the
/// items travel (copying archive messages, an outbox, a test recorder).
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver_items(&self, destination: &str, items: &[ItemRef]) -> Result<()>;
}
