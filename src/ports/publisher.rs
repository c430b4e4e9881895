//! Interface for event publication.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::Event;

/// Port for publishing lifecycle events.
///
/// Delivery to reaction handlers happens out of band: in-process or through
/// a broker, depending on the implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> Result<()>;
}
