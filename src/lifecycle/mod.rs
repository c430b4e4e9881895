//! Gated state transitions.
//!
//! Each operation checks its permission gate, mutates the store in a single
//! unit of work, then publishes at most one event. A denied gate fails with
//! [`ApplicationError::Forbidden`]; accepting or declining a request that is
//! no longer pending fails with [`ApplicationError::NotFound`] and writes
//! nothing.

mod chat;
mod community;
mod friendship;
mod notification;
mod user;

pub use chat::*;
pub use community::*;
pub use friendship::*;
pub use notification::*;
pub use user::*;

use std::sync::Arc;

use crate::error::{ApplicationError, Result};
use crate::events::{DomainEvent, Event};
use crate::permission::Permissions;
use crate::ports::{EntityStore, EventPublisher};

/// Fail with [`ApplicationError::Forbidden`] unless `allowed`.
fn ensure(allowed: bool) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(ApplicationError::Forbidden)
    }
}

/// Count the transition and publish its event.
///
/// Runs after the store commit: a failed publish is logged and counted but
/// never reported to the caller, whose transition already happened.
async fn emit(publisher: &dyn EventPublisher, payload: DomainEvent) {
    let event = Event::new(payload);
    let kind = event.kind();
    let id = event.id.clone();

    metrics::counter!("lifecycle_transitions_total", "kind" => kind.as_str())
        .increment(1);
    tracing::info!(%id, %kind, "transition committed");

    if let Err(err) = publisher.publish(event).await {
        metrics::counter!("events_publish_failures_total", "kind" => kind.as_str())
            .increment(1);
        tracing::error!(%id, %kind, error = %err, "event publication failed");
    }
}

/// Every lifecycle service, sharing one store and one publisher.
#[derive(Clone)]
pub struct Lifecycle {
    pub friendship: FriendshipService,
    pub chat: ChatService,
    pub community: CommunityService,
    pub user: UserService,
    pub notification: NotificationService,
}

impl Lifecycle {
    /// Create a new [`Lifecycle`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: &Permissions,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            friendship: FriendshipService::new(
                Arc::clone(&store),
                permissions.friendship.clone(),
                Arc::clone(&publisher),
            ),
            chat: ChatService::new(
                Arc::clone(&store),
                permissions.chat.clone(),
                Arc::clone(&publisher),
            ),
            community: CommunityService::new(
                Arc::clone(&store),
                permissions.community.clone(),
                Arc::clone(&publisher),
            ),
            user: UserService::new(
                Arc::clone(&store),
                permissions.user.clone(),
                publisher,
            ),
            notification: NotificationService::new(
                store,
                permissions.notification.clone(),
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::adapters::memory::MemoryStore;
    use crate::error::{ApplicationError, Result};
    use crate::events::{Event, default_dispatcher};
    use crate::lifecycle::Lifecycle;
    use crate::permission::Permissions;
    use crate::ports::EventPublisher;

    /// Publisher whose broker is always unreachable.
    pub struct UnreachablePublisher;

    #[async_trait]
    impl EventPublisher for UnreachablePublisher {
        async fn publish(&self, _event: Event) -> Result<()> {
            Err(ApplicationError::internal(std::fmt::Error))
        }
    }

    /// Services wired to an in-process dispatcher over `store`.
    pub fn lifecycle(store: &Arc<MemoryStore>) -> Lifecycle {
        let dispatcher = default_dispatcher(store.clone()).unwrap();
        lifecycle_with(store, Arc::new(dispatcher))
    }

    pub fn lifecycle_with(
        store: &Arc<MemoryStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Lifecycle {
        let permissions = Permissions::new(store.clone());
        Lifecycle::new(store.clone(), &permissions, publisher)
    }
}
