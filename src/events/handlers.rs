//! Reaction handlers wired into the default dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{NewNotification, NotificationKind, UserId};
use crate::error::Result;
use crate::events::{DomainEvent, Event, EventKind, ReactionHandler};
use crate::ports::EntityStore;

/// Notifies the other party of a request or invitation transition.
///
/// Creation notifies the receiver; acceptance and decline notify the sender.
pub struct NotificationHandler {
    store: Arc<dyn EntityStore>,
}

impl NotificationHandler {
    /// Create a new [`NotificationHandler`].
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Receiver, kind and actor of the notification caused by `event`.
    fn target(event: &DomainEvent) -> Option<(UserId, NotificationKind, UserId)> {
        use NotificationKind as Kind;

        Some(match event {
            DomainEvent::FriendshipRequestCreated(k) => {
                (k.receiver, Kind::FriendshipRequestReceived, k.sender)
            },
            DomainEvent::FriendshipRequestAccepted(k) => {
                (k.sender, Kind::FriendshipRequestAccepted, k.receiver)
            },
            DomainEvent::FriendshipRequestDeclined(k) => {
                (k.sender, Kind::FriendshipRequestDeclined, k.receiver)
            },
            DomainEvent::ChatInvitationCreated(k) => {
                (k.receiver, Kind::ChatInvitationReceived, k.sender)
            },
            DomainEvent::ChatInvitationAccepted(k) => {
                (k.sender, Kind::ChatInvitationAccepted, k.receiver)
            },
            DomainEvent::ChatInvitationDeclined(k) => {
                (k.sender, Kind::ChatInvitationDeclined, k.receiver)
            },
            DomainEvent::CommunityInvitationCreated(k) => {
                (k.receiver, Kind::CommunityInvitationReceived, k.sender)
            },
            DomainEvent::CommunityInvitationAccepted(k) => {
                (k.sender, Kind::CommunityInvitationAccepted, k.receiver)
            },
            DomainEvent::CommunityInvitationDeclined(k) => {
                (k.sender, Kind::CommunityInvitationDeclined, k.receiver)
            },
            _ => return None,
        })
    }
}

#[async_trait]
impl ReactionHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn subscribes(&self) -> &'static [EventKind] {
        &[
            EventKind::FriendshipRequestCreated,
            EventKind::FriendshipRequestAccepted,
            EventKind::FriendshipRequestDeclined,
            EventKind::ChatInvitationCreated,
            EventKind::ChatInvitationAccepted,
            EventKind::ChatInvitationDeclined,
            EventKind::CommunityInvitationCreated,
            EventKind::CommunityInvitationAccepted,
            EventKind::CommunityInvitationDeclined,
        ]
    }

    fn emits(&self) -> &'static [EventKind] {
        &[EventKind::NotificationCreated]
    }

    async fn handle(&self, event: &Event) -> Result<Vec<DomainEvent>> {
        let Some((receiver, kind, actor)) = Self::target(&event.payload) else {
            return Ok(Vec::new());
        };

        let created = self
            .store
            .insert_notification(&NewNotification {
                receiver,
                kind,
                actor,
                event_id: event.id.clone(),
            })
            .await?;

        match created {
            Some(notification) => {
                tracing::debug!(%receiver, %kind, "notification created");
                Ok(vec![DomainEvent::NotificationCreated {
                    notification: notification.id,
                    receiver,
                }])
            },
            None => {
                tracing::debug!(event = %event.id, "notification already delivered");
                Ok(Vec::new())
            },
        }
    }
}

/// Removes invitations and requests that became meaningless.
///
/// Removal is idempotent: running it over an already empty set is a no-op.
pub struct CleanupHandler {
    store: Arc<dyn EntityStore>,
}

impl CleanupHandler {
    /// Create a new [`CleanupHandler`].
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReactionHandler for CleanupHandler {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn subscribes(&self) -> &'static [EventKind] {
        &[
            EventKind::UserDeactivated,
            EventKind::ChatDeactivated,
            EventKind::CommunityDeactivated,
            EventKind::ChatVisibilityChanged,
            EventKind::CommunityVisibilityChanged,
        ]
    }

    fn emits(&self) -> &'static [EventKind] {
        &[]
    }

    async fn handle(&self, event: &Event) -> Result<Vec<DomainEvent>> {
        match event.payload {
            DomainEvent::UserDeactivated { user } => {
                let requests =
                    self.store.remove_friendship_requests_of(user).await?;
                let chats =
                    self.store.remove_chat_invitations_of_user(user).await?;
                let communities = self
                    .store
                    .remove_community_invitations_of_user(user)
                    .await?;
                tracing::info!(
                    %user,
                    requests,
                    chats,
                    communities,
                    "removed pending invitations of deactivated user"
                );
            },
            DomainEvent::ChatDeactivated { chat }
            | DomainEvent::ChatVisibilityChanged {
                chat,
                is_private: false,
            } => {
                let removed =
                    self.store.remove_chat_invitations_of_chat(chat).await?;
                tracing::info!(%chat, removed, "removed pending chat invitations");
            },
            DomainEvent::CommunityDeactivated { community }
            | DomainEvent::CommunityVisibilityChanged {
                community,
                is_private: false,
            } => {
                let removed = self
                    .store
                    .remove_community_invitations_of_community(community)
                    .await?;
                tracing::info!(
                    %community,
                    removed,
                    "removed pending community invitations"
                );
            },
            _ => {},
        }

        Ok(Vec::new())
    }
}
