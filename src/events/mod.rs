//! Domain events emitted by lifecycle transitions.

mod dispatch;
mod handlers;

pub use dispatch::*;
pub use handlers::*;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::domain::*;
use crate::ports::EntityStore;

const ID_LENGTH: usize = 16;

/// Payload of a domain event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    FriendshipRequestCreated(FriendshipRequestKey),
    FriendshipRequestAccepted(FriendshipRequestKey),
    FriendshipRequestDeclined(FriendshipRequestKey),
    ChatInvitationCreated(ChatInvitationKey),
    ChatInvitationAccepted(ChatInvitationKey),
    ChatInvitationDeclined(ChatInvitationKey),
    CommunityInvitationCreated(CommunityInvitationKey),
    CommunityInvitationAccepted(CommunityInvitationKey),
    CommunityInvitationDeclined(CommunityInvitationKey),
    UserDeactivated { user: UserId },
    ChatDeactivated { chat: ChatId },
    CommunityDeactivated { community: CommunityId },
    ChatVisibilityChanged { chat: ChatId, is_private: bool },
    CommunityVisibilityChanged { community: CommunityId, is_private: bool },
    NotificationCreated { notification: NotificationId, receiver: UserId },
}

/// Discriminant of a [`DomainEvent`], used to route events to handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    FriendshipRequestCreated,
    FriendshipRequestAccepted,
    FriendshipRequestDeclined,
    ChatInvitationCreated,
    ChatInvitationAccepted,
    ChatInvitationDeclined,
    CommunityInvitationCreated,
    CommunityInvitationAccepted,
    CommunityInvitationDeclined,
    UserDeactivated,
    ChatDeactivated,
    CommunityDeactivated,
    ChatVisibilityChanged,
    CommunityVisibilityChanged,
    NotificationCreated,
}

impl EventKind {
    /// Stable name, also used as the CloudEvents `type` suffix.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FriendshipRequestCreated => "friendship_request.created",
            Self::FriendshipRequestAccepted => "friendship_request.accepted",
            Self::FriendshipRequestDeclined => "friendship_request.declined",
            Self::ChatInvitationCreated => "chat_invitation.created",
            Self::ChatInvitationAccepted => "chat_invitation.accepted",
            Self::ChatInvitationDeclined => "chat_invitation.declined",
            Self::CommunityInvitationCreated => "community_invitation.created",
            Self::CommunityInvitationAccepted => {
                "community_invitation.accepted"
            },
            Self::CommunityInvitationDeclined => {
                "community_invitation.declined"
            },
            Self::UserDeactivated => "user.deactivated",
            Self::ChatDeactivated => "chat.deactivated",
            Self::CommunityDeactivated => "community.deactivated",
            Self::ChatVisibilityChanged => "chat.visibility_changed",
            Self::CommunityVisibilityChanged => "community.visibility_changed",
            Self::NotificationCreated => "notification.created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FriendshipRequestCreated(_) => EventKind::FriendshipRequestCreated,
            Self::FriendshipRequestAccepted(_) => {
                EventKind::FriendshipRequestAccepted
            },
            Self::FriendshipRequestDeclined(_) => {
                EventKind::FriendshipRequestDeclined
            },
            Self::ChatInvitationCreated(_) => EventKind::ChatInvitationCreated,
            Self::ChatInvitationAccepted(_) => EventKind::ChatInvitationAccepted,
            Self::ChatInvitationDeclined(_) => EventKind::ChatInvitationDeclined,
            Self::CommunityInvitationCreated(_) => {
                EventKind::CommunityInvitationCreated
            },
            Self::CommunityInvitationAccepted(_) => {
                EventKind::CommunityInvitationAccepted
            },
            Self::CommunityInvitationDeclined(_) => {
                EventKind::CommunityInvitationDeclined
            },
            Self::UserDeactivated { .. } => EventKind::UserDeactivated,
            Self::ChatDeactivated { .. } => EventKind::ChatDeactivated,
            Self::CommunityDeactivated { .. } => EventKind::CommunityDeactivated,
            Self::ChatVisibilityChanged { .. } => EventKind::ChatVisibilityChanged,
            Self::CommunityVisibilityChanged { .. } => {
                EventKind::CommunityVisibilityChanged
            },
            Self::NotificationCreated { .. } => EventKind::NotificationCreated,
        }
    }
}

/// Envelope of a [`DomainEvent`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id, kept across redeliveries.
    pub id: String,
    pub time: DateTime<Utc>,
    pub payload: DomainEvent,
}

impl Event {
    /// Create a new [`Event`] with a random id.
    pub fn new(payload: DomainEvent) -> Self {
        Self {
            id: Alphanumeric.sample_string(&mut OsRng, ID_LENGTH),
            time: Utc::now(),
            payload,
        }
    }

    /// Follow-up event produced while handling `self`.
    ///
    /// The id is derived from the parent id, so handling a redelivered event
    /// produces follow-ups with the same ids.
    pub fn follow_up(&self, index: usize, payload: DomainEvent) -> Self {
        Self {
            id: format!("{}.{}.{index}", self.id, payload.kind().as_str()),
            time: self.time,
            payload,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Dispatcher wired with every reaction handler of the core.
pub fn default_dispatcher(
    store: Arc<dyn EntityStore>,
) -> Result<Dispatcher, GraphError> {
    DispatcherBuilder::default()
        .handler(NotificationHandler::new(Arc::clone(&store)))
        .handler(CleanupHandler::new(store))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::new(DomainEvent::ChatInvitationCreated(
            ChatInvitationKey::new(UserId(1), UserId(2), ChatId(3)),
        ));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["payload"]["type"], "chat_invitation_created");
        assert_eq!(json["payload"]["data"]["receiver"], 2);
        assert_eq!(json["id"].as_str().unwrap().len(), ID_LENGTH);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_follow_up_ids_are_stable() {
        let parent = Event::new(DomainEvent::UserDeactivated { user: UserId(1) });
        let payload = DomainEvent::NotificationCreated {
            notification: NotificationId(1),
            receiver: UserId(2),
        };

        let a = parent.follow_up(0, payload.clone());
        let b = parent.follow_up(0, payload);
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with(&parent.id));
        assert_eq!(a.kind(), EventKind::NotificationCreated);
    }
}
