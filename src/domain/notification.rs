//! Notifications sent to users after lifecycle transitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::id::{NotificationId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendshipRequestReceived,
    FriendshipRequestAccepted,
    FriendshipRequestDeclined,
    ChatInvitationReceived,
    ChatInvitationAccepted,
    ChatInvitationDeclined,
    CommunityInvitationReceived,
    CommunityInvitationAccepted,
    CommunityInvitationDeclined,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::FriendshipRequestReceived,
        NotificationKind::FriendshipRequestAccepted,
        NotificationKind::FriendshipRequestDeclined,
        NotificationKind::ChatInvitationReceived,
        NotificationKind::ChatInvitationAccepted,
        NotificationKind::ChatInvitationDeclined,
        NotificationKind::CommunityInvitationReceived,
        NotificationKind::CommunityInvitationAccepted,
        NotificationKind::CommunityInvitationDeclined,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FriendshipRequestReceived => "friendship_request_received",
            Self::FriendshipRequestAccepted => "friendship_request_accepted",
            Self::FriendshipRequestDeclined => "friendship_request_declined",
            Self::ChatInvitationReceived => "chat_invitation_received",
            Self::ChatInvitationAccepted => "chat_invitation_accepted",
            Self::ChatInvitationDeclined => "chat_invitation_declined",
            Self::CommunityInvitationReceived => {
                "community_invitation_received"
            },
            Self::CommunityInvitationAccepted => {
                "community_invitation_accepted"
            },
            Self::CommunityInvitationDeclined => {
                "community_invitation_declined"
            },
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::InvalidEnum {
                kind: "notification kind",
                value: s.to_owned(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub receiver: UserId,
    pub kind: NotificationKind,
    /// User whose action produced the notification.
    pub actor: UserId,
    pub read: bool,
    /// Event that produced the notification.
    pub event_id: String,
    pub created_at: DateTime<Utc>,
}

/// Values needed to create a [`Notification`].
///
/// `(event_id, receiver)` is unique, so a redelivered event never notifies
/// twice.
#[derive(Clone, Debug, PartialEq)]
pub struct NewNotification {
    pub receiver: UserId,
    pub kind: NotificationKind,
    pub actor: UserId,
    pub event_id: String,
}
