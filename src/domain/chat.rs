//! Chat aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{ChatId, ChatInvitationKey, ChatMessageId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub owner: UserId,
    pub name: String,
    pub is_private: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        !self.is_private
    }
}

/// Values needed to create a [`Chat`]; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChat {
    pub owner: UserId,
    pub name: String,
    pub is_private: bool,
}

/// Pending chat invitation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatInvitation {
    pub key: ChatInvitationKey,
    pub created_at: DateTime<Utc>,
}

/// Message posted inside a chat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub chat: ChatId,
    pub author: UserId,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewChatMessage {
    pub chat: ChatId,
    pub author: UserId,
    pub content: String,
}
