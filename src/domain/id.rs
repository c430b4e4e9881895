//! Identifiers and composite keys.
//!
//! Composite keys are plain value types: two keys are equal when every
//! referenced id is equal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw numeric identifier.
            #[inline]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identity of a user, as verified by the caller.
    UserId
);
entity_id!(ChatId);
entity_id!(ChatMessageId);
entity_id!(CommunityId);
entity_id!(PostId);
entity_id!(CommentId);
entity_id!(PrivateMessageId);
entity_id!(NotificationId);

/// Unordered pair of users sharing a friendship.
///
/// The smallest id is always stored first so `(a, b)` and `(b, a)` produce
/// the same key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct FriendshipKey {
    low: UserId,
    high: UserId,
}

impl FriendshipKey {
    /// Create a new [`FriendshipKey`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if both ids are the same user.
    pub fn new(a: UserId, b: UserId) -> Result<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(DomainError::SelfRelation),
        }
    }

    /// Both users of the pair, smallest id first.
    pub fn users(&self) -> (UserId, UserId) {
        (self.low, self.high)
    }

    /// Whether `user` is one side of the pair.
    pub fn contains(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }
}

/// Directional key of a friendship request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct FriendshipRequestKey {
    pub sender: UserId,
    pub receiver: UserId,
}

impl FriendshipRequestKey {
    pub fn new(sender: UserId, receiver: UserId) -> Self {
        Self { sender, receiver }
    }

    /// Same pair, opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            sender: self.receiver,
            receiver: self.sender,
        }
    }

    /// Friendship created once this request is accepted.
    pub fn friendship(&self) -> Result<FriendshipKey> {
        FriendshipKey::new(self.sender, self.receiver)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ChatMemberKey {
    pub chat: ChatId,
    pub member: UserId,
}

impl ChatMemberKey {
    pub fn new(chat: ChatId, member: UserId) -> Self {
        Self { chat, member }
    }
}

/// Key of a pending chat invitation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct ChatInvitationKey {
    pub sender: UserId,
    pub receiver: UserId,
    pub chat: ChatId,
}

impl ChatInvitationKey {
    pub fn new(sender: UserId, receiver: UserId, chat: ChatId) -> Self {
        Self {
            sender,
            receiver,
            chat,
        }
    }

    /// Membership created once this invitation is accepted.
    pub fn membership(&self) -> ChatMemberKey {
        ChatMemberKey::new(self.chat, self.receiver)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct CommunityMemberKey {
    pub community: CommunityId,
    pub member: UserId,
}

impl CommunityMemberKey {
    pub fn new(community: CommunityId, member: UserId) -> Self {
        Self { community, member }
    }
}

/// Key of a pending community invitation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct CommunityInvitationKey {
    pub sender: UserId,
    pub receiver: UserId,
    pub community: CommunityId,
}

impl CommunityInvitationKey {
    pub fn new(
        sender: UserId,
        receiver: UserId,
        community: CommunityId,
    ) -> Self {
        Self {
            sender,
            receiver,
            community,
        }
    }

    /// Membership created once this invitation is accepted.
    pub fn membership(&self) -> CommunityMemberKey {
        CommunityMemberKey::new(self.community, self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendship_key_is_unordered() {
        let a = FriendshipKey::new(UserId(7), UserId(3)).unwrap();
        let b = FriendshipKey::new(UserId(3), UserId(7)).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.users(), (UserId(3), UserId(7)));
        assert!(a.contains(UserId(7)));
        assert!(!a.contains(UserId(4)));
    }

    #[test]
    fn test_friendship_key_rejects_self() {
        assert_eq!(
            FriendshipKey::new(UserId(1), UserId(1)),
            Err(DomainError::SelfRelation)
        );
    }

    #[test]
    fn test_request_key_direction() {
        let key = FriendshipRequestKey::new(UserId(1), UserId(2));

        assert_ne!(key, key.reversed());
        assert_eq!(key, key.reversed().reversed());
        assert_eq!(
            key.friendship().unwrap(),
            key.reversed().friendship().unwrap()
        );
    }

    #[test]
    fn test_invitation_membership() {
        let key = ChatInvitationKey::new(UserId(1), UserId(2), ChatId(9));
        assert_eq!(key.membership(), ChatMemberKey::new(ChatId(9), UserId(2)));

        let key = CommunityInvitationKey::new(
            UserId(1),
            UserId(2),
            CommunityId(4),
        );
        assert_eq!(
            key.membership(),
            CommunityMemberKey::new(CommunityId(4), UserId(2))
        );
    }
}
