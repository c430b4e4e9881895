//! Database models for PostgreSQL.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::*;
use crate::error::Result;

/// User record as stored in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub system_role: String,
    pub banned: bool,
    pub deleted: bool,
    pub posts_public: bool,
    pub accepting_private_msgs: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Convert to [`User`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the stored role is unknown.
    pub fn try_into_domain(self) -> Result<User> {
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            system_role: self.system_role.parse()?,
            banned: self.banned,
            deleted: self.deleted,
            posts_public: self.posts_public,
            accepting_private_msgs: self.accepting_private_msgs,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FriendshipRequestRecord {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<FriendshipRequestRecord> for FriendshipRequest {
    fn from(r: FriendshipRequestRecord) -> Self {
        Self {
            key: FriendshipRequestKey::new(
                UserId(r.sender_id),
                UserId(r.receiver_id),
            ),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatRecord {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub is_private: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ChatRecord> for Chat {
    fn from(r: ChatRecord) -> Self {
        Self {
            id: ChatId(r.id),
            owner: UserId(r.owner_id),
            name: r.name,
            is_private: r.is_private,
            deleted: r.deleted,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatInvitationRecord {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ChatInvitationRecord> for ChatInvitation {
    fn from(r: ChatInvitationRecord) -> Self {
        Self {
            key: ChatInvitationKey::new(
                UserId(r.sender_id),
                UserId(r.receiver_id),
                ChatId(r.chat_id),
            ),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessageRecord> for ChatMessage {
    fn from(r: ChatMessageRecord) -> Self {
        Self {
            id: ChatMessageId(r.id),
            chat: ChatId(r.chat_id),
            author: UserId(r.author_id),
            content: r.content,
            deleted: r.deleted,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommunityRecord {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub is_private: bool,
    pub banned: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CommunityRecord> for Community {
    fn from(r: CommunityRecord) -> Self {
        Self {
            id: CommunityId(r.id),
            owner: UserId(r.owner_id),
            name: r.name,
            is_private: r.is_private,
            banned: r.banned,
            deleted: r.deleted,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommunityMemberRecord {
    pub community_id: i64,
    pub member_id: i64,
    pub member_role: String,
    pub joined_at: DateTime<Utc>,
}

impl CommunityMemberRecord {
    /// Convert to [`CommunityMember`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the stored role is unknown.
    pub fn try_into_domain(self) -> Result<CommunityMember> {
        Ok(CommunityMember {
            key: CommunityMemberKey::new(
                CommunityId(self.community_id),
                UserId(self.member_id),
            ),
            role: self.member_role.parse()?,
            joined_at: self.joined_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommunityInvitationRecord {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub community_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<CommunityInvitationRecord> for CommunityInvitation {
    fn from(r: CommunityInvitationRecord) -> Self {
        Self {
            key: CommunityInvitationKey::new(
                UserId(r.sender_id),
                UserId(r.receiver_id),
                CommunityId(r.community_id),
            ),
            created_at: r.created_at,
        }
    }
}

/// Post record; exactly one owner column is set.
#[derive(Debug, Clone, FromRow)]
pub struct PostRecord {
    pub id: i64,
    pub owner_user_id: Option<i64>,
    pub owner_community_id: Option<i64>,
    pub author_id: i64,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl PostRecord {
    /// Convert to [`Post`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if both or neither owner columns are set.
    pub fn try_into_domain(self) -> Result<Post> {
        Ok(Post {
            id: PostId(self.id),
            owner: PostOwner::from_columns(
                self.owner_user_id.map(UserId),
                self.owner_community_id.map(CommunityId),
            )?,
            author: UserId(self.author_id),
            content: self.content,
            deleted: self.deleted,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRecord> for PostComment {
    fn from(r: CommentRecord) -> Self {
        Self {
            id: CommentId(r.id),
            post: PostId(r.post_id),
            author: UserId(r.author_id),
            content: r.content,
            deleted: r.deleted,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PrivateMessageRecord {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PrivateMessageRecord> for PrivateMessage {
    fn from(r: PrivateMessageRecord) -> Self {
        Self {
            id: PrivateMessageId(r.id),
            sender: UserId(r.sender_id),
            receiver: UserId(r.receiver_id),
            content: r.content,
            deleted: r.deleted,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub receiver_id: i64,
    pub kind: String,
    pub actor_id: i64,
    pub read: bool,
    pub event_id: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Convert to [`Notification`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the stored kind is unknown.
    pub fn try_into_domain(self) -> Result<Notification> {
        Ok(Notification {
            id: NotificationId(self.id),
            receiver: UserId(self.receiver_id),
            kind: self.kind.parse()?,
            actor: UserId(self.actor_id),
            read: self.read,
            event_id: self.event_id,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;
    use crate::error::ApplicationError;

    #[test]
    fn test_post_record_owner() {
        let record = PostRecord {
            id: 1,
            owner_user_id: None,
            owner_community_id: Some(7),
            author_id: 2,
            content: "hello".into(),
            deleted: false,
            created_at: Utc::now(),
        };
        assert_eq!(
            record.clone().try_into_domain().unwrap().owner,
            PostOwner::Community(CommunityId(7))
        );

        let broken = PostRecord {
            owner_user_id: Some(2),
            ..record
        };
        assert!(matches!(
            broken.try_into_domain(),
            Err(ApplicationError::Domain(DomainError::InvalidPostOwner))
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let record = CommunityMemberRecord {
            community_id: 1,
            member_id: 2,
            member_role: "KING".into(),
            joined_at: Utc::now(),
        };
        assert!(matches!(
            record.try_into_domain(),
            Err(ApplicationError::Domain(DomainError::InvalidEnum { .. }))
        ));
    }
}
