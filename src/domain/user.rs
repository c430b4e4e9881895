//! User domain entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{FriendshipKey, FriendshipRequestKey, UserId};
use crate::domain::role::SystemRole;

/// Registered user as seen by the authorization core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub system_role: SystemRole,
    pub banned: bool,
    pub deleted: bool,
    pub posts_public: bool,
    pub accepting_private_msgs: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new [`User`] with the default role and public posts.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            system_role: SystemRole::User,
            banned: false,
            deleted: false,
            posts_public: true,
            accepting_private_msgs: true,
            created_at: Utc::now(),
        }
    }

    /// Update `system_role` of [`User`].
    pub fn with_role(mut self, role: SystemRole) -> Self {
        self.system_role = role;
        self
    }

    /// Update `posts_public` of [`User`].
    pub fn with_posts_public(mut self, public: bool) -> Self {
        self.posts_public = public;
        self
    }

    /// Update `accepting_private_msgs` of [`User`].
    pub fn with_private_messages(mut self, accepting: bool) -> Self {
        self.accepting_private_msgs = accepting;
        self
    }

    /// A user is active while neither deleted nor banned.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.banned
    }

    /// Moderators and admins override domain permission checks.
    #[inline]
    pub fn is_system_moderator(&self) -> bool {
        self.system_role.has_at_least(SystemRole::Moderator)
    }
}

/// Accepted friendship.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub key: FriendshipKey,
    pub created_at: DateTime<Utc>,
}

/// Pending friendship request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FriendshipRequest {
    pub key: FriendshipRequestKey,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_activity() {
        let mut user = User::new(UserId(1), "ada");
        assert!(user.is_active());

        user.banned = true;
        assert!(!user.is_active());

        user.banned = false;
        user.deleted = true;
        assert!(!user.is_active());
    }

    #[test]
    fn test_system_moderator() {
        assert!(!User::new(UserId(1), "a").is_system_moderator());
        assert!(
            User::new(UserId(2), "b")
                .with_role(SystemRole::Moderator)
                .is_system_moderator()
        );
        assert!(
            User::new(UserId(3), "c")
                .with_role(SystemRole::Admin)
                .is_system_moderator()
        );
    }
}
