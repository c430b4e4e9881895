//! Posts and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::id::{CommentId, CommunityId, PostId, UserId};

/// Owner of a post: exactly one user wall or one community.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PostOwner {
    User(UserId),
    Community(CommunityId),
}

impl PostOwner {
    /// Build an owner from the two nullable owner columns.
    ///
    /// # Errors
    ///
    /// Returns `Err` if both or neither are set.
    pub fn from_columns(
        user: Option<UserId>,
        community: Option<CommunityId>,
    ) -> Result<Self> {
        match (user, community) {
            (Some(user), None) => Ok(PostOwner::User(user)),
            (None, Some(community)) => Ok(PostOwner::Community(community)),
            _ => Err(DomainError::InvalidPostOwner),
        }
    }

    /// Split back into the two nullable owner columns.
    pub fn into_columns(self) -> (Option<UserId>, Option<CommunityId>) {
        match self {
            PostOwner::User(user) => (Some(user), None),
            PostOwner::Community(community) => (None, Some(community)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub owner: PostOwner,
    pub author: UserId,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPost {
    pub owner: PostOwner,
    pub author: UserId,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostComment {
    pub id: CommentId,
    pub post: PostId,
    pub author: UserId,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewComment {
    pub post: PostId,
    pub author: UserId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_from_columns() {
        assert_eq!(
            PostOwner::from_columns(Some(UserId(1)), None),
            Ok(PostOwner::User(UserId(1)))
        );
        assert_eq!(
            PostOwner::from_columns(None, Some(CommunityId(2))),
            Ok(PostOwner::Community(CommunityId(2)))
        );
        assert_eq!(
            PostOwner::from_columns(Some(UserId(1)), Some(CommunityId(2))),
            Err(DomainError::InvalidPostOwner)
        );
        assert_eq!(
            PostOwner::from_columns(None, None),
            Err(DomainError::InvalidPostOwner)
        );
    }

    #[test]
    fn test_owner_into_columns() {
        let owner = PostOwner::Community(CommunityId(5));
        let (user, community) = owner.into_columns();
        assert_eq!(PostOwner::from_columns(user, community), Ok(owner));
    }
}
