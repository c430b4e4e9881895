//! Community aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{
    CommunityId, CommunityInvitationKey, CommunityMemberKey, UserId,
};
use crate::domain::role::MemberRole;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub owner: UserId,
    pub name: String,
    pub is_private: bool,
    pub banned: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Community {
    /// A community is active while neither deleted nor banned.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.deleted && !self.banned
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        !self.is_private
    }
}

/// Values needed to create a [`Community`]; the store assigns the id and
/// registers the owner as [`MemberRole::Owner`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewCommunity {
    pub owner: UserId,
    pub name: String,
    pub is_private: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub key: CommunityMemberKey,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Pending community invitation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityInvitation {
    pub key: CommunityInvitationKey,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn community() -> Community {
        Community {
            id: CommunityId(1),
            owner: UserId(1),
            name: "rustaceans".into(),
            is_private: false,
            banned: false,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_activity_requires_both_flags_clear() {
        let mut c = community();
        assert!(c.is_active());

        c.banned = true;
        assert!(!c.is_active());

        c.banned = false;
        c.deleted = true;
        assert!(!c.is_active());
    }
}
