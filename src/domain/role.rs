//! Role hierarchies.
//!
//! Both hierarchies are totally ordered: a role grants everything the roles
//! ranked below it grant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Platform-wide role of a user.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl SystemRole {
    /// Numeric rank, higher is more privileged.
    pub const fn rank(self) -> u8 {
        match self {
            SystemRole::User => 0,
            SystemRole::Moderator => 1,
            SystemRole::Admin => 2,
        }
    }

    pub const fn has_at_least(self, role: SystemRole) -> bool {
        self.rank() >= role.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SystemRole::User => "USER",
            SystemRole::Moderator => "MODERATOR",
            SystemRole::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(SystemRole::User),
            "MODERATOR" => Ok(SystemRole::Moderator),
            "ADMIN" => Ok(SystemRole::Admin),
            _ => Err(DomainError::InvalidEnum {
                kind: "system role",
                value: s.to_owned(),
            }),
        }
    }
}

/// Role of a member inside one community.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    #[default]
    Member,
    Moderator,
    Owner,
}

impl MemberRole {
    /// Numeric rank, higher is more privileged.
    pub const fn rank(self) -> u8 {
        match self {
            MemberRole::Member => 0,
            MemberRole::Moderator => 1,
            MemberRole::Owner => 2,
        }
    }

    pub const fn has_at_least(self, role: MemberRole) -> bool {
        self.rank() >= role.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MemberRole::Member => "MEMBER",
            MemberRole::Moderator => "MODERATOR",
            MemberRole::Owner => "OWNER",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MEMBER" => Ok(MemberRole::Member),
            "MODERATOR" => Ok(MemberRole::Moderator),
            "OWNER" => Ok(MemberRole::Owner),
            _ => Err(DomainError::InvalidEnum {
                kind: "member role",
                value: s.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_role_hierarchy() {
        assert!(SystemRole::Admin.has_at_least(SystemRole::Moderator));
        assert!(SystemRole::Admin.has_at_least(SystemRole::User));
        assert!(SystemRole::Moderator.has_at_least(SystemRole::Moderator));
        assert!(!SystemRole::Moderator.has_at_least(SystemRole::Admin));
        assert!(!SystemRole::User.has_at_least(SystemRole::Moderator));
    }

    #[test]
    fn test_member_role_hierarchy() {
        assert!(MemberRole::Owner.has_at_least(MemberRole::Moderator));
        assert!(MemberRole::Moderator.has_at_least(MemberRole::Member));
        assert!(!MemberRole::Member.has_at_least(MemberRole::Moderator));
        assert!(MemberRole::Owner > MemberRole::Moderator);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<SystemRole>(), Ok(SystemRole::Admin));
        assert_eq!("OWNER".parse::<MemberRole>(), Ok(MemberRole::Owner));

        for role in [MemberRole::Member, MemberRole::Moderator, MemberRole::Owner] {
            assert_eq!(role.as_str().parse::<MemberRole>(), Ok(role));
        }

        let err = "root".parse::<SystemRole>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidEnum { kind: "system role", .. }));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(
            serde_json::to_string(&MemberRole::Moderator).unwrap(),
            "\"MODERATOR\""
        );
        assert_eq!(
            serde_json::from_str::<SystemRole>("\"USER\"").unwrap(),
            SystemRole::User
        );
    }
}
