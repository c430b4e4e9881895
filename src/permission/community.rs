//! Community permission gates.
//!
//! Same shape as chat gates, with [`MemberRole`] instead of a boolean
//! membership.

use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct CommunityPermissionService {
    predicates: Predicates,
}

impl CommunityPermissionService {
    /// Create a new [`CommunityPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    async fn visible(&self, user: UserId, community: &Community) -> Result<bool> {
        Ok(community.is_active()
            && (community.is_public()
                || self
                    .predicates
                    .is_community_member(community.id, user)
                    .await?
                || self.predicates.is_system_moderator(user).await?))
    }

    pub async fn can_view_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = self.visible(user, &community).await?;
        Ok(decision("community.view", allowed))
    }

    pub async fn can_view_community_members(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = self.visible(user, &community).await?;
        Ok(decision("community.view_members", allowed))
    }

    pub async fn can_delete_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = community.is_active()
            && (community.owner == user
                || self.predicates.is_system_moderator(user).await?);
        Ok(decision("community.delete", allowed))
    }

    /// Banning is reserved to system moderators; an already banned
    /// community may be banned again.
    pub async fn can_ban_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = !community.deleted
            && self.predicates.is_system_moderator(user).await?;
        Ok(decision("community.ban", allowed))
    }

    pub async fn can_edit_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = community.is_active()
            && self
                .predicates
                .is_community_moderator(community.id, user)
                .await?;
        Ok(decision("community.edit", allowed))
    }

    pub async fn can_view_community_invitations(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = community.is_active()
            && self
                .predicates
                .is_community_moderator(community.id, user)
                .await?;
        Ok(decision("community.view_invitations", allowed))
    }

    pub async fn can_join_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = community.is_active()
            && community.is_public()
            && !self
                .predicates
                .is_community_member(community.id, user)
                .await?;
        Ok(decision("community.join", allowed))
    }

    /// Anyone may invite to a public community, member or not. Private
    /// communities only accept invitations from moderators and the owner.
    ///
    /// A receiver holds at most one pending invitation per community,
    /// whoever sent it.
    pub async fn can_invite_to_community(
        &self,
        sender: UserId,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;

        let allowed = sender != receiver
            && community.is_active()
            && self.predicates.user(receiver).await?.is_active()
            && !self
                .predicates
                .community_invitation_pending(receiver, community.id)
                .await?
            && !self
                .predicates
                .is_community_member(community.id, receiver)
                .await?
            && (community.is_public()
                || self
                    .predicates
                    .is_community_moderator(community.id, sender)
                    .await?);
        Ok(decision("community.invite", allowed))
    }

    /// Only the invited user may accept or decline a pending invitation.
    pub async fn can_respond_to_community_invitation(
        &self,
        user: UserId,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        let allowed = key.receiver == user
            && self.predicates.community_invitation_exists(key).await?;
        Ok(decision("community.respond_invitation", allowed))
    }

    /// The owner can never be removed.
    pub async fn can_remove_community_member(
        &self,
        user: UserId,
        community: CommunityId,
        member: UserId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;

        let target = self.predicates.community_role(community.id, member).await?;
        let allowed = matches!(target, Some(role) if role != MemberRole::Owner)
            && (self.predicates.is_system_moderator(user).await?
                || self
                    .predicates
                    .is_community_moderator(community.id, user)
                    .await?);
        Ok(decision("community.remove_member", allowed))
    }

    pub async fn can_leave_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let role = self.predicates.community_role(community.id, user).await?;
        let allowed = matches!(role, Some(role) if role != MemberRole::Owner);
        Ok(decision("community.leave", allowed))
    }

    /// Ownership is assigned at creation and cannot be handed out.
    pub async fn can_change_member_role(
        &self,
        user: UserId,
        community: CommunityId,
        member: UserId,
        role: MemberRole,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;

        let allowed = role != MemberRole::Owner
            && member != user
            && self.predicates.community_role(community.id, user).await?
                == Some(MemberRole::Owner)
            && self
                .predicates
                .is_community_member(community.id, member)
                .await?;
        Ok(decision("community.change_role", allowed))
    }
}
