use std::sync::Arc;

use crate::domain::*;
use crate::error::{ApplicationError, OrNotFound, Result};
use crate::events::DomainEvent;
use crate::lifecycle::{emit, ensure};
use crate::permission::CommunityPermissionService;
use crate::ports::{EntityStore, EventPublisher};

fn invitation_id(key: CommunityInvitationKey) -> String {
    format!("{}->{}@{}", key.sender, key.receiver, key.community)
}

/// Communities, their members and invitations.
#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn EntityStore>,
    permissions: CommunityPermissionService,
    publisher: Arc<dyn EventPublisher>,
}

impl CommunityService {
    /// Create a new [`CommunityService`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: CommunityPermissionService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            permissions,
            publisher,
        }
    }

    async fn community(&self, id: CommunityId) -> Result<Community> {
        self.store
            .find_community(id)
            .await?
            .or_not_found("community", id)
    }

    /// Create a community; `owner` receives the OWNER role.
    #[tracing::instrument(skip(self, name))]
    pub async fn create_community(
        &self,
        owner: UserId,
        name: &str,
        is_private: bool,
    ) -> Result<Community> {
        let user = self.store.find_user(owner).await?.or_not_found("user", owner)?;
        ensure(user.is_active())?;

        let community = self
            .store
            .create_community(&NewCommunity {
                owner,
                name: name.to_owned(),
                is_private,
            })
            .await?;
        tracing::info!(community = %community.id, "community created");
        Ok(community)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<()> {
        ensure(self.permissions.can_delete_community(user, community).await?)?;

        let mut community = self.community(community).await?;
        community.deleted = true;
        self.store.update_community(&community).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityDeactivated {
                community: community.id,
            },
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn ban_community(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<()> {
        ensure(self.permissions.can_ban_community(user, community).await?)?;

        let mut community = self.community(community).await?;
        community.banned = true;
        self.store.update_community(&community).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityDeactivated {
                community: community.id,
            },
        )
        .await;
        Ok(())
    }

    /// Turning a community public drops its pending invitations.
    #[tracing::instrument(skip(self))]
    pub async fn set_privacy(
        &self,
        user: UserId,
        community: CommunityId,
        is_private: bool,
    ) -> Result<()> {
        ensure(self.permissions.can_edit_community(user, community).await?)?;

        let mut community = self.community(community).await?;
        if community.is_private == is_private {
            return Ok(());
        }
        community.is_private = is_private;
        self.store.update_community(&community).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityVisibilityChanged {
                community: community.id,
                is_private,
            },
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn join(&self, user: UserId, community: CommunityId) -> Result<()> {
        ensure(self.permissions.can_join_community(user, community).await?)?;
        self.store
            .insert_community_member(
                CommunityMemberKey::new(community, user),
                MemberRole::Member,
            )
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn leave(&self, user: UserId, community: CommunityId) -> Result<()> {
        ensure(self.permissions.can_leave_community(user, community).await?)?;
        self.store
            .remove_community_member(CommunityMemberKey::new(community, user))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_member(
        &self,
        user: UserId,
        community: CommunityId,
        member: UserId,
    ) -> Result<()> {
        ensure(
            self.permissions
                .can_remove_community_member(user, community, member)
                .await?,
        )?;

        if !self
            .store
            .remove_community_member(CommunityMemberKey::new(community, member))
            .await?
        {
            return Err(ApplicationError::not_found("community member", member));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_role(
        &self,
        user: UserId,
        community: CommunityId,
        member: UserId,
        role: MemberRole,
    ) -> Result<()> {
        ensure(
            self.permissions
                .can_change_member_role(user, community, member, role)
                .await?,
        )?;

        let key = CommunityMemberKey::new(community, member);
        if !self.store.update_community_member_role(key, role).await? {
            return Err(ApplicationError::not_found("community member", member));
        }
        tracing::info!(%community, %member, %role, "member role changed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn invite(
        &self,
        sender: UserId,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<CommunityInvitation> {
        ensure(
            self.permissions
                .can_invite_to_community(sender, receiver, community)
                .await?,
        )?;

        let invitation = self
            .store
            .insert_community_invitation(CommunityInvitationKey::new(
                sender, receiver, community,
            ))
            .await?;
        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityInvitationCreated(invitation.key),
        )
        .await;

        Ok(invitation)
    }

    /// Remove the invitation and add the receiver with the MEMBER role.
    #[tracing::instrument(skip(self))]
    pub async fn accept_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<()> {
        if !self.store.accept_community_invitation(key).await? {
            return Err(ApplicationError::not_found(
                "community invitation",
                invitation_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityInvitationAccepted(key),
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn decline_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<()> {
        if !self.store.remove_community_invitation(key).await? {
            return Err(ApplicationError::not_found(
                "community invitation",
                invitation_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::CommunityInvitationDeclined(key),
        )
        .await;
        Ok(())
    }

    pub async fn pending_invitations(
        &self,
        user: UserId,
        community: CommunityId,
    ) -> Result<Vec<CommunityInvitation>> {
        ensure(
            self.permissions
                .can_view_community_invitations(user, community)
                .await?,
        )?;
        self.store.list_community_invitations(community).await
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::*;
    use crate::error::ApplicationError;
    use crate::lifecycle::fixtures::lifecycle;
    use crate::permission::Permissions;
    use crate::permission::fixtures::*;
    use crate::ports::*;

    #[tokio::test]
    async fn test_private_community_invitation_scenario() {
        let store = store().await;
        let services = lifecycle(&store);
        let permissions = Permissions::new(store.clone());
        let community = services
            .community
            .create_community(ALICE, "crabs", true)
            .await
            .unwrap();

        assert!(
            permissions
                .community
                .can_invite_to_community(ALICE, BOB, community.id)
                .await
                .unwrap()
        );
        let invitation = services
            .community
            .invite(ALICE, BOB, community.id)
            .await
            .unwrap();
        assert!(
            !permissions
                .community
                .can_invite_to_community(ALICE, BOB, community.id)
                .await
                .unwrap()
        );

        services
            .community
            .accept_invitation(invitation.key)
            .await
            .unwrap();

        let member = store
            .find_community_member(CommunityMemberKey::new(community.id, BOB))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.role, MemberRole::Member);
        assert!(
            !store
                .community_invitation_exists(invitation.key)
                .await
                .unwrap()
        );

        let notifications = store.list_notifications(ALICE).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].kind,
            NotificationKind::CommunityInvitationAccepted
        );
        assert_eq!(notifications[0].actor, BOB);
    }

    #[tokio::test]
    async fn test_decline_invitation() {
        let store = store().await;
        let services = lifecycle(&store);
        let community = community(&store, true).await;

        let invitation = services
            .community
            .invite(OWNER, BOB, community.id)
            .await
            .unwrap();
        services
            .community
            .decline_invitation(invitation.key)
            .await
            .unwrap();

        assert!(
            store
                .find_community_member(CommunityMemberKey::new(community.id, BOB))
                .await
                .unwrap()
                .is_none()
        );
        let err = services
            .community
            .decline_invitation(invitation.key)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_ban_drops_invitations() {
        let store = store().await;
        let services = lifecycle(&store);
        let community = community(&store, false).await;

        let invitation = services
            .community
            .invite(OWNER, BOB, community.id)
            .await
            .unwrap();

        let err = services
            .community
            .ban_community(OWNER, community.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));

        services
            .community
            .ban_community(MODERATOR, community.id)
            .await
            .unwrap();
        assert!(
            !store
                .community_invitation_exists(invitation.key)
                .await
                .unwrap()
        );
        let err = services.community.join(ALICE, community.id).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));

        // its own moderators can no longer edit it.
        let err = services
            .community
            .set_privacy(OWNER, community.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));
        let stored = store.find_community(community.id).await.unwrap().unwrap();
        assert!(!stored.is_private);
    }

    #[tokio::test]
    async fn test_change_role() {
        let store = store().await;
        let services = lifecycle(&store);
        let community = community(&store, false).await;
        services.community.join(ALICE, community.id).await.unwrap();

        services
            .community
            .change_role(OWNER, community.id, ALICE, MemberRole::Moderator)
            .await
            .unwrap();
        assert_eq!(
            store
                .find_community_member(CommunityMemberKey::new(community.id, ALICE))
                .await
                .unwrap()
                .unwrap()
                .role,
            MemberRole::Moderator
        );

        // moderators see invitations, but cannot hand out ownership.
        assert!(
            services
                .community
                .pending_invitations(ALICE, community.id)
                .await
                .unwrap()
                .is_empty()
        );
        let err = services
            .community
            .change_role(OWNER, community.id, ALICE, MemberRole::Owner)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));
    }

    #[tokio::test]
    async fn test_turning_public_drops_invitations() {
        let store = store().await;
        let services = lifecycle(&store);
        let community = community(&store, true).await;

        let invitation = services
            .community
            .invite(OWNER, BOB, community.id)
            .await
            .unwrap();
        services
            .community
            .set_privacy(OWNER, community.id, false)
            .await
            .unwrap();

        assert!(
            !store
                .community_invitation_exists(invitation.key)
                .await
                .unwrap()
        );
        services.community.join(BOB, community.id).await.unwrap();
        services.community.leave(BOB, community.id).await.unwrap();
    }
}
