use std::sync::Arc;

use crate::domain::*;
use crate::error::{OrNotFound, Result};
use crate::events::DomainEvent;
use crate::lifecycle::{emit, ensure};
use crate::permission::UserPermissionService;
use crate::ports::{EntityStore, EventPublisher};

/// User deactivation.
///
/// Both operations publish `UserDeactivated`, every time they succeed, so
/// pending requests and invitations are swept again on a repeated ban.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
    permissions: UserPermissionService,
    publisher: Arc<dyn EventPublisher>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: UserPermissionService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            permissions,
            publisher,
        }
    }

    async fn deactivate(
        &self,
        target: UserId,
        update: impl FnOnce(&mut User),
    ) -> Result<()> {
        let mut user = self
            .store
            .find_user(target)
            .await?
            .or_not_found("user", target)?;
        update(&mut user);
        self.store.update_user(&user).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::UserDeactivated { user: target },
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn ban_user(&self, user: UserId, target: UserId) -> Result<()> {
        ensure(self.permissions.can_ban_user(user, target).await?)?;
        self.deactivate(target, |u| u.banned = true).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user: UserId, target: UserId) -> Result<()> {
        ensure(self.permissions.can_delete_user(user, target).await?)?;
        self.deactivate(target, |u| u.deleted = true).await
    }
}
