use std::sync::Arc;

use crate::domain::*;
use crate::error::{ApplicationError, Result};
use crate::lifecycle::ensure;
use crate::permission::NotificationPermissionService;
use crate::ports::EntityStore;

/// Notification inbox of a user.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn EntityStore>,
    permissions: NotificationPermissionService,
}

impl NotificationService {
    /// Create a new [`NotificationService`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: NotificationPermissionService,
    ) -> Self {
        Self { store, permissions }
    }

    /// Notifications of `receiver`, newest first.
    pub async fn list(
        &self,
        user: UserId,
        receiver: UserId,
    ) -> Result<Vec<Notification>> {
        ensure(
            self.permissions
                .can_view_notifications(user, receiver)
                .await?,
        )?;
        self.store.list_notifications(receiver).await
    }

    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> Result<()> {
        ensure(self.permissions.can_mark_notification_read(user, id).await?)?;
        if !self.store.mark_notification_read(id).await? {
            return Err(ApplicationError::not_found("notification", id));
        }
        Ok(())
    }

    pub async fn delete(&self, user: UserId, id: NotificationId) -> Result<()> {
        ensure(self.permissions.can_delete_notification(user, id).await?)?;
        if !self.store.remove_notification(id).await? {
            return Err(ApplicationError::not_found("notification", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ApplicationError;
    use crate::lifecycle::fixtures::lifecycle;
    use crate::permission::fixtures::*;

    #[tokio::test]
    async fn test_inbox() {
        let store = store().await;
        let services = lifecycle(&store);
        services.friendship.send_request(ALICE, BOB).await.unwrap();

        let inbox = services.notification.list(BOB, BOB).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].read);

        let err = services.notification.list(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));

        services.notification.mark_read(BOB, inbox[0].id).await.unwrap();
        assert!(services.notification.list(BOB, BOB).await.unwrap()[0].read);

        let err = services
            .notification
            .delete(ALICE, inbox[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));

        services.notification.delete(MODERATOR, inbox[0].id).await.unwrap();
        assert!(services.notification.list(BOB, BOB).await.unwrap().is_empty());
    }
}
