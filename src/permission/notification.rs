use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct NotificationPermissionService {
    predicates: Predicates,
}

impl NotificationPermissionService {
    /// Create a new [`NotificationPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    async fn receiver_or_moderator(
        &self,
        user: UserId,
        notification: NotificationId,
    ) -> Result<bool> {
        let notification = self.predicates.notification(notification).await?;
        Ok(notification.receiver == user
            || self.predicates.is_system_moderator(user).await?)
    }

    pub async fn can_view_notifications(
        &self,
        user: UserId,
        receiver: UserId,
    ) -> Result<bool> {
        Ok(decision("notification.view", user == receiver))
    }

    pub async fn can_mark_notification_read(
        &self,
        user: UserId,
        notification: NotificationId,
    ) -> Result<bool> {
        let allowed = self.receiver_or_moderator(user, notification).await?;
        Ok(decision("notification.mark_read", allowed))
    }

    pub async fn can_delete_notification(
        &self,
        user: UserId,
        notification: NotificationId,
    ) -> Result<bool> {
        let allowed = self.receiver_or_moderator(user, notification).await?;
        Ok(decision("notification.delete", allowed))
    }
}
