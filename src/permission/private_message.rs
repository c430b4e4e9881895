use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct PrivateMessagePermissionService {
    predicates: Predicates,
}

impl PrivateMessagePermissionService {
    /// Create a new [`PrivateMessagePermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    /// Friends can always write to each other, even when the receiver
    /// turned private messages off.
    pub async fn can_send_private_message(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> Result<bool> {
        let target = self.predicates.user(receiver).await?;
        let allowed = sender != receiver
            && target.is_active()
            && (target.accepting_private_msgs
                || self.predicates.are_friends(sender, receiver).await?);
        Ok(decision("private_message.send", allowed))
    }

    pub async fn can_read_private_message(
        &self,
        user: UserId,
        message: PrivateMessageId,
    ) -> Result<bool> {
        let message = self.predicates.private_message(message).await?;
        let allowed = message.sender == user || message.receiver == user;
        Ok(decision("private_message.read", allowed))
    }

    pub async fn can_modify_private_message(
        &self,
        user: UserId,
        message: PrivateMessageId,
    ) -> Result<bool> {
        let message = self.predicates.private_message(message).await?;
        let allowed = message.sender == user;
        Ok(decision("private_message.modify", allowed))
    }

    pub async fn can_delete_private_message(
        &self,
        user: UserId,
        message: PrivateMessageId,
    ) -> Result<bool> {
        let message = self.predicates.private_message(message).await?;
        let allowed = message.sender == user
            || self.predicates.is_system_moderator(user).await?;
        Ok(decision("private_message.delete", allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::fixtures::*;
    use crate::ports::*;

    #[tokio::test]
    async fn test_friendship_unlocks_private_messages() {
        let store = store().await;
        let service =
            PrivateMessagePermissionService::new(Predicates::new(store.clone()));

        update_user(&store, BOB, |u| u.accepting_private_msgs = false).await;
        assert!(!service.can_send_private_message(ALICE, BOB).await.unwrap());

        befriend(&store, ALICE, BOB).await;
        assert!(service.can_send_private_message(ALICE, BOB).await.unwrap());
        assert!(!service.can_send_private_message(ALICE, ALICE).await.unwrap());

        update_user(&store, BOB, |u| u.deleted = true).await;
        assert!(!service.can_send_private_message(ALICE, BOB).await.unwrap());
    }

    #[tokio::test]
    async fn test_message_access() {
        let store = store().await;
        let service =
            PrivateMessagePermissionService::new(Predicates::new(store.clone()));

        let message = store
            .insert_private_message(&NewPrivateMessage {
                sender: ALICE,
                receiver: BOB,
                content: "psst".into(),
            })
            .await
            .unwrap();

        assert!(service.can_read_private_message(ALICE, message.id).await.unwrap());
        assert!(service.can_read_private_message(BOB, message.id).await.unwrap());
        assert!(!service.can_read_private_message(OWNER, message.id).await.unwrap());

        assert!(service.can_modify_private_message(ALICE, message.id).await.unwrap());
        assert!(!service.can_modify_private_message(BOB, message.id).await.unwrap());

        assert!(service.can_delete_private_message(ALICE, message.id).await.unwrap());
        assert!(service.can_delete_private_message(ADMIN, message.id).await.unwrap());
        assert!(!service.can_delete_private_message(BOB, message.id).await.unwrap());
    }
}
