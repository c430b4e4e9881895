use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct FriendshipPermissionService {
    predicates: Predicates,
}

impl FriendshipPermissionService {
    /// Create a new [`FriendshipPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    /// A request is refused while either direction is already pending.
    pub async fn can_send_friendship_request(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> Result<bool> {
        let target = self.predicates.user(receiver).await?;
        let key = FriendshipRequestKey::new(sender, receiver);

        let allowed = sender != receiver
            && target.is_active()
            && !self.predicates.are_friends(sender, receiver).await?
            && !self.predicates.friendship_request_exists(key).await?
            && !self
                .predicates
                .friendship_request_exists(key.reversed())
                .await?;
        Ok(decision("friendship.send_request", allowed))
    }

    /// Only the receiver answers a request.
    pub async fn can_respond_to_friendship_request(
        &self,
        user: UserId,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        let allowed = key.receiver == user
            && self.predicates.friendship_request_exists(key).await?;
        Ok(decision("friendship.respond_request", allowed))
    }

    pub async fn can_delete_friendship(
        &self,
        user: UserId,
        friend: UserId,
    ) -> Result<bool> {
        let allowed = self.predicates.are_friends(user, friend).await?;
        Ok(decision("friendship.delete", allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplicationError;
    use crate::permission::fixtures::*;
    use crate::ports::*;

    #[tokio::test]
    async fn test_send_request() {
        let store = store().await;
        let service =
            FriendshipPermissionService::new(Predicates::new(store.clone()));

        assert!(service.can_send_friendship_request(ALICE, BOB).await.unwrap());
        assert!(!service.can_send_friendship_request(ALICE, ALICE).await.unwrap());

        let key = FriendshipRequestKey::new(ALICE, BOB);
        store.insert_friendship_request(key).await.unwrap();
        assert!(!service.can_send_friendship_request(ALICE, BOB).await.unwrap());
        assert!(!service.can_send_friendship_request(BOB, ALICE).await.unwrap());

        assert!(store.accept_friendship_request(key).await.unwrap());
        assert!(!service.can_send_friendship_request(BOB, ALICE).await.unwrap());
        assert!(service.can_delete_friendship(BOB, ALICE).await.unwrap());
    }

    #[tokio::test]
    async fn test_inactive_target() {
        let store = store().await;
        let service =
            FriendshipPermissionService::new(Predicates::new(store.clone()));

        update_user(&store, BOB, |u| u.banned = true).await;
        assert!(!service.can_send_friendship_request(ALICE, BOB).await.unwrap());

        let err = service
            .can_send_friendship_request(ALICE, UserId(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn test_respond_to_request() {
        let store = store().await;
        let service =
            FriendshipPermissionService::new(Predicates::new(store.clone()));
        let key = FriendshipRequestKey::new(ALICE, BOB);

        assert!(!service.can_respond_to_friendship_request(BOB, key).await.unwrap());
        store.insert_friendship_request(key).await.unwrap();
        assert!(service.can_respond_to_friendship_request(BOB, key).await.unwrap());
        assert!(
            !service
                .can_respond_to_friendship_request(ALICE, key)
                .await
                .unwrap()
        );
        assert!(!service.can_delete_friendship(ALICE, BOB).await.unwrap());
    }
}
