use std::sync::Arc;

use crate::domain::*;
use crate::error::{ApplicationError, Result};
use crate::events::DomainEvent;
use crate::lifecycle::{emit, ensure};
use crate::permission::FriendshipPermissionService;
use crate::ports::{EntityStore, EventPublisher};

fn request_id(key: FriendshipRequestKey) -> String {
    format!("{}->{}", key.sender, key.receiver)
}

/// Friendship requests and friendships.
#[derive(Clone)]
pub struct FriendshipService {
    store: Arc<dyn EntityStore>,
    permissions: FriendshipPermissionService,
    publisher: Arc<dyn EventPublisher>,
}

impl FriendshipService {
    /// Create a new [`FriendshipService`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: FriendshipPermissionService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            permissions,
            publisher,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn send_request(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> Result<FriendshipRequest> {
        ensure(
            self.permissions
                .can_send_friendship_request(sender, receiver)
                .await?,
        )?;

        let request = self
            .store
            .insert_friendship_request(FriendshipRequestKey::new(sender, receiver))
            .await?;
        emit(
            self.publisher.as_ref(),
            DomainEvent::FriendshipRequestCreated(request.key),
        )
        .await;

        Ok(request)
    }

    /// Remove the request and create the friendship.
    ///
    /// A second call on the same key fails with `NotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn accept_request(&self, key: FriendshipRequestKey) -> Result<()> {
        if !self.store.accept_friendship_request(key).await? {
            return Err(ApplicationError::not_found(
                "friendship request",
                request_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::FriendshipRequestAccepted(key),
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn decline_request(&self, key: FriendshipRequestKey) -> Result<()> {
        if !self.store.remove_friendship_request(key).await? {
            return Err(ApplicationError::not_found(
                "friendship request",
                request_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::FriendshipRequestDeclined(key),
        )
        .await;
        Ok(())
    }

    /// Requests waiting for an answer from `receiver`.
    pub async fn pending_requests(
        &self,
        receiver: UserId,
    ) -> Result<Vec<FriendshipRequest>> {
        self.store.list_friendship_requests(receiver).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_friendship(&self, user: UserId, friend: UserId) -> Result<()> {
        ensure(self.permissions.can_delete_friendship(user, friend).await?)?;

        self.store
            .remove_friendship(FriendshipKey::new(user, friend)?)
            .await?;
        tracing::info!(%user, %friend, "friendship removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::*;
    use crate::error::ApplicationError;
    use crate::lifecycle::fixtures::{
        UnreachablePublisher, lifecycle, lifecycle_with,
    };
    use crate::permission::fixtures::*;
    use crate::ports::*;

    #[tokio::test]
    async fn test_accept_creates_friendship_once() {
        let store = store().await;
        let services = lifecycle(&store);

        let request = services.friendship.send_request(ALICE, BOB).await.unwrap();
        assert_eq!(
            services.friendship.pending_requests(BOB).await.unwrap(),
            vec![request.clone()]
        );

        services.friendship.accept_request(request.key).await.unwrap();
        let friendship = FriendshipKey::new(ALICE, BOB).unwrap();
        assert!(store.friendship_exists(friendship).await.unwrap());
        assert!(!store.friendship_request_exists(request.key).await.unwrap());

        let err = services
            .friendship
            .accept_request(request.key)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
        assert!(store.friendship_exists(friendship).await.unwrap());

        // receiver notified on creation, sender on acceptance.
        let received = store.list_notifications(BOB).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, NotificationKind::FriendshipRequestReceived);
        let accepted = store.list_notifications(ALICE).await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].kind, NotificationKind::FriendshipRequestAccepted);
        assert_eq!(accepted[0].actor, BOB);
    }

    #[tokio::test]
    async fn test_decline_notifies_sender_only() {
        let store = store().await;
        let services = lifecycle(&store);

        let request = services.friendship.send_request(ALICE, BOB).await.unwrap();
        services.friendship.decline_request(request.key).await.unwrap();

        assert!(!store.friendship_request_exists(request.key).await.unwrap());
        assert!(
            !store
                .friendship_exists(FriendshipKey::new(ALICE, BOB).unwrap())
                .await
                .unwrap()
        );
        let notifications = store.list_notifications(ALICE).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].kind,
            NotificationKind::FriendshipRequestDeclined
        );

        let err = services
            .friendship
            .decline_request(request.key)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_committed_accept_survives_publish_failure() {
        let store = store().await;
        let request = lifecycle(&store)
            .friendship
            .send_request(ALICE, BOB)
            .await
            .unwrap();

        let services =
            lifecycle_with(&store, std::sync::Arc::new(UnreachablePublisher));
        services.friendship.accept_request(request.key).await.unwrap();

        let friendship = FriendshipKey::new(ALICE, BOB).unwrap();
        assert!(store.friendship_exists(friendship).await.unwrap());
        assert!(!store.friendship_request_exists(request.key).await.unwrap());

        let err = services
            .friendship
            .accept_request(request.key)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));

        // creation also succeeds without a reachable broker.
        services.friendship.send_request(OWNER, BOB).await.unwrap();
    }

    #[tokio::test]
    async fn test_denied_request_is_forbidden() {
        let store = store().await;
        let services = lifecycle(&store);

        services.friendship.send_request(ALICE, BOB).await.unwrap();
        let err = services
            .friendship
            .send_request(BOB, ALICE)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));
    }

    #[tokio::test]
    async fn test_remove_friendship() {
        let store = store().await;
        let services = lifecycle(&store);

        befriend(&store, ALICE, BOB).await;
        services.friendship.remove_friendship(BOB, ALICE).await.unwrap();

        let err = services
            .friendship
            .remove_friendship(BOB, ALICE)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden));
    }
}
