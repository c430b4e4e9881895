//! Permission predicates.
//!
//! Every gate re-reads the store: nothing is cached between calls, so a
//! membership removed a moment ago is never seen as still present. A gate
//! answers with `false` when the action is denied and fails only when an
//! entity it has to look up does not exist.

mod chat;
mod community;
mod friendship;
mod notification;
mod post;
mod private_message;
mod user;

pub use chat::*;
pub use community::*;
pub use friendship::*;
pub use notification::*;
pub use post::*;
pub use private_message::*;
pub use user::*;

use std::sync::Arc;

use crate::domain::*;
use crate::error::{OrNotFound, Result};
use crate::ports::EntityStore;

/// Record a gate decision and return it.
fn decision(gate: &'static str, allowed: bool) -> bool {
    metrics::counter!(
        "permission_checks_total",
        "gate" => gate,
        "allowed" => if allowed { "true" } else { "false" }
    )
    .increment(1);

    if !allowed {
        tracing::debug!(gate, "permission denied");
    }

    allowed
}

/// Relationship lookups shared by every permission service.
#[derive(Clone)]
pub struct Predicates {
    store: Arc<dyn EntityStore>,
}

impl Predicates {
    /// Create a new [`Predicates`].
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.store.find_user(id).await?.or_not_found("user", id)
    }

    pub async fn chat(&self, id: ChatId) -> Result<Chat> {
        self.store.find_chat(id).await?.or_not_found("chat", id)
    }

    pub async fn chat_message(&self, id: ChatMessageId) -> Result<ChatMessage> {
        self.store
            .find_chat_message(id)
            .await?
            .or_not_found("chat message", id)
    }

    pub async fn community(&self, id: CommunityId) -> Result<Community> {
        self.store
            .find_community(id)
            .await?
            .or_not_found("community", id)
    }

    pub async fn post(&self, id: PostId) -> Result<Post> {
        self.store.find_post(id).await?.or_not_found("post", id)
    }

    pub async fn comment(&self, id: CommentId) -> Result<PostComment> {
        self.store.find_comment(id).await?.or_not_found("comment", id)
    }

    pub async fn private_message(
        &self,
        id: PrivateMessageId,
    ) -> Result<PrivateMessage> {
        self.store
            .find_private_message(id)
            .await?
            .or_not_found("private message", id)
    }

    pub async fn notification(&self, id: NotificationId) -> Result<Notification> {
        self.store
            .find_notification(id)
            .await?
            .or_not_found("notification", id)
    }

    /// Whether `user` holds the MODERATOR or ADMIN system role.
    pub async fn is_system_moderator(&self, user: UserId) -> Result<bool> {
        Ok(self.user(user).await?.is_system_moderator())
    }

    /// Whether a friendship exists between `a` and `b`; a user is never
    /// their own friend.
    pub async fn are_friends(&self, a: UserId, b: UserId) -> Result<bool> {
        match FriendshipKey::new(a, b) {
            Ok(key) => self.store.friendship_exists(key).await,
            Err(_) => Ok(false),
        }
    }

    pub async fn friendship_request_exists(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        self.store.friendship_request_exists(key).await
    }

    pub async fn is_chat_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        self.store
            .chat_member_exists(ChatMemberKey::new(chat, user))
            .await
    }

    pub async fn chat_invitation_exists(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        self.store.chat_invitation_exists(key).await
    }

    /// Role of `user` in `community`, `None` when not a member.
    pub async fn community_role(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> Result<Option<MemberRole>> {
        Ok(self
            .store
            .find_community_member(CommunityMemberKey::new(community, user))
            .await?
            .map(|member| member.role))
    }

    pub async fn is_community_member(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> Result<bool> {
        Ok(self.community_role(community, user).await?.is_some())
    }

    /// Whether `user` holds at least MODERATOR inside `community`.
    pub async fn is_community_moderator(
        &self,
        community: CommunityId,
        user: UserId,
    ) -> Result<bool> {
        Ok(self
            .community_role(community, user)
            .await?
            .is_some_and(|role| role.has_at_least(MemberRole::Moderator)))
    }

    pub async fn community_invitation_exists(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        self.store.community_invitation_exists(key).await
    }

    pub async fn community_invitation_pending(
        &self,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        self.store
            .community_invitation_pending(receiver, community)
            .await
    }
}

/// Every permission service, sharing one store.
#[derive(Clone)]
pub struct Permissions {
    pub chat: ChatPermissionService,
    pub community: CommunityPermissionService,
    pub friendship: FriendshipPermissionService,
    pub post: PostPermissionService,
    pub private_message: PrivateMessagePermissionService,
    pub notification: NotificationPermissionService,
    pub user: UserPermissionService,
}

impl Permissions {
    /// Create a new [`Permissions`].
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let predicates = Predicates::new(store);

        Self {
            chat: ChatPermissionService::new(predicates.clone()),
            community: CommunityPermissionService::new(predicates.clone()),
            friendship: FriendshipPermissionService::new(predicates.clone()),
            post: PostPermissionService::new(predicates.clone()),
            private_message: PrivateMessagePermissionService::new(
                predicates.clone(),
            ),
            notification: NotificationPermissionService::new(
                predicates.clone(),
            ),
            user: UserPermissionService::new(predicates),
        }
    }
}

/// Fixtures shared by the permission and lifecycle tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::adapters::memory::MemoryStore;
    use crate::domain::*;
    use crate::ports::*;

    pub const OWNER: UserId = UserId(1);
    pub const ALICE: UserId = UserId(2);
    pub const BOB: UserId = UserId(3);
    pub const MODERATOR: UserId = UserId(4);
    pub const ADMIN: UserId = UserId(5);

    /// Store seeded with five active users.
    pub async fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::default());
        for user in [
            User::new(OWNER, "owner"),
            User::new(ALICE, "alice"),
            User::new(BOB, "bob"),
            User::new(MODERATOR, "moderator").with_role(SystemRole::Moderator),
            User::new(ADMIN, "admin").with_role(SystemRole::Admin),
        ] {
            store.insert_user(&user).await.unwrap();
        }
        store
    }

    pub async fn chat(store: &MemoryStore, is_private: bool) -> Chat {
        store
            .create_chat(&NewChat {
                owner: OWNER,
                name: "general".into(),
                is_private,
            })
            .await
            .unwrap()
    }

    pub async fn community(store: &MemoryStore, is_private: bool) -> Community {
        store
            .create_community(&NewCommunity {
                owner: OWNER,
                name: "rustaceans".into(),
                is_private,
            })
            .await
            .unwrap()
    }

    pub async fn befriend(store: &MemoryStore, a: UserId, b: UserId) {
        let key = FriendshipRequestKey::new(a, b);
        store.insert_friendship_request(key).await.unwrap();
        assert!(store.accept_friendship_request(key).await.unwrap());
    }

    pub async fn update_user(
        store: &MemoryStore,
        id: UserId,
        update: impl FnOnce(&mut User),
    ) {
        let mut user = store.find_user(id).await.unwrap().unwrap();
        update(&mut user);
        store.update_user(&user).await.unwrap();
    }
}
