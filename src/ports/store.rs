//! Entity store ports.
//!
//! One repository trait per aggregate, combined into [`EntityStore`]. Every
//! `accept_*` method is a single unit of work: the pending row is removed and
//! the relation is created together, or nothing happens.

use async_trait::async_trait;

use crate::domain::*;
use crate::error::Result;

/// Port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Insert a user with an externally assigned id.
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn update_user(&self, user: &User) -> Result<()>;
}

/// Port for friendships and pending friendship requests.
#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    async fn friendship_exists(&self, key: FriendshipKey) -> Result<bool>;

    /// Returns `false` when no friendship existed.
    async fn remove_friendship(&self, key: FriendshipKey) -> Result<bool>;

    async fn friendship_request_exists(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool>;

    async fn insert_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<FriendshipRequest>;

    /// Returns `false` when the request was not pending.
    async fn remove_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool>;

    /// Remove the request and create the friendship.
    ///
    /// Returns `false`, writing nothing, when the request was not pending.
    async fn accept_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool>;

    /// Pending requests addressed to `receiver`.
    async fn list_friendship_requests(
        &self,
        receiver: UserId,
    ) -> Result<Vec<FriendshipRequest>>;

    /// Remove every request sent or received by `user`.
    async fn remove_friendship_requests_of(&self, user: UserId) -> Result<u64>;
}

/// Port for chats, their members, invitations and messages.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_chat(&self, id: ChatId) -> Result<Option<Chat>>;

    /// Create the chat and register its owner as a member.
    async fn create_chat(&self, chat: &NewChat) -> Result<Chat>;

    async fn update_chat(&self, chat: &Chat) -> Result<()>;

    async fn chat_member_exists(&self, key: ChatMemberKey) -> Result<bool>;

    async fn insert_chat_member(&self, key: ChatMemberKey) -> Result<()>;

    async fn remove_chat_member(&self, key: ChatMemberKey) -> Result<bool>;

    async fn chat_invitation_exists(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool>;

    async fn insert_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<ChatInvitation>;

    async fn remove_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool>;

    /// Remove the invitation and add the receiver as a member.
    ///
    /// Returns `false`, writing nothing, when the invitation was not pending.
    async fn accept_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool>;

    async fn list_chat_invitations(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatInvitation>>;

    /// Remove every chat invitation sent or received by `user`.
    async fn remove_chat_invitations_of_user(&self, user: UserId)
    -> Result<u64>;

    /// Remove every pending invitation to `chat`.
    async fn remove_chat_invitations_of_chat(&self, chat: ChatId)
    -> Result<u64>;

    async fn find_chat_message(
        &self,
        id: ChatMessageId,
    ) -> Result<Option<ChatMessage>>;

    async fn insert_chat_message(
        &self,
        message: &NewChatMessage,
    ) -> Result<ChatMessage>;

    async fn update_chat_message(&self, message: &ChatMessage) -> Result<()>;
}

/// Port for communities, their members and invitations.
#[async_trait]
pub trait CommunityRepository: Send + Sync {
    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>>;

    /// Create the community and register its owner with
    /// [`MemberRole::Owner`].
    async fn create_community(
        &self,
        community: &NewCommunity,
    ) -> Result<Community>;

    async fn update_community(&self, community: &Community) -> Result<()>;

    async fn find_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<Option<CommunityMember>>;

    async fn insert_community_member(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<()>;

    /// Returns `false` when `key` is not a member.
    async fn update_community_member_role(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<bool>;

    async fn remove_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<bool>;

    async fn community_invitation_exists(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool>;

    /// Whether `receiver` has a pending invitation to `community` from
    /// anyone.
    async fn community_invitation_pending(
        &self,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<bool>;

    async fn insert_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<CommunityInvitation>;

    async fn remove_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool>;

    /// Remove the invitation and add the receiver with
    /// [`MemberRole::Member`].
    ///
    /// Returns `false`, writing nothing, when the invitation was not pending.
    async fn accept_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool>;

    async fn list_community_invitations(
        &self,
        community: CommunityId,
    ) -> Result<Vec<CommunityInvitation>>;

    async fn remove_community_invitations_of_user(
        &self,
        user: UserId,
    ) -> Result<u64>;

    async fn remove_community_invitations_of_community(
        &self,
        community: CommunityId,
    ) -> Result<u64>;
}

/// Port for posts and comments.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_post(&self, id: PostId) -> Result<Option<Post>>;

    async fn insert_post(&self, post: &NewPost) -> Result<Post>;

    async fn update_post(&self, post: &Post) -> Result<()>;

    async fn find_comment(&self, id: CommentId) -> Result<Option<PostComment>>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<PostComment>;

    async fn update_comment(&self, comment: &PostComment) -> Result<()>;
}

/// Port for private messages.
#[async_trait]
pub trait PrivateMessageRepository: Send + Sync {
    async fn find_private_message(
        &self,
        id: PrivateMessageId,
    ) -> Result<Option<PrivateMessage>>;

    async fn insert_private_message(
        &self,
        message: &NewPrivateMessage,
    ) -> Result<PrivateMessage>;

    async fn update_private_message(
        &self,
        message: &PrivateMessage,
    ) -> Result<()>;
}

/// Port for notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>>;

    /// Returns `None` when a notification for the same event and receiver
    /// already exists.
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>>;

    async fn list_notifications(
        &self,
        receiver: UserId,
    ) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool>;

    async fn remove_notification(&self, id: NotificationId) -> Result<bool>;
}

/// Every repository the core reads or writes.
pub trait EntityStore:
    UserRepository
    + FriendshipRepository
    + ChatRepository
    + CommunityRepository
    + PostRepository
    + PrivateMessageRepository
    + NotificationRepository
{
}

impl<T> EntityStore for T where
    T: UserRepository
        + FriendshipRepository
        + ChatRepository
        + CommunityRepository
        + PostRepository
        + PrivateMessageRepository
        + NotificationRepository
{
}
