//! In-memory [`EntityStore`](crate::ports::EntityStore).
//!
//! Every operation takes the table lock once, so each call is one unit of
//! work, like a transaction on the Postgres adapter.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::*;
use crate::error::{ApplicationError, Result};
use crate::ports::*;

#[derive(Default)]
struct Tables {
    sequence: i64,
    users: HashMap<UserId, User>,
    friendships: HashMap<FriendshipKey, Friendship>,
    friendship_requests: HashMap<FriendshipRequestKey, FriendshipRequest>,
    chats: HashMap<ChatId, Chat>,
    chat_members: HashSet<ChatMemberKey>,
    chat_invitations: HashMap<ChatInvitationKey, ChatInvitation>,
    chat_messages: HashMap<ChatMessageId, ChatMessage>,
    communities: HashMap<CommunityId, Community>,
    community_members: HashMap<CommunityMemberKey, CommunityMember>,
    community_invitations: HashMap<CommunityInvitationKey, CommunityInvitation>,
    posts: HashMap<PostId, Post>,
    comments: HashMap<CommentId, PostComment>,
    private_messages: HashMap<PrivateMessageId, PrivateMessage>,
    notifications: BTreeMap<NotificationId, Notification>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }
}

fn count(before: usize, after: usize) -> u64 {
    (before - after) as u64
}

/// Store keeping every table behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(ApplicationError::AlreadyExists { entity: "user" });
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("user", user.id)),
        }
    }
}

#[async_trait]
impl FriendshipRepository for MemoryStore {
    async fn friendship_exists(&self, key: FriendshipKey) -> Result<bool> {
        Ok(self.tables.read().await.friendships.contains_key(&key))
    }

    async fn remove_friendship(&self, key: FriendshipKey) -> Result<bool> {
        Ok(self.tables.write().await.friendships.remove(&key).is_some())
    }

    async fn friendship_request_exists(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .friendship_requests
            .contains_key(&key))
    }

    async fn insert_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<FriendshipRequest> {
        // a request always targets someone else.
        key.friendship()?;

        let mut tables = self.tables.write().await;
        if tables.friendship_requests.contains_key(&key) {
            return Err(ApplicationError::AlreadyExists {
                entity: "friendship request",
            });
        }

        let request = FriendshipRequest {
            key,
            created_at: Utc::now(),
        };
        tables.friendship_requests.insert(key, request.clone());
        Ok(request)
    }

    async fn remove_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .friendship_requests
            .remove(&key)
            .is_some())
    }

    async fn accept_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        let friendship = key.friendship()?;

        let mut tables = self.tables.write().await;
        if tables.friendship_requests.remove(&key).is_none() {
            return Ok(false);
        }
        tables.friendship_requests.remove(&key.reversed());
        tables.friendships.entry(friendship).or_insert(Friendship {
            key: friendship,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_friendship_requests(
        &self,
        receiver: UserId,
    ) -> Result<Vec<FriendshipRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<_> = tables
            .friendship_requests
            .values()
            .filter(|r| r.key.receiver == receiver)
            .cloned()
            .collect();
        requests.sort_by_key(|r| (r.created_at, r.key.sender));
        Ok(requests)
    }

    async fn remove_friendship_requests_of(&self, user: UserId) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.friendship_requests.len();
        tables
            .friendship_requests
            .retain(|key, _| key.sender != user && key.receiver != user);
        Ok(count(before, tables.friendship_requests.len()))
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn find_chat(&self, id: ChatId) -> Result<Option<Chat>> {
        Ok(self.tables.read().await.chats.get(&id).cloned())
    }

    async fn create_chat(&self, chat: &NewChat) -> Result<Chat> {
        let mut tables = self.tables.write().await;
        let chat = Chat {
            id: ChatId(tables.next_id()),
            owner: chat.owner,
            name: chat.name.clone(),
            is_private: chat.is_private,
            deleted: false,
            created_at: Utc::now(),
        };

        tables.chats.insert(chat.id, chat.clone());
        tables
            .chat_members
            .insert(ChatMemberKey::new(chat.id, chat.owner));
        Ok(chat)
    }

    async fn update_chat(&self, chat: &Chat) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.chats.get_mut(&chat.id) {
            Some(row) => {
                *row = chat.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("chat", chat.id)),
        }
    }

    async fn chat_member_exists(&self, key: ChatMemberKey) -> Result<bool> {
        Ok(self.tables.read().await.chat_members.contains(&key))
    }

    async fn insert_chat_member(&self, key: ChatMemberKey) -> Result<()> {
        if self.tables.write().await.chat_members.insert(key) {
            Ok(())
        } else {
            Err(ApplicationError::AlreadyExists {
                entity: "chat member",
            })
        }
    }

    async fn remove_chat_member(&self, key: ChatMemberKey) -> Result<bool> {
        Ok(self.tables.write().await.chat_members.remove(&key))
    }

    async fn chat_invitation_exists(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .chat_invitations
            .contains_key(&key))
    }

    async fn insert_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<ChatInvitation> {
        let mut tables = self.tables.write().await;
        if tables.chat_invitations.contains_key(&key) {
            return Err(ApplicationError::AlreadyExists {
                entity: "chat invitation",
            });
        }

        let invitation = ChatInvitation {
            key,
            created_at: Utc::now(),
        };
        tables.chat_invitations.insert(key, invitation.clone());
        Ok(invitation)
    }

    async fn remove_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .chat_invitations
            .remove(&key)
            .is_some())
    }

    async fn accept_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.chat_invitations.remove(&key).is_none() {
            return Ok(false);
        }
        tables.chat_members.insert(key.membership());
        Ok(true)
    }

    async fn list_chat_invitations(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatInvitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<_> = tables
            .chat_invitations
            .values()
            .filter(|i| i.key.chat == chat)
            .cloned()
            .collect();
        invitations.sort_by_key(|i| (i.created_at, i.key.receiver));
        Ok(invitations)
    }

    async fn remove_chat_invitations_of_user(
        &self,
        user: UserId,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.chat_invitations.len();
        tables
            .chat_invitations
            .retain(|key, _| key.sender != user && key.receiver != user);
        Ok(count(before, tables.chat_invitations.len()))
    }

    async fn remove_chat_invitations_of_chat(
        &self,
        chat: ChatId,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.chat_invitations.len();
        tables.chat_invitations.retain(|key, _| key.chat != chat);
        Ok(count(before, tables.chat_invitations.len()))
    }

    async fn find_chat_message(
        &self,
        id: ChatMessageId,
    ) -> Result<Option<ChatMessage>> {
        Ok(self.tables.read().await.chat_messages.get(&id).cloned())
    }

    async fn insert_chat_message(
        &self,
        message: &NewChatMessage,
    ) -> Result<ChatMessage> {
        let mut tables = self.tables.write().await;
        let message = ChatMessage {
            id: ChatMessageId(tables.next_id()),
            chat: message.chat,
            author: message.author,
            content: message.content.clone(),
            deleted: false,
            created_at: Utc::now(),
        };
        tables.chat_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn update_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.chat_messages.get_mut(&message.id) {
            Some(row) => {
                *row = message.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("chat message", message.id)),
        }
    }
}

#[async_trait]
impl CommunityRepository for MemoryStore {
    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>> {
        Ok(self.tables.read().await.communities.get(&id).cloned())
    }

    async fn create_community(
        &self,
        community: &NewCommunity,
    ) -> Result<Community> {
        let mut tables = self.tables.write().await;
        let community = Community {
            id: CommunityId(tables.next_id()),
            owner: community.owner,
            name: community.name.clone(),
            is_private: community.is_private,
            banned: false,
            deleted: false,
            created_at: Utc::now(),
        };

        let key = CommunityMemberKey::new(community.id, community.owner);
        tables.communities.insert(community.id, community.clone());
        tables.community_members.insert(
            key,
            CommunityMember {
                key,
                role: MemberRole::Owner,
                joined_at: community.created_at,
            },
        );
        Ok(community)
    }

    async fn update_community(&self, community: &Community) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.communities.get_mut(&community.id) {
            Some(row) => {
                *row = community.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("community", community.id)),
        }
    }

    async fn find_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<Option<CommunityMember>> {
        Ok(self
            .tables
            .read()
            .await
            .community_members
            .get(&key)
            .cloned())
    }

    async fn insert_community_member(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.community_members.contains_key(&key) {
            return Err(ApplicationError::AlreadyExists {
                entity: "community member",
            });
        }
        tables.community_members.insert(
            key,
            CommunityMember {
                key,
                role,
                joined_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn update_community_member_role(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.community_members.get_mut(&key) {
            Some(member) => {
                member.role = role;
                true
            },
            None => false,
        })
    }

    async fn remove_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .community_members
            .remove(&key)
            .is_some())
    }

    async fn community_invitation_exists(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .community_invitations
            .contains_key(&key))
    }

    async fn community_invitation_pending(
        &self,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .community_invitations
            .keys()
            .any(|key| key.receiver == receiver && key.community == community))
    }

    async fn insert_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<CommunityInvitation> {
        let mut tables = self.tables.write().await;
        if tables.community_invitations.contains_key(&key) {
            return Err(ApplicationError::AlreadyExists {
                entity: "community invitation",
            });
        }

        let invitation = CommunityInvitation {
            key,
            created_at: Utc::now(),
        };
        tables.community_invitations.insert(key, invitation.clone());
        Ok(invitation)
    }

    async fn remove_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .community_invitations
            .remove(&key)
            .is_some())
    }

    async fn accept_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.community_invitations.remove(&key).is_none() {
            return Ok(false);
        }

        let membership = key.membership();
        tables
            .community_members
            .entry(membership)
            .or_insert(CommunityMember {
                key: membership,
                role: MemberRole::Member,
                joined_at: Utc::now(),
            });
        Ok(true)
    }

    async fn list_community_invitations(
        &self,
        community: CommunityId,
    ) -> Result<Vec<CommunityInvitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<_> = tables
            .community_invitations
            .values()
            .filter(|i| i.key.community == community)
            .cloned()
            .collect();
        invitations.sort_by_key(|i| (i.created_at, i.key.receiver));
        Ok(invitations)
    }

    async fn remove_community_invitations_of_user(
        &self,
        user: UserId,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.community_invitations.len();
        tables
            .community_invitations
            .retain(|key, _| key.sender != user && key.receiver != user);
        Ok(count(before, tables.community_invitations.len()))
    }

    async fn remove_community_invitations_of_community(
        &self,
        community: CommunityId,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.community_invitations.len();
        tables
            .community_invitations
            .retain(|key, _| key.community != community);
        Ok(count(before, tables.community_invitations.len()))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn find_post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        let post = Post {
            id: PostId(tables.next_id()),
            owner: post.owner,
            author: post.author,
            content: post.content.clone(),
            deleted: false,
            created_at: Utc::now(),
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.posts.get_mut(&post.id) {
            Some(row) => {
                *row = post.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("post", post.id)),
        }
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<PostComment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<PostComment> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post) {
            return Err(ApplicationError::not_found("post", comment.post));
        }

        let comment = PostComment {
            id: CommentId(tables.next_id()),
            post: comment.post,
            author: comment.author,
            content: comment.content.clone(),
            deleted: false,
            created_at: Utc::now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, comment: &PostComment) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.comments.get_mut(&comment.id) {
            Some(row) => {
                *row = comment.clone();
                Ok(())
            },
            None => Err(ApplicationError::not_found("comment", comment.id)),
        }
    }
}

#[async_trait]
impl PrivateMessageRepository for MemoryStore {
    async fn find_private_message(
        &self,
        id: PrivateMessageId,
    ) -> Result<Option<PrivateMessage>> {
        Ok(self.tables.read().await.private_messages.get(&id).cloned())
    }

    async fn insert_private_message(
        &self,
        message: &NewPrivateMessage,
    ) -> Result<PrivateMessage> {
        let mut tables = self.tables.write().await;
        let message = PrivateMessage {
            id: PrivateMessageId(tables.next_id()),
            sender: message.sender,
            receiver: message.receiver,
            content: message.content.clone(),
            deleted: false,
            created_at: Utc::now(),
        };
        tables.private_messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn update_private_message(
        &self,
        message: &PrivateMessage,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.private_messages.get_mut(&message.id) {
            Some(row) => {
                *row = message.clone();
                Ok(())
            },
            None => {
                Err(ApplicationError::not_found("private message", message.id))
            },
        }
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.notifications.values().any(|n| {
            n.event_id == notification.event_id
                && n.receiver == notification.receiver
        });
        if duplicate {
            return Ok(None);
        }

        let notification = Notification {
            id: NotificationId(tables.next_id()),
            receiver: notification.receiver,
            kind: notification.kind,
            actor: notification.actor,
            read: false,
            event_id: notification.event_id.clone(),
            created_at: Utc::now(),
        };
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(Some(notification))
    }

    async fn list_notifications(
        &self,
        receiver: UserId,
    ) -> Result<Vec<Notification>> {
        // ids grow with time, newest first.
        Ok(self
            .tables
            .read()
            .await
            .notifications
            .values()
            .rev()
            .filter(|n| n.receiver == receiver)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.notifications.get_mut(&id) {
            Some(notification) => {
                notification.read = true;
                true
            },
            None => false,
        })
    }

    async fn remove_notification(&self, id: NotificationId) -> Result<bool> {
        Ok(self.tables.write().await.notifications.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_is_claimed_once() {
        let store = MemoryStore::new();
        let key = FriendshipRequestKey::new(UserId(1), UserId(2));
        store.insert_friendship_request(key).await.unwrap();

        assert!(store.accept_friendship_request(key).await.unwrap());
        assert!(!store.accept_friendship_request(key).await.unwrap());
        assert!(
            store
                .friendship_exists(key.friendship().unwrap())
                .await
                .unwrap()
        );
        assert!(!store.friendship_request_exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicates_are_rejected() {
        let store = MemoryStore::new();
        let key = ChatInvitationKey::new(UserId(1), UserId(2), ChatId(3));
        store.insert_chat_invitation(key).await.unwrap();

        let err = store.insert_chat_invitation(key).await.unwrap_err();
        assert!(matches!(err, ApplicationError::AlreadyExists { .. }));

        let err = store
            .insert_friendship_request(FriendshipRequestKey::new(
                UserId(1),
                UserId(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Domain(_)));
    }

    #[tokio::test]
    async fn test_notifications_are_deduplicated() {
        let store = MemoryStore::new();
        let new = NewNotification {
            receiver: UserId(1),
            kind: NotificationKind::ChatInvitationAccepted,
            actor: UserId(2),
            event_id: "abc".into(),
        };

        assert!(store.insert_notification(&new).await.unwrap().is_some());
        assert!(store.insert_notification(&new).await.unwrap().is_none());
        assert_eq!(store.list_notifications(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_removal_counts() {
        let store = MemoryStore::new();
        let user = UserId(1);
        for other in 2..5 {
            store
                .insert_community_invitation(CommunityInvitationKey::new(
                    user,
                    UserId(other),
                    CommunityId(9),
                ))
                .await
                .unwrap();
        }

        assert_eq!(
            store.remove_community_invitations_of_user(user).await.unwrap(),
            3
        );
        assert_eq!(
            store.remove_community_invitations_of_user(user).await.unwrap(),
            0
        );
    }
}
