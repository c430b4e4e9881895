//! Chat permission gates.

use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct ChatPermissionService {
    predicates: Predicates,
}

impl ChatPermissionService {
    /// Create a new [`ChatPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    /// Visible when not deleted and public, or to members and system
    /// moderators.
    pub async fn can_view_chat(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.visible(user, &chat).await?;
        Ok(decision("chat.view", allowed))
    }

    async fn visible(&self, user: UserId, chat: &Chat) -> Result<bool> {
        Ok(chat.is_active()
            && (chat.is_public()
                || self.predicates.is_chat_member(chat.id, user).await?
                || self.predicates.is_system_moderator(user).await?))
    }

    async fn administrable(&self, user: UserId, chat: &Chat) -> Result<bool> {
        Ok(chat.is_active()
            && (chat.owner == user
                || self.predicates.is_system_moderator(user).await?))
    }

    pub async fn can_delete_chat(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.administrable(user, &chat).await?;
        Ok(decision("chat.delete", allowed))
    }

    pub async fn can_edit_chat(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.administrable(user, &chat).await?;
        Ok(decision("chat.edit", allowed))
    }

    pub async fn can_view_chat_invitations(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.administrable(user, &chat).await?;
        Ok(decision("chat.view_invitations", allowed))
    }

    pub async fn can_view_chat_messages(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.visible(user, &chat).await?;
        Ok(decision("chat.view_messages", allowed))
    }

    /// Fails with `NotFound` when the message does not exist.
    pub async fn can_view_chat_message(
        &self,
        user: UserId,
        message: ChatMessageId,
    ) -> Result<bool> {
        let message = self.predicates.chat_message(message).await?;
        let chat = self.predicates.chat(message.chat).await?;
        let allowed = !message.deleted && self.visible(user, &chat).await?;
        Ok(decision("chat.view_message", allowed))
    }

    pub async fn can_view_chat_members(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = self.visible(user, &chat).await?;
        Ok(decision("chat.view_members", allowed))
    }

    /// The owner cannot leave their own chat.
    pub async fn can_leave_chat(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = chat.owner != user
            && self.predicates.is_chat_member(chat.id, user).await?;
        Ok(decision("chat.leave", allowed))
    }

    /// The owner can never be removed, not even by a system moderator.
    pub async fn can_remove_chat_member(
        &self,
        user: UserId,
        chat: ChatId,
        member: UserId,
    ) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = member != chat.owner
            && (chat.owner == user
                || self.predicates.is_system_moderator(user).await?);
        Ok(decision("chat.remove_member", allowed))
    }

    pub async fn can_send_message(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = chat.is_active()
            && self.predicates.is_chat_member(chat.id, user).await?;
        Ok(decision("chat.send_message", allowed))
    }

    pub async fn can_join_chat(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let allowed = chat.is_active()
            && chat.is_public()
            && !self.predicates.is_chat_member(chat.id, user).await?;
        Ok(decision("chat.join", allowed))
    }

    /// Only the author may edit a message.
    pub async fn can_modify_message(
        &self,
        user: UserId,
        message: ChatMessageId,
    ) -> Result<bool> {
        let message = self.predicates.chat_message(message).await?;
        let allowed = !message.deleted && message.author == user;
        Ok(decision("chat.modify_message", allowed))
    }

    pub async fn can_delete_message(
        &self,
        user: UserId,
        message: ChatMessageId,
    ) -> Result<bool> {
        let message = self.predicates.chat_message(message).await?;
        let allowed = !message.deleted
            && (message.author == user
                || self.predicates.chat(message.chat).await?.owner == user
                || self.predicates.is_system_moderator(user).await?);
        Ok(decision("chat.delete_message", allowed))
    }

    /// Invitations only exist for private chats: public chats are open to
    /// anyone through [`Self::can_join_chat`].
    pub async fn can_invite_to_chat(
        &self,
        sender: UserId,
        receiver: UserId,
        chat: ChatId,
    ) -> Result<bool> {
        let chat = self.predicates.chat(chat).await?;
        let key = ChatInvitationKey::new(sender, receiver, chat.id);

        let allowed = chat.is_active()
            && chat.is_private
            && chat.owner == sender
            && sender != receiver
            && self.predicates.user(receiver).await?.is_active()
            && !self.predicates.is_chat_member(chat.id, receiver).await?
            && !self.predicates.chat_invitation_exists(key).await?;
        Ok(decision("chat.invite", allowed))
    }

    /// Only the invited user may accept or decline a pending invitation.
    pub async fn can_respond_to_chat_invitation(
        &self,
        user: UserId,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        let allowed = key.receiver == user
            && self.predicates.chat_invitation_exists(key).await?;
        Ok(decision("chat.respond_invitation", allowed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::error::ApplicationError;
    use crate::permission::fixtures::*;
    use crate::ports::*;

    async fn setup(
        is_private: bool,
    ) -> (Arc<MemoryStore>, ChatPermissionService, Chat) {
        let store = store().await;
        let chat = chat(&store, is_private).await;
        let service =
            ChatPermissionService::new(Predicates::new(store.clone()));
        (store, service, chat)
    }

    #[tokio::test]
    async fn test_deleted_chat_is_never_visible() {
        let (store, service, mut chat) = setup(false).await;
        assert!(service.can_view_chat(ALICE, chat.id).await.unwrap());

        chat.deleted = true;
        store.update_chat(&chat).await.unwrap();

        for user in [OWNER, ALICE, MODERATOR, ADMIN] {
            assert!(!service.can_view_chat(user, chat.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_private_chat_visibility() {
        let (store, service, chat) = setup(true).await;

        assert!(service.can_view_chat(OWNER, chat.id).await.unwrap());
        assert!(!service.can_view_chat(ALICE, chat.id).await.unwrap());
        assert!(service.can_view_chat(MODERATOR, chat.id).await.unwrap());

        store
            .insert_chat_member(ChatMemberKey::new(chat.id, ALICE))
            .await
            .unwrap();
        assert!(service.can_view_chat(ALICE, chat.id).await.unwrap());
        assert!(service.can_view_chat_members(ALICE, chat.id).await.unwrap());
        assert!(service.can_view_chat_messages(ALICE, chat.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_chat_fails() {
        let (_store, service, _chat) = setup(false).await;
        let err = service.can_view_chat(ALICE, ChatId(999)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { entity: "chat", .. }));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let (store, service, chat) = setup(true).await;
        store
            .insert_chat_member(ChatMemberKey::new(chat.id, ALICE))
            .await
            .unwrap();

        for caller in [OWNER, MODERATOR, ADMIN] {
            assert!(
                !service
                    .can_remove_chat_member(caller, chat.id, OWNER)
                    .await
                    .unwrap()
            );
            assert!(
                service
                    .can_remove_chat_member(caller, chat.id, ALICE)
                    .await
                    .unwrap()
            );
        }
        assert!(
            !service
                .can_remove_chat_member(BOB, chat.id, ALICE)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_leave_chat() {
        let (store, service, chat) = setup(false).await;
        assert!(!service.can_leave_chat(OWNER, chat.id).await.unwrap());
        assert!(!service.can_leave_chat(ALICE, chat.id).await.unwrap());

        store
            .insert_chat_member(ChatMemberKey::new(chat.id, ALICE))
            .await
            .unwrap();
        assert!(service.can_leave_chat(ALICE, chat.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_edit_and_delete() {
        let (store, service, mut chat) = setup(false).await;

        assert!(service.can_edit_chat(OWNER, chat.id).await.unwrap());
        assert!(service.can_delete_chat(MODERATOR, chat.id).await.unwrap());
        assert!(!service.can_edit_chat(ALICE, chat.id).await.unwrap());
        assert!(
            service
                .can_view_chat_invitations(OWNER, chat.id)
                .await
                .unwrap()
        );
        assert!(
            !service
                .can_view_chat_invitations(ALICE, chat.id)
                .await
                .unwrap()
        );

        chat.deleted = true;
        store.update_chat(&chat).await.unwrap();
        assert!(!service.can_edit_chat(OWNER, chat.id).await.unwrap());
        assert!(!service.can_delete_chat(ADMIN, chat.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_public_chat_rejects_invitations() {
        let (store, service, chat) = setup(false).await;

        assert!(
            !service
                .can_invite_to_chat(OWNER, ALICE, chat.id)
                .await
                .unwrap()
        );
        assert!(service.can_join_chat(ALICE, chat.id).await.unwrap());

        store
            .insert_chat_member(ChatMemberKey::new(chat.id, ALICE))
            .await
            .unwrap();
        assert!(!service.can_join_chat(ALICE, chat.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_private_chat_invitation_rules() {
        let (store, service, chat) = setup(true).await;

        assert!(!service.can_join_chat(ALICE, chat.id).await.unwrap());
        assert!(
            service
                .can_invite_to_chat(OWNER, ALICE, chat.id)
                .await
                .unwrap()
        );
        // only the owner invites.
        assert!(
            !service
                .can_invite_to_chat(BOB, ALICE, chat.id)
                .await
                .unwrap()
        );
        assert!(
            !service
                .can_invite_to_chat(OWNER, OWNER, chat.id)
                .await
                .unwrap()
        );

        let key = ChatInvitationKey::new(OWNER, ALICE, chat.id);
        store.insert_chat_invitation(key).await.unwrap();
        assert!(
            !service
                .can_invite_to_chat(OWNER, ALICE, chat.id)
                .await
                .unwrap()
        );
        assert!(
            service
                .can_respond_to_chat_invitation(ALICE, key)
                .await
                .unwrap()
        );
        assert!(
            !service
                .can_respond_to_chat_invitation(OWNER, key)
                .await
                .unwrap()
        );

        update_user(&store, BOB, |u| u.banned = true).await;
        assert!(
            !service
                .can_invite_to_chat(OWNER, BOB, chat.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_messages() {
        let (store, service, chat) = setup(false).await;
        store
            .insert_chat_member(ChatMemberKey::new(chat.id, ALICE))
            .await
            .unwrap();

        assert!(service.can_send_message(ALICE, chat.id).await.unwrap());
        assert!(!service.can_send_message(BOB, chat.id).await.unwrap());

        let message = store
            .insert_chat_message(&NewChatMessage {
                chat: chat.id,
                author: ALICE,
                content: "hello".into(),
            })
            .await
            .unwrap();

        assert!(service.can_modify_message(ALICE, message.id).await.unwrap());
        assert!(!service.can_modify_message(OWNER, message.id).await.unwrap());
        assert!(service.can_delete_message(OWNER, message.id).await.unwrap());
        assert!(service.can_delete_message(MODERATOR, message.id).await.unwrap());
        assert!(!service.can_delete_message(BOB, message.id).await.unwrap());
        assert!(service.can_view_chat_message(BOB, message.id).await.unwrap());

        let err = service
            .can_view_chat_message(BOB, ChatMessageId(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
