use std::sync::Arc;

use crate::domain::*;
use crate::error::{ApplicationError, OrNotFound, Result};
use crate::events::DomainEvent;
use crate::lifecycle::{emit, ensure};
use crate::permission::ChatPermissionService;
use crate::ports::{EntityStore, EventPublisher};

fn invitation_id(key: ChatInvitationKey) -> String {
    format!("{}->{}@{}", key.sender, key.receiver, key.chat)
}

/// Chats, their members and invitations.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn EntityStore>,
    permissions: ChatPermissionService,
    publisher: Arc<dyn EventPublisher>,
}

impl ChatService {
    /// Create a new [`ChatService`].
    pub fn new(
        store: Arc<dyn EntityStore>,
        permissions: ChatPermissionService,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            permissions,
            publisher,
        }
    }

    async fn chat(&self, id: ChatId) -> Result<Chat> {
        self.store.find_chat(id).await?.or_not_found("chat", id)
    }

    /// Create a chat owned, and joined, by `owner`.
    #[tracing::instrument(skip(self, name))]
    pub async fn create_chat(
        &self,
        owner: UserId,
        name: &str,
        is_private: bool,
    ) -> Result<Chat> {
        let user = self.store.find_user(owner).await?.or_not_found("user", owner)?;
        ensure(user.is_active())?;

        let chat = self
            .store
            .create_chat(&NewChat {
                owner,
                name: name.to_owned(),
                is_private,
            })
            .await?;
        tracing::info!(chat = %chat.id, "chat created");
        Ok(chat)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_chat(&self, user: UserId, chat: ChatId) -> Result<()> {
        ensure(self.permissions.can_delete_chat(user, chat).await?)?;

        let mut chat = self.chat(chat).await?;
        chat.deleted = true;
        self.store.update_chat(&chat).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::ChatDeactivated { chat: chat.id },
        )
        .await;
        Ok(())
    }

    /// Turning a chat public drops its pending invitations.
    #[tracing::instrument(skip(self))]
    pub async fn set_privacy(
        &self,
        user: UserId,
        chat: ChatId,
        is_private: bool,
    ) -> Result<()> {
        ensure(self.permissions.can_edit_chat(user, chat).await?)?;

        let mut chat = self.chat(chat).await?;
        if chat.is_private == is_private {
            return Ok(());
        }
        chat.is_private = is_private;
        self.store.update_chat(&chat).await?;

        emit(
            self.publisher.as_ref(),
            DomainEvent::ChatVisibilityChanged {
                chat: chat.id,
                is_private,
            },
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn join(&self, user: UserId, chat: ChatId) -> Result<()> {
        ensure(self.permissions.can_join_chat(user, chat).await?)?;
        self.store
            .insert_chat_member(ChatMemberKey::new(chat, user))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn leave(&self, user: UserId, chat: ChatId) -> Result<()> {
        ensure(self.permissions.can_leave_chat(user, chat).await?)?;
        self.store
            .remove_chat_member(ChatMemberKey::new(chat, user))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_member(
        &self,
        user: UserId,
        chat: ChatId,
        member: UserId,
    ) -> Result<()> {
        ensure(
            self.permissions
                .can_remove_chat_member(user, chat, member)
                .await?,
        )?;

        if !self
            .store
            .remove_chat_member(ChatMemberKey::new(chat, member))
            .await?
        {
            return Err(ApplicationError::not_found("chat member", member));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn invite(
        &self,
        sender: UserId,
        receiver: UserId,
        chat: ChatId,
    ) -> Result<ChatInvitation> {
        ensure(
            self.permissions
                .can_invite_to_chat(sender, receiver, chat)
                .await?,
        )?;

        let invitation = self
            .store
            .insert_chat_invitation(ChatInvitationKey::new(sender, receiver, chat))
            .await?;
        emit(
            self.publisher.as_ref(),
            DomainEvent::ChatInvitationCreated(invitation.key),
        )
        .await;

        Ok(invitation)
    }

    /// Remove the invitation and add the receiver as a member.
    #[tracing::instrument(skip(self))]
    pub async fn accept_invitation(&self, key: ChatInvitationKey) -> Result<()> {
        if !self.store.accept_chat_invitation(key).await? {
            return Err(ApplicationError::not_found(
                "chat invitation",
                invitation_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::ChatInvitationAccepted(key),
        )
        .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn decline_invitation(&self, key: ChatInvitationKey) -> Result<()> {
        if !self.store.remove_chat_invitation(key).await? {
            return Err(ApplicationError::not_found(
                "chat invitation",
                invitation_id(key),
            ));
        }

        emit(
            self.publisher.as_ref(),
            DomainEvent::ChatInvitationDeclined(key),
        )
        .await;
        Ok(())
    }

    pub async fn pending_invitations(
        &self,
        user: UserId,
        chat: ChatId,
    ) -> Result<Vec<ChatInvitation>> {
        ensure(
            self.permissions
                .can_view_chat_invitations(user, chat)
                .await?,
        )?;
        self.store.list_chat_invitations(chat).await
    }
}
