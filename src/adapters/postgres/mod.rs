//! PostgreSQL implementation of the entity store.
//!
//! Every `accept_*` transition runs inside one transaction: the pending row
//! is deleted first and the relation is only inserted when the delete hit a
//! row, so a concurrent second acceptance finds nothing to claim.

mod models;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{PgPool, Postgres as Pg, Transaction};

use self::models::*;
use crate::config::Postgres;
use crate::domain::*;
use crate::error::{ApplicationError, Result, ToInternal};
use crate::ports::*;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "tessera";
pub const DEFAULT_POOL_SIZE: u32 = 10;

const USER_COLUMNS: &str = "id, username, system_role, banned, deleted, \
                            posts_public, accepting_private_msgs, created_at";
const CHAT_COLUMNS: &str = "id, owner_id, name, is_private, deleted, created_at";
const COMMUNITY_COLUMNS: &str =
    "id, owner_id, name, is_private, banned, deleted, created_at";
const POST_COLUMNS: &str = "id, owner_user_id, owner_community_id, author_id, \
                            content, deleted, created_at";
const NOTIFICATION_COLUMNS: &str =
    "id, receiver_id, kind, actor_id, read, event_id, created_at";

/// Map a unique violation to [`ApplicationError::AlreadyExists`].
fn conflict(entity: &'static str) -> impl FnOnce(sqlx::Error) -> ApplicationError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApplicationError::AlreadyExists { entity }
        },
        _ => ApplicationError::internal(err),
    }
}

fn affected(result: PgQueryResult) -> bool {
    result.rows_affected() > 0
}

/// PostgreSQL entity store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new [`PgStore`] over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Init database connections.
    pub async fn connect(config: &Postgres) -> std::result::Result<Self, sqlx::Error> {
        let username = config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password = config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let database = config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        let addr = format!(
            "postgres://{username}:{password}@{}/{database}",
            config.address
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        tracing::info!(hostname = %config.address, db = %database, "postgres connected");

        Ok(Self { pool })
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn begin(&self) -> Result<Transaction<'static, Pg>> {
        self.pool.begin().await.catch()
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(UserRecord::try_into_domain)
        .transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, system_role, banned, deleted,
                posts_public, accepting_private_msgs, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.get())
        .bind(&user.username)
        .bind(user.system_role.as_str())
        .bind(user.banned)
        .bind(user.deleted)
        .bind(user.posts_public)
        .bind(user.accepting_private_msgs)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict("user"))?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                username = $2,
                system_role = $3,
                banned = $4,
                deleted = $5,
                posts_public = $6,
                accepting_private_msgs = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.get())
        .bind(&user.username)
        .bind(user.system_role.as_str())
        .bind(user.banned)
        .bind(user.deleted)
        .bind(user.posts_public)
        .bind(user.accepting_private_msgs)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("user", user.id));
        }
        Ok(())
    }
}

#[async_trait]
impl FriendshipRepository for PgStore {
    async fn friendship_exists(&self, key: FriendshipKey) -> Result<bool> {
        let (low, high) = key.users();
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_low = $1 AND user_high = $2)",
        )
        .bind(low.get())
        .bind(high.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn remove_friendship(&self, key: FriendshipKey) -> Result<bool> {
        let (low, high) = key.users();
        let result = sqlx::query(
            "DELETE FROM friendships WHERE user_low = $1 AND user_high = $2",
        )
        .bind(low.get())
        .bind(high.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn friendship_request_exists(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM friendship_requests
                WHERE sender_id = $1 AND receiver_id = $2
            )
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn insert_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<FriendshipRequest> {
        key.friendship()?;

        let record = sqlx::query_as::<_, FriendshipRequestRecord>(
            r#"
            INSERT INTO friendship_requests (sender_id, receiver_id)
            VALUES ($1, $2)
            RETURNING sender_id, receiver_id, created_at
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .fetch_one(&self.pool)
        .await
        .map_err(conflict("friendship request"))?;

        Ok(record.into())
    }

    async fn remove_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM friendship_requests WHERE sender_id = $1 AND receiver_id = $2",
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn accept_friendship_request(
        &self,
        key: FriendshipRequestKey,
    ) -> Result<bool> {
        let (low, high) = key.friendship()?.users();
        let mut tx = self.begin().await?;

        // also clears the reverse request, if any.
        let senders = sqlx::query_scalar::<_, i64>(
            r#"
            DELETE FROM friendship_requests
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            RETURNING sender_id
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .fetch_all(&mut *tx)
        .await
        .catch()?;

        if !senders.contains(&key.sender.get()) {
            tx.rollback().await.catch()?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO friendships (user_low, user_high)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(low.get())
        .bind(high.get())
        .execute(&mut *tx)
        .await
        .catch()?;

        tx.commit().await.catch()?;
        Ok(true)
    }

    async fn list_friendship_requests(
        &self,
        receiver: UserId,
    ) -> Result<Vec<FriendshipRequest>> {
        let records = sqlx::query_as::<_, FriendshipRequestRecord>(
            r#"
            SELECT sender_id, receiver_id, created_at
            FROM friendship_requests
            WHERE receiver_id = $1
            ORDER BY created_at, sender_id
            "#,
        )
        .bind(receiver.get())
        .fetch_all(&self.pool)
        .await
        .catch()?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn remove_friendship_requests_of(&self, user: UserId) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM friendship_requests WHERE sender_id = $1 OR receiver_id = $1",
        )
        .bind(user.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ChatRepository for PgStore {
    async fn find_chat(&self, id: ChatId) -> Result<Option<Chat>> {
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;
        Ok(record.map(Into::into))
    }

    async fn create_chat(&self, chat: &NewChat) -> Result<Chat> {
        let mut tx = self.begin().await?;

        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            r#"
            INSERT INTO chats (owner_id, name, is_private)
            VALUES ($1, $2, $3)
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(chat.owner.get())
        .bind(&chat.name)
        .bind(chat.is_private)
        .fetch_one(&mut *tx)
        .await
        .catch()?;

        sqlx::query("INSERT INTO chat_members (chat_id, member_id) VALUES ($1, $2)")
            .bind(record.id)
            .bind(record.owner_id)
            .execute(&mut *tx)
            .await
            .catch()?;

        tx.commit().await.catch()?;
        Ok(record.into())
    }

    async fn update_chat(&self, chat: &Chat) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chats SET name = $2, is_private = $3, deleted = $4 WHERE id = $1",
        )
        .bind(chat.id.get())
        .bind(&chat.name)
        .bind(chat.is_private)
        .bind(chat.deleted)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("chat", chat.id));
        }
        Ok(())
    }

    async fn chat_member_exists(&self, key: ChatMemberKey) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM chat_members WHERE chat_id = $1 AND member_id = $2)",
        )
        .bind(key.chat.get())
        .bind(key.member.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn insert_chat_member(&self, key: ChatMemberKey) -> Result<()> {
        sqlx::query("INSERT INTO chat_members (chat_id, member_id) VALUES ($1, $2)")
            .bind(key.chat.get())
            .bind(key.member.get())
            .execute(&self.pool)
            .await
            .map_err(conflict("chat member"))?;
        Ok(())
    }

    async fn remove_chat_member(&self, key: ChatMemberKey) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM chat_members WHERE chat_id = $1 AND member_id = $2",
        )
        .bind(key.chat.get())
        .bind(key.member.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn chat_invitation_exists(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM chat_invitations
                WHERE sender_id = $1 AND receiver_id = $2 AND chat_id = $3
            )
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.chat.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn insert_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<ChatInvitation> {
        let record = sqlx::query_as::<_, ChatInvitationRecord>(
            r#"
            INSERT INTO chat_invitations (sender_id, receiver_id, chat_id)
            VALUES ($1, $2, $3)
            RETURNING sender_id, receiver_id, chat_id, created_at
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.chat.get())
        .fetch_one(&self.pool)
        .await
        .map_err(conflict("chat invitation"))?;

        Ok(record.into())
    }

    async fn remove_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM chat_invitations
            WHERE sender_id = $1 AND receiver_id = $2 AND chat_id = $3
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.chat.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn accept_chat_invitation(
        &self,
        key: ChatInvitationKey,
    ) -> Result<bool> {
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM chat_invitations
            WHERE sender_id = $1 AND receiver_id = $2 AND chat_id = $3
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.chat.get())
        .execute(&mut *tx)
        .await
        .catch()?;

        if !affected(result) {
            tx.rollback().await.catch()?;
            return Ok(false);
        }

        let membership = key.membership();
        sqlx::query(
            r#"
            INSERT INTO chat_members (chat_id, member_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(membership.chat.get())
        .bind(membership.member.get())
        .execute(&mut *tx)
        .await
        .catch()?;

        tx.commit().await.catch()?;
        Ok(true)
    }

    async fn list_chat_invitations(
        &self,
        chat: ChatId,
    ) -> Result<Vec<ChatInvitation>> {
        let records = sqlx::query_as::<_, ChatInvitationRecord>(
            r#"
            SELECT sender_id, receiver_id, chat_id, created_at
            FROM chat_invitations
            WHERE chat_id = $1
            ORDER BY created_at, receiver_id
            "#,
        )
        .bind(chat.get())
        .fetch_all(&self.pool)
        .await
        .catch()?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn remove_chat_invitations_of_user(
        &self,
        user: UserId,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM chat_invitations WHERE sender_id = $1 OR receiver_id = $1",
        )
        .bind(user.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(result.rows_affected())
    }

    async fn remove_chat_invitations_of_chat(
        &self,
        chat: ChatId,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_invitations WHERE chat_id = $1")
            .bind(chat.get())
            .execute(&self.pool)
            .await
            .catch()?;
        Ok(result.rows_affected())
    }

    async fn find_chat_message(
        &self,
        id: ChatMessageId,
    ) -> Result<Option<ChatMessage>> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            SELECT id, chat_id, author_id, content, deleted, created_at
            FROM chat_messages
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;
        Ok(record.map(Into::into))
    }

    async fn insert_chat_message(
        &self,
        message: &NewChatMessage,
    ) -> Result<ChatMessage> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(
            r#"
            INSERT INTO chat_messages (chat_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, chat_id, author_id, content, deleted, created_at
            "#,
        )
        .bind(message.chat.get())
        .bind(message.author.get())
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await
        .catch()?;
        Ok(record.into())
    }

    async fn update_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let result = sqlx::query(
            "UPDATE chat_messages SET content = $2, deleted = $3 WHERE id = $1",
        )
        .bind(message.id.get())
        .bind(&message.content)
        .bind(message.deleted)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("chat message", message.id));
        }
        Ok(())
    }
}

#[async_trait]
impl CommunityRepository for PgStore {
    async fn find_community(&self, id: CommunityId) -> Result<Option<Community>> {
        let record = sqlx::query_as::<_, CommunityRecord>(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;
        Ok(record.map(Into::into))
    }

    async fn create_community(
        &self,
        community: &NewCommunity,
    ) -> Result<Community> {
        let mut tx = self.begin().await?;

        let record = sqlx::query_as::<_, CommunityRecord>(&format!(
            r#"
            INSERT INTO communities (owner_id, name, is_private)
            VALUES ($1, $2, $3)
            RETURNING {COMMUNITY_COLUMNS}
            "#
        ))
        .bind(community.owner.get())
        .bind(&community.name)
        .bind(community.is_private)
        .fetch_one(&mut *tx)
        .await
        .catch()?;

        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, member_id, member_role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.id)
        .bind(record.owner_id)
        .bind(MemberRole::Owner.as_str())
        .execute(&mut *tx)
        .await
        .catch()?;

        tx.commit().await.catch()?;
        Ok(record.into())
    }

    async fn update_community(&self, community: &Community) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE communities
            SET name = $2, is_private = $3, banned = $4, deleted = $5
            WHERE id = $1
            "#,
        )
        .bind(community.id.get())
        .bind(&community.name)
        .bind(community.is_private)
        .bind(community.banned)
        .bind(community.deleted)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("community", community.id));
        }
        Ok(())
    }

    async fn find_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<Option<CommunityMember>> {
        sqlx::query_as::<_, CommunityMemberRecord>(
            r#"
            SELECT community_id, member_id, member_role, joined_at
            FROM community_members
            WHERE community_id = $1 AND member_id = $2
            "#,
        )
        .bind(key.community.get())
        .bind(key.member.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(CommunityMemberRecord::try_into_domain)
        .transpose()
    }

    async fn insert_community_member(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, member_id, member_role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(key.community.get())
        .bind(key.member.get())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(conflict("community member"))?;
        Ok(())
    }

    async fn update_community_member_role(
        &self,
        key: CommunityMemberKey,
        role: MemberRole,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE community_members SET member_role = $3
            WHERE community_id = $1 AND member_id = $2
            "#,
        )
        .bind(key.community.get())
        .bind(key.member.get())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(conflict("community owner"))?;
        Ok(affected(result))
    }

    async fn remove_community_member(
        &self,
        key: CommunityMemberKey,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM community_members WHERE community_id = $1 AND member_id = $2",
        )
        .bind(key.community.get())
        .bind(key.member.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn community_invitation_exists(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_invitations
                WHERE sender_id = $1 AND receiver_id = $2 AND community_id = $3
            )
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.community.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn community_invitation_pending(
        &self,
        receiver: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_invitations
                WHERE receiver_id = $1 AND community_id = $2
            )
            "#,
        )
        .bind(receiver.get())
        .bind(community.get())
        .fetch_one(&self.pool)
        .await
        .catch()
    }

    async fn insert_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<CommunityInvitation> {
        let record = sqlx::query_as::<_, CommunityInvitationRecord>(
            r#"
            INSERT INTO community_invitations (sender_id, receiver_id, community_id)
            VALUES ($1, $2, $3)
            RETURNING sender_id, receiver_id, community_id, created_at
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.community.get())
        .fetch_one(&self.pool)
        .await
        .map_err(conflict("community invitation"))?;

        Ok(record.into())
    }

    async fn remove_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM community_invitations
            WHERE sender_id = $1 AND receiver_id = $2 AND community_id = $3
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.community.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(affected(result))
    }

    async fn accept_community_invitation(
        &self,
        key: CommunityInvitationKey,
    ) -> Result<bool> {
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM community_invitations
            WHERE sender_id = $1 AND receiver_id = $2 AND community_id = $3
            "#,
        )
        .bind(key.sender.get())
        .bind(key.receiver.get())
        .bind(key.community.get())
        .execute(&mut *tx)
        .await
        .catch()?;

        if !affected(result) {
            tx.rollback().await.catch()?;
            return Ok(false);
        }

        let membership = key.membership();
        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, member_id, member_role)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(membership.community.get())
        .bind(membership.member.get())
        .bind(MemberRole::Member.as_str())
        .execute(&mut *tx)
        .await
        .catch()?;

        tx.commit().await.catch()?;
        Ok(true)
    }

    async fn list_community_invitations(
        &self,
        community: CommunityId,
    ) -> Result<Vec<CommunityInvitation>> {
        let records = sqlx::query_as::<_, CommunityInvitationRecord>(
            r#"
            SELECT sender_id, receiver_id, community_id, created_at
            FROM community_invitations
            WHERE community_id = $1
            ORDER BY created_at, receiver_id
            "#,
        )
        .bind(community.get())
        .fetch_all(&self.pool)
        .await
        .catch()?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn remove_community_invitations_of_user(
        &self,
        user: UserId,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM community_invitations WHERE sender_id = $1 OR receiver_id = $1",
        )
        .bind(user.get())
        .execute(&self.pool)
        .await
        .catch()?;
        Ok(result.rows_affected())
    }

    async fn remove_community_invitations_of_community(
        &self,
        community: CommunityId,
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM community_invitations WHERE community_id = $1")
                .bind(community.get())
                .execute(&self.pool)
                .await
                .catch()?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn find_post(&self, id: PostId) -> Result<Option<Post>> {
        sqlx::query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(PostRecord::try_into_domain)
        .transpose()
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        let (user, community) = post.owner.into_columns();

        sqlx::query_as::<_, PostRecord>(&format!(
            r#"
            INSERT INTO posts (owner_user_id, owner_community_id, author_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(user.map(UserId::get))
        .bind(community.map(CommunityId::get))
        .bind(post.author.get())
        .bind(&post.content)
        .fetch_one(&self.pool)
        .await
        .catch()?
        .try_into_domain()
    }

    async fn update_post(&self, post: &Post) -> Result<()> {
        let result =
            sqlx::query("UPDATE posts SET content = $2, deleted = $3 WHERE id = $1")
                .bind(post.id.get())
                .bind(&post.content)
                .bind(post.deleted)
                .execute(&self.pool)
                .await
                .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("post", post.id));
        }
        Ok(())
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<PostComment>> {
        let record = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT id, post_id, author_id, content, deleted, created_at
            FROM post_comments
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;
        Ok(record.map(Into::into))
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<PostComment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            r#"
            INSERT INTO post_comments (post_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author_id, content, deleted, created_at
            "#,
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(&comment.content)
        .fetch_one(&self.pool)
        .await
        .catch()?;
        Ok(record.into())
    }

    async fn update_comment(&self, comment: &PostComment) -> Result<()> {
        let result = sqlx::query(
            "UPDATE post_comments SET content = $2, deleted = $3 WHERE id = $1",
        )
        .bind(comment.id.get())
        .bind(&comment.content)
        .bind(comment.deleted)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found("comment", comment.id));
        }
        Ok(())
    }
}

#[async_trait]
impl PrivateMessageRepository for PgStore {
    async fn find_private_message(
        &self,
        id: PrivateMessageId,
    ) -> Result<Option<PrivateMessage>> {
        let record = sqlx::query_as::<_, PrivateMessageRecord>(
            r#"
            SELECT id, sender_id, receiver_id, content, deleted, created_at
            FROM private_messages
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?;
        Ok(record.map(Into::into))
    }

    async fn insert_private_message(
        &self,
        message: &NewPrivateMessage,
    ) -> Result<PrivateMessage> {
        let record = sqlx::query_as::<_, PrivateMessageRecord>(
            r#"
            INSERT INTO private_messages (sender_id, receiver_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, receiver_id, content, deleted, created_at
            "#,
        )
        .bind(message.sender.get())
        .bind(message.receiver.get())
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await
        .catch()?;
        Ok(record.into())
    }

    async fn update_private_message(
        &self,
        message: &PrivateMessage,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE private_messages SET content = $2, deleted = $3 WHERE id = $1",
        )
        .bind(message.id.get())
        .bind(&message.content)
        .bind(message.deleted)
        .execute(&self.pool)
        .await
        .catch()?;

        if !affected(result) {
            return Err(ApplicationError::not_found(
                "private message",
                message.id,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>> {
        sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(NotificationRecord::try_into_domain)
        .transpose()
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>> {
        sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            INSERT INTO notifications (receiver_id, kind, actor_id, event_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, receiver_id) DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification.receiver.get())
        .bind(notification.kind.as_str())
        .bind(notification.actor.get())
        .bind(&notification.event_id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .map(NotificationRecord::try_into_domain)
        .transpose()
    }

    async fn list_notifications(
        &self,
        receiver: UserId,
    ) -> Result<Vec<Notification>> {
        sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE receiver_id = $1
            ORDER BY id DESC
            "#
        ))
        .bind(receiver.get())
        .fetch_all(&self.pool)
        .await
        .catch()?
        .into_iter()
        .map(NotificationRecord::try_into_domain)
        .collect()
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .catch()?;
        Ok(affected(result))
    }

    async fn remove_notification(&self, id: NotificationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .catch()?;
        Ok(affected(result))
    }
}
