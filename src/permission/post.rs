//! Post and comment permission gates.
//!
//! A post is seen through the rules of its [`PostOwner`]: user walls follow
//! the user's `posts_public` flag and friendships, community posts follow
//! the community visibility.

use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct PostPermissionService {
    predicates: Predicates,
}

impl PostPermissionService {
    /// Create a new [`PostPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    async fn wall_visible(&self, viewer: UserId, target: &User) -> Result<bool> {
        Ok(target.is_active()
            && (viewer == target.id
                || target.posts_public
                || self.predicates.are_friends(viewer, target.id).await?
                || self.predicates.is_system_moderator(viewer).await?))
    }

    async fn community_visible(
        &self,
        viewer: UserId,
        community: &Community,
    ) -> Result<bool> {
        Ok(community.is_active()
            && (community.is_public()
                || self
                    .predicates
                    .is_community_member(community.id, viewer)
                    .await?
                || self.predicates.is_system_moderator(viewer).await?))
    }

    async fn owner_visible(&self, viewer: UserId, owner: PostOwner) -> Result<bool> {
        match owner {
            PostOwner::User(user) => {
                let user = self.predicates.user(user).await?;
                self.wall_visible(viewer, &user).await
            },
            PostOwner::Community(community) => {
                let community = self.predicates.community(community).await?;
                self.community_visible(viewer, &community).await
            },
        }
    }

    async fn post_visible(&self, viewer: UserId, post: &Post) -> Result<bool> {
        Ok(!post.deleted && self.owner_visible(viewer, post.owner).await?)
    }

    /// Owner-side moderation: community moderators for community posts, the
    /// wall owner for user posts, system moderators for both.
    async fn moderates(&self, user: UserId, owner: PostOwner) -> Result<bool> {
        let owner_side = match owner {
            PostOwner::User(wall) => wall == user,
            PostOwner::Community(community) => {
                self.predicates
                    .is_community_moderator(community, user)
                    .await?
            },
        };
        Ok(owner_side || self.predicates.is_system_moderator(user).await?)
    }

    pub async fn can_view_user_posts(
        &self,
        viewer: UserId,
        target: UserId,
    ) -> Result<bool> {
        let target = self.predicates.user(target).await?;
        let allowed = self.wall_visible(viewer, &target).await?;
        Ok(decision("post.view_user_posts", allowed))
    }

    pub async fn can_view_community_posts(
        &self,
        viewer: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = self.community_visible(viewer, &community).await?;
        Ok(decision("post.view_community_posts", allowed))
    }

    pub async fn can_view_post(&self, viewer: UserId, post: PostId) -> Result<bool> {
        let post = self.predicates.post(post).await?;
        let allowed = self.post_visible(viewer, &post).await?;
        Ok(decision("post.view", allowed))
    }

    /// Community posts are written by moderators and the owner only.
    pub async fn can_create_community_post(
        &self,
        author: UserId,
        community: CommunityId,
    ) -> Result<bool> {
        let community = self.predicates.community(community).await?;
        let allowed = community.is_active()
            && self
                .predicates
                .is_community_moderator(community.id, author)
                .await?;
        Ok(decision("post.create_community_post", allowed))
    }

    /// Write on the wall of `target`.
    pub async fn can_create_user_post(
        &self,
        author: UserId,
        target: UserId,
    ) -> Result<bool> {
        let target = self.predicates.user(target).await?;
        let allowed = target.is_active()
            && (author == target.id
                || target.posts_public
                || self.predicates.are_friends(author, target.id).await?);
        Ok(decision("post.create_user_post", allowed))
    }

    pub async fn can_modify_post(&self, user: UserId, post: PostId) -> Result<bool> {
        let post = self.predicates.post(post).await?;
        let allowed = post.author == user && self.post_visible(user, &post).await?;
        Ok(decision("post.modify", allowed))
    }

    pub async fn can_delete_post(&self, user: UserId, post: PostId) -> Result<bool> {
        let post = self.predicates.post(post).await?;
        let allowed = !post.deleted
            && ((post.author == user && self.post_visible(user, &post).await?)
                || self.moderates(user, post.owner).await?);
        Ok(decision("post.delete", allowed))
    }

    pub async fn can_view_comment(
        &self,
        viewer: UserId,
        comment: CommentId,
    ) -> Result<bool> {
        let comment = self.predicates.comment(comment).await?;
        let post = self.predicates.post(comment.post).await?;
        let allowed = !comment.deleted && self.post_visible(viewer, &post).await?;
        Ok(decision("comment.view", allowed))
    }

    /// Anyone who sees a post may comment on it.
    pub async fn can_create_comment(
        &self,
        author: UserId,
        post: PostId,
    ) -> Result<bool> {
        let post = self.predicates.post(post).await?;
        let allowed = self.post_visible(author, &post).await?;
        Ok(decision("comment.create", allowed))
    }

    pub async fn can_modify_comment(
        &self,
        user: UserId,
        comment: CommentId,
    ) -> Result<bool> {
        let comment = self.predicates.comment(comment).await?;
        let post = self.predicates.post(comment.post).await?;
        let allowed = comment.author == user
            && !comment.deleted
            && self.post_visible(user, &post).await?;
        Ok(decision("comment.modify", allowed))
    }

    pub async fn can_delete_comment(
        &self,
        user: UserId,
        comment: CommentId,
    ) -> Result<bool> {
        let comment = self.predicates.comment(comment).await?;
        let post = self.predicates.post(comment.post).await?;
        let allowed = !comment.deleted
            && ((comment.author == user && self.post_visible(user, &post).await?)
                || self.moderates(user, post.owner).await?);
        Ok(decision("comment.delete", allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplicationError;
    use crate::permission::fixtures::*;
    use crate::ports::*;

    #[tokio::test]
    async fn test_user_wall_visibility() {
        let store = store().await;
        let service = PostPermissionService::new(Predicates::new(store.clone()));

        assert!(service.can_view_user_posts(BOB, ALICE).await.unwrap());

        update_user(&store, ALICE, |u| u.posts_public = false).await;
        assert!(!service.can_view_user_posts(BOB, ALICE).await.unwrap());
        assert!(service.can_view_user_posts(ALICE, ALICE).await.unwrap());
        assert!(service.can_view_user_posts(MODERATOR, ALICE).await.unwrap());
        assert!(!service.can_create_user_post(BOB, ALICE).await.unwrap());

        befriend(&store, ALICE, BOB).await;
        assert!(service.can_view_user_posts(BOB, ALICE).await.unwrap());
        assert!(service.can_create_user_post(BOB, ALICE).await.unwrap());

        update_user(&store, ALICE, |u| u.banned = true).await;
        assert!(!service.can_view_user_posts(ALICE, ALICE).await.unwrap());
    }

    #[tokio::test]
    async fn test_community_post_routing() {
        let store = store().await;
        let service = PostPermissionService::new(Predicates::new(store.clone()));
        let community = community(&store, true).await;

        // ALICE's wall is public, the private community is not.
        let post = store
            .insert_post(&NewPost {
                owner: PostOwner::Community(community.id),
                author: OWNER,
                content: "welcome".into(),
            })
            .await
            .unwrap();

        assert!(!service.can_view_post(ALICE, post.id).await.unwrap());
        assert!(service.can_view_post(OWNER, post.id).await.unwrap());
        assert!(service.can_view_post(ADMIN, post.id).await.unwrap());

        store
            .insert_community_member(
                CommunityMemberKey::new(community.id, ALICE),
                MemberRole::Member,
            )
            .await
            .unwrap();
        assert!(service.can_view_post(ALICE, post.id).await.unwrap());
        assert!(
            service
                .can_view_community_posts(ALICE, community.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_community_post() {
        let store = store().await;
        let service = PostPermissionService::new(Predicates::new(store.clone()));
        let community = community(&store, false).await;
        store
            .insert_community_member(
                CommunityMemberKey::new(community.id, ALICE),
                MemberRole::Member,
            )
            .await
            .unwrap();

        assert!(
            service
                .can_create_community_post(OWNER, community.id)
                .await
                .unwrap()
        );
        assert!(
            !service
                .can_create_community_post(ALICE, community.id)
                .await
                .unwrap()
        );

        store
            .update_community_member_role(
                CommunityMemberKey::new(community.id, ALICE),
                MemberRole::Moderator,
            )
            .await
            .unwrap();
        assert!(
            service
                .can_create_community_post(ALICE, community.id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_modify_and_delete_post() {
        let store = store().await;
        let service = PostPermissionService::new(Predicates::new(store.clone()));

        let post = store
            .insert_post(&NewPost {
                owner: PostOwner::User(ALICE),
                author: BOB,
                content: "hi alice".into(),
            })
            .await
            .unwrap();

        assert!(service.can_modify_post(BOB, post.id).await.unwrap());
        assert!(!service.can_modify_post(ALICE, post.id).await.unwrap());
        assert!(service.can_delete_post(ALICE, post.id).await.unwrap());
        assert!(service.can_delete_post(MODERATOR, post.id).await.unwrap());
        assert!(!service.can_delete_post(OWNER, post.id).await.unwrap());

        let mut post = post;
        post.deleted = true;
        store.update_post(&post).await.unwrap();
        assert!(!service.can_view_post(BOB, post.id).await.unwrap());
        assert!(!service.can_modify_post(BOB, post.id).await.unwrap());
        assert!(!service.can_delete_post(ALICE, post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_comments() {
        let store = store().await;
        let service = PostPermissionService::new(Predicates::new(store.clone()));
        let community = community(&store, false).await;
        store
            .insert_community_member(
                CommunityMemberKey::new(community.id, ALICE),
                MemberRole::Moderator,
            )
            .await
            .unwrap();

        let post = store
            .insert_post(&NewPost {
                owner: PostOwner::Community(community.id),
                author: OWNER,
                content: "rules".into(),
            })
            .await
            .unwrap();
        assert!(service.can_create_comment(BOB, post.id).await.unwrap());

        let comment = store
            .insert_comment(&NewComment {
                post: post.id,
                author: BOB,
                content: "first".into(),
            })
            .await
            .unwrap();

        assert!(service.can_view_comment(OWNER, comment.id).await.unwrap());
        assert!(service.can_modify_comment(BOB, comment.id).await.unwrap());
        assert!(!service.can_modify_comment(ALICE, comment.id).await.unwrap());
        assert!(service.can_delete_comment(ALICE, comment.id).await.unwrap());
        assert!(service.can_delete_comment(ADMIN, comment.id).await.unwrap());

        let err = service
            .can_view_comment(BOB, CommentId(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { entity: "comment", .. }));
    }
}
