use crate::domain::*;
use crate::error::Result;
use crate::permission::{Predicates, decision};

#[derive(Clone)]
pub struct UserPermissionService {
    predicates: Predicates,
}

impl UserPermissionService {
    /// Create a new [`UserPermissionService`].
    pub fn new(predicates: Predicates) -> Self {
        Self { predicates }
    }

    /// Role requirements for banning are enforced by route guards; this gate
    /// only rejects banning oneself.
    pub async fn can_ban_user(&self, user: UserId, target: UserId) -> Result<bool> {
        let target = self.predicates.user(target).await?;
        Ok(decision("user.ban", target.id != user))
    }

    pub async fn can_view_profile(
        &self,
        user: UserId,
        target: UserId,
    ) -> Result<bool> {
        let target = self.predicates.user(target).await?;
        let allowed = target.is_active()
            || self.predicates.is_system_moderator(user).await?;
        Ok(decision("user.view_profile", allowed))
    }

    pub async fn can_delete_user(&self, user: UserId, target: UserId) -> Result<bool> {
        let target = self.predicates.user(target).await?;
        let allowed = !target.deleted
            && (target.id == user
                || self.predicates.is_system_moderator(user).await?);
        Ok(decision("user.delete", allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::fixtures::*;

    #[tokio::test]
    async fn test_ban() {
        let store = store().await;
        let service = UserPermissionService::new(Predicates::new(store.clone()));

        assert!(service.can_ban_user(ALICE, BOB).await.unwrap());
        assert!(!service.can_ban_user(ALICE, ALICE).await.unwrap());
        assert!(service.can_ban_user(ALICE, UserId(404)).await.is_err());
    }

    #[tokio::test]
    async fn test_view_profile() {
        let store = store().await;
        let service = UserPermissionService::new(Predicates::new(store.clone()));

        update_user(&store, BOB, |u| u.banned = true).await;
        assert!(!service.can_view_profile(ALICE, BOB).await.unwrap());
        assert!(service.can_view_profile(MODERATOR, BOB).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = store().await;
        let service = UserPermissionService::new(Predicates::new(store.clone()));

        assert!(service.can_delete_user(ALICE, ALICE).await.unwrap());
        assert!(service.can_delete_user(ADMIN, ALICE).await.unwrap());
        assert!(!service.can_delete_user(BOB, ALICE).await.unwrap());

        update_user(&store, ALICE, |u| u.deleted = true).await;
        assert!(!service.can_delete_user(ALICE, ALICE).await.unwrap());
    }
}
