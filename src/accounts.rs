//! Own profile editing and user administration.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::TokenStore;
use crate::domain::aggregates::{ProfileUpdate, User};
use crate::domain::value_objects::{Role, UserId, ValueError};
use crate::listing::{Page, UserQuery};
use crate::repository::{Repository, RepositoryError, UserRepository};

#[derive(Debug, Error)]
pub enum AccountsError {
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Invalid(#[from] ValueError),
    #[error("administrators cannot change the role of or delete their own account")]
    OwnAccount,
    #[error("user still has orders")]
    HasOrders,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct AccountService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenStore>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn Repository>, tokens: Arc<TokenStore>) -> Self { Self { repo, tokens } }

    pub async fn get(&self, id: UserId) -> Result<User, AccountsError> {
        self.repo.get_user(id).await?.ok_or(AccountsError::NotFound)
    }

    pub async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<User, AccountsError> {
        let update = update.cleaned()?;
        let mut user = self.get(id).await?;
        user.apply(&update);
        self.save(&user).await?;
        tracing::info!(user_id = %id, "profile updated");
        Ok(user)
    }

    pub async fn list(&self, query: &UserQuery) -> Result<Page<User>, AccountsError> {
        Ok(self.repo.list_users(query).await?)
    }

    pub async fn set_role(&self, acting: UserId, id: UserId, role: Role) -> Result<User, AccountsError> {
        if acting == id {
            return Err(AccountsError::OwnAccount);
        }
        let mut user = self.get(id).await?;
        if user.role != role {
            user.role = role;
            self.save(&user).await?;
            tracing::info!(user_id = %id, %role, "user role changed");
        }
        Ok(user)
    }

    pub async fn delete(&self, acting: UserId, id: UserId) -> Result<(), AccountsError> {
        if acting == id {
            return Err(AccountsError::OwnAccount);
        }
        self.repo.delete_user(id).await.map_err(|e| match e {
            RepositoryError::NotFound => AccountsError::NotFound,
            RepositoryError::Conflict(_) => AccountsError::HasOrders,
            other => AccountsError::Repository(other),
        })?;
        self.tokens.revoke_user(id).await;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Persists `user` and refreshes the snapshot behind its live tokens.
    async fn save(&self, user: &User) -> Result<(), AccountsError> {
        self.repo.update_user(user).await.map_err(|e| match e {
            RepositoryError::NotFound => AccountsError::NotFound,
            other => AccountsError::Repository(other),
        })?;
        self.tokens.refresh_user(user).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Direction, PageRequest, Sort, UserFilter, UserSort};
    use crate::repository::fixtures::user;
    use crate::repository::InMemoryRepository;

    async fn setup() -> (Arc<InMemoryRepository>, Arc<TokenStore>, AccountService) {
        let repo = Arc::new(InMemoryRepository::new());
        let tokens = Arc::new(TokenStore::new());
        let service = AccountService::new(repo.clone(), tokens.clone());
        (repo, tokens, service)
    }

    #[tokio::test]
    async fn test_profile_update_refreshes_tokens() {
        let (repo, tokens, accounts) = setup().await;
        let ana = user("Ana", "ana@example.com");
        repo.insert_user(&ana).await.unwrap();
        let token = tokens.issue(&ana).await;

        let update = ProfileUpdate {
            first_name: " Anna ".into(),
            last_name: "Horvat".into(),
            phone: "091".into(),
            address: "Ilica 1".into(),
        };
        let saved = accounts.update_profile(ana.id, &update).await.unwrap();
        assert_eq!(saved.first_name, "Anna");
        assert_eq!(tokens.resolve(&token).await.unwrap().address, "Ilica 1");

        let blank = ProfileUpdate { last_name: "".into(), ..update };
        assert!(matches!(accounts.update_profile(ana.id, &blank).await, Err(AccountsError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_admin_role_change_and_delete() {
        let (repo, tokens, accounts) = setup().await;
        let admin = user("Root", "root@example.com");
        let ana = user("Ana", "ana@example.com");
        repo.insert_user(&admin).await.unwrap();
        repo.insert_user(&ana).await.unwrap();
        let token = tokens.issue(&ana).await;

        assert!(matches!(accounts.set_role(admin.id, admin.id, Role::Client).await, Err(AccountsError::OwnAccount)));
        accounts.set_role(admin.id, ana.id, Role::Admin).await.unwrap();
        assert_eq!(tokens.resolve(&token).await.unwrap().role, Role::Admin);

        accounts.delete(admin.id, ana.id).await.unwrap();
        assert!(tokens.resolve(&token).await.is_none());
        assert!(matches!(accounts.get(ana.id).await, Err(AccountsError::NotFound)));
        assert!(matches!(accounts.delete(admin.id, ana.id).await, Err(AccountsError::NotFound)));
    }

    #[tokio::test]
    async fn test_user_listing_search_and_sort() {
        let (repo, _, accounts) = setup().await;
        for (name, email) in [("Ana", "ana@example.com"), ("Bruno", "bruno@shop.hr"), ("Cvita", "cvita@shop.hr")] {
            repo.insert_user(&user(name, email)).await.unwrap();
        }
        let query = UserQuery {
            filter: UserFilter { search: Some("shop.hr".into()) },
            sort: Sort::new(UserSort::FirstName, Direction::Asc),
            page: PageRequest::new(1, 1),
        };
        let page = accounts.list(&query).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data[0].first_name, "Bruno");
    }
}
