//! Registration, sign-in and password management.
//!
//! Passwords are stored as Argon2id hashes. A successful sign-in issues an
//! opaque random access token kept in a process-local [`TokenStore`]. Tokens
//! expire after [`TOKEN_TTL`], the store holds at most [`MAX_TOKENS`] of them,
//! and none survive a restart.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use moka::future::Cache;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::User;
use crate::domain::value_objects::{Email, UserId, ValueError};
use crate::repository::{Repository, RepositoryError, UserRepository};
use crate::session::Credential;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Invalid(#[from] ValueError),
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("new password must be different from the current password")]
    PasswordUnchanged,
    #[error("current password is incorrect")]
    IncorrectPassword,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    UserAlreadyExists,
    #[error("user not found")]
    UserNotFound,
    #[error("missing or unknown access token")]
    Unauthorized,
    #[error("password hashing error")]
    PasswordHash,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "password confirmation is required"))]
    pub confirm_password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct PasswordChange {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 1, message = "new password is required"))]
    pub new_password: String,
    #[validate(length(min = 1, message = "password confirmation is required"))]
    pub confirm_password: String,
}

/// Matches the lifetime of the client's `user_token` cookie.
pub const TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const MAX_TOKENS: u64 = 100_000;

/// Live access tokens and the user snapshot each one resolves to.
pub struct TokenStore {
    tokens: Cache<String, User>,
}

impl Default for TokenStore {
    fn default() -> Self { Self::new() }
}

impl TokenStore {
    pub fn new() -> Self { Self::with_limits(MAX_TOKENS, TOKEN_TTL) }

    pub fn with_limits(max_capacity: u64, time_to_live: Duration) -> Self {
        Self { tokens: Cache::builder().max_capacity(max_capacity).time_to_live(time_to_live).build() }
    }

    pub async fn issue(&self, user: &User) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.tokens.insert(token.clone(), user.clone()).await;
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<User> { self.tokens.get(token).await }

    pub async fn revoke(&self, token: &str) -> bool { self.tokens.remove(token).await.is_some() }

    /// Replaces the snapshot behind every token of `user`.
    pub async fn refresh_user(&self, user: &User) {
        for token in self.tokens_of(user.id) {
            self.tokens.insert(token.as_ref().clone(), user.clone()).await;
        }
    }

    pub async fn revoke_user(&self, user_id: UserId) {
        for token in self.tokens_of(user_id) {
            self.tokens.invalidate(token.as_str()).await;
        }
    }

    fn tokens_of(&self, user_id: UserId) -> Vec<Arc<String>> {
        self.tokens.iter().filter(|(_, u)| u.id == user_id).map(|(token, _)| token).collect()
    }
}

pub struct AuthService {
    repo: Arc<dyn Repository>,
    tokens: Arc<TokenStore>,
}

impl AuthService {
    pub fn new(repo: Arc<dyn Repository>, tokens: Arc<TokenStore>) -> Self { Self { repo, tokens } }

    /// Creates a client account.
    pub async fn register(&self, form: &Registration) -> Result<User, AuthError> {
        form.validate().map_err(|e| AuthError::Validation(e.to_string()))?;
        if form.password != form.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        let email = Email::parse(&form.email)?;
        let mut user = User::new(&form.first_name, &form.last_name, email, hash_password(&form.password)?)?;
        user.phone = form.phone.trim().to_string();
        user.address = form.address.trim().to_string();

        self.repo.insert_user(&user).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verifies email and password and issues a credential. Unknown email and
    /// wrong password are indistinguishable to the caller.
    pub async fn login(&self, form: &LoginRequest) -> Result<Credential, AuthError> {
        form.validate().map_err(|e| AuthError::Validation(e.to_string()))?;
        let email = Email::parse(&form.email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self.repo.get_user_by_email(&email).await?.ok_or(AuthError::InvalidCredentials)?;
        verify_password(&form.password, &user.password_hash).map_err(|_| AuthError::InvalidCredentials)?;

        let access_token = self.tokens.issue(&user).await;
        tracing::info!(user_id = %user.id, "user signed in");
        Ok(Credential { user, access_token })
    }

    pub async fn logout(&self, token: &str) {
        if self.tokens.revoke(token).await {
            tracing::debug!("access token revoked");
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        self.tokens.resolve(token).await.ok_or(AuthError::Unauthorized)
    }

    pub async fn change_password(&self, user_id: UserId, form: &PasswordChange) -> Result<(), AuthError> {
        form.validate().map_err(|e| AuthError::Validation(e.to_string()))?;
        if form.new_password != form.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        if form.new_password == form.current_password {
            return Err(AuthError::PasswordUnchanged);
        }
        let mut user = self.repo.get_user(user_id).await?.ok_or(AuthError::UserNotFound)?;
        verify_password(&form.current_password, &user.password_hash).map_err(|_| AuthError::IncorrectPassword)?;

        user.password_hash = hash_password(&form.new_password)?;
        self.repo.update_user(&user).await?;
        self.tokens.refresh_user(&user).await;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Role;
    use crate::repository::InMemoryRepository;

    fn service() -> (Arc<TokenStore>, AuthService) {
        let tokens = Arc::new(TokenStore::new());
        (tokens.clone(), AuthService::new(Arc::new(InMemoryRepository::new()), tokens))
    }

    fn registration(email: &str) -> Registration {
        Registration {
            first_name: "Ana".into(),
            last_name: "Horvat".into(),
            email: email.into(),
            password: "s3cret".into(),
            confirm_password: "s3cret".into(),
            phone: " 091 ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash).is_ok());
        assert!(matches!(verify_password("hunter3", &hash), Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (tokens, auth) = service();
        let user = auth.register(&registration("Ana@Example.com")).await.unwrap();
        assert_eq!(user.role, Role::Client);
        assert_eq!(user.phone, "091");
        assert_ne!(user.password_hash, "s3cret");

        let cred = auth
            .login(&LoginRequest { email: "ana@example.com".into(), password: "s3cret".into() })
            .await
            .unwrap();
        assert_eq!(cred.user.id, user.id);
        assert_eq!(tokens.resolve(&cred.access_token).await.unwrap().id, user.id);

        auth.logout(&cred.access_token).await;
        assert!(matches!(auth.authenticate(&cred.access_token).await, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let (_, auth) = service();
        auth.register(&registration("ana@example.com")).await.unwrap();
        assert!(matches!(auth.register(&registration("ANA@example.com")).await, Err(AuthError::UserAlreadyExists)));

        let mismatch = Registration { confirm_password: "other".into(), ..registration("b@example.com") };
        assert!(matches!(auth.register(&mismatch).await, Err(AuthError::PasswordMismatch)));

        let missing = Registration { first_name: String::new(), ..registration("c@example.com") };
        assert!(matches!(auth.register(&missing).await, Err(AuthError::Validation(_))));

        let bad_email = registration("not-an-email");
        assert!(matches!(auth.register(&bad_email).await, Err(AuthError::Invalid(ValueError::InvalidEmail(_)))));
    }

    #[tokio::test]
    async fn test_login_errors_are_generic() {
        let (_, auth) = service();
        auth.register(&registration("ana@example.com")).await.unwrap();
        let wrong_password = LoginRequest { email: "ana@example.com".into(), password: "nope".into() };
        let unknown = LoginRequest { email: "who@example.com".into(), password: "s3cret".into() };
        assert!(matches!(auth.login(&wrong_password).await, Err(AuthError::InvalidCredentials)));
        assert!(matches!(auth.login(&unknown).await, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_rules() {
        let (_, auth) = service();
        let user = auth.register(&registration("ana@example.com")).await.unwrap();
        let change = |current: &str, new: &str, confirm: &str| PasswordChange {
            current_password: current.into(),
            new_password: new.into(),
            confirm_password: confirm.into(),
        };

        assert!(matches!(auth.change_password(user.id, &change("s3cret", "a", "b")).await, Err(AuthError::PasswordMismatch)));
        assert!(matches!(auth.change_password(user.id, &change("s3cret", "s3cret", "s3cret")).await, Err(AuthError::PasswordUnchanged)));
        assert!(matches!(auth.change_password(user.id, &change("wrong", "fresh", "fresh")).await, Err(AuthError::IncorrectPassword)));
        auth.change_password(user.id, &change("s3cret", "fresh", "fresh")).await.unwrap();

        let login = LoginRequest { email: "ana@example.com".into(), password: "fresh".into() };
        assert!(auth.login(&login).await.is_ok());
    }

    #[tokio::test]
    async fn test_token_store_refresh_and_revoke_user() {
        let store = TokenStore::new();
        let mut user = User::new("Ana", "H", Email::parse("ana@example.com").unwrap(), String::new()).unwrap();
        let other = User::new("Marko", "K", Email::parse("marko@example.com").unwrap(), String::new()).unwrap();
        let first = store.issue(&user).await;
        let second = store.issue(&user).await;
        let kept = store.issue(&other).await;
        assert_ne!(first, second);

        user.role = Role::Admin;
        store.refresh_user(&user).await;
        assert_eq!(store.resolve(&second).await.unwrap().role, Role::Admin);
        assert_eq!(store.resolve(&kept).await.unwrap().role, Role::Client);

        store.revoke_user(user.id).await;
        assert!(store.resolve(&first).await.is_none());
        assert!(store.resolve(&second).await.is_none());
        assert!(store.resolve(&kept).await.is_some());
    }

    #[tokio::test]
    async fn test_tokens_expire() {
        let store = TokenStore::with_limits(16, Duration::from_millis(50));
        let user = User::new("Ana", "H", Email::parse("ana@example.com").unwrap(), String::new()).unwrap();
        let token = store.issue(&user).await;
        assert!(store.resolve(&token).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.resolve(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_token_store_is_bounded() {
        let store = TokenStore::with_limits(4, TOKEN_TTL);
        let user = User::new("Ana", "H", Email::parse("ana@example.com").unwrap(), String::new()).unwrap();
        for _ in 0..64 {
            store.issue(&user).await;
        }
        store.tokens.run_pending_tasks().await;
        assert!(store.tokens.entry_count() <= 4);
    }
}
