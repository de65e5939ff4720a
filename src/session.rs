//! Credential session held by a client.
//!
//! One [`SessionContext`] owns the signed-in credential. Changes are written
//! through to durable storage, session storage and a cookie carrying only the
//! access token, and observers are notified over a `watch` channel.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::aggregates::User;
use crate::domain::value_objects::Role;
use crate::storage::{KeyValueStore, StorageError, StorageService, DEFAULT_COOKIE_DAYS};

pub const CREDENTIALS_KEY: &str = "user_credentials";
pub const SESSION_KEY: &str = "user_session";
pub const TOKEN_COOKIE: &str = "user_token";

/// Signed-in identity plus the bearer token that authorizes API calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user: User,
    pub access_token: String,
}

impl Credential {
    pub fn role(&self) -> Role { self.user.role }
}

pub struct SessionContext {
    storage: StorageService,
    tx: watch::Sender<Option<Credential>>,
}

impl SessionContext {
    /// Restores whatever credential durable storage holds.
    ///
    /// An unreadable stored credential is dropped rather than failing startup.
    pub fn hydrate(storage: StorageService) -> Self {
        let current = match storage.local.get::<Credential>(CREDENTIALS_KEY) {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable stored credential");
                None
            }
        };
        let (tx, _) = watch::channel(current);
        Self { storage, tx }
    }

    pub fn current(&self) -> Option<Credential> { self.tx.borrow().clone() }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|c| c.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool { self.tx.borrow().is_some() }

    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> { self.tx.subscribe() }

    /// Replaces the credential. `None` signs out and wipes all three backings.
    pub fn set(&self, credential: Option<Credential>) -> Result<(), StorageError> {
        match &credential {
            Some(c) => {
                self.storage.local.set(CREDENTIALS_KEY, c)?;
                self.storage.session.set(SESSION_KEY, c)?;
                self.storage.cookies.set_for_days(TOKEN_COOKIE, &c.access_token, DEFAULT_COOKIE_DAYS);
            }
            None => {
                self.storage.local.remove(CREDENTIALS_KEY)?;
                self.storage.session.remove(SESSION_KEY)?;
                self.storage.cookies.remove(TOKEN_COOKIE)?;
            }
        }
        self.tx.send_replace(credential);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> { self.set(None) }
}
