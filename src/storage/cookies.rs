use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::{KeyValueStore, StorageError};

pub const DEFAULT_COOKIE_DAYS: i64 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires: DateTime<Utc>,
}

impl Cookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires <= now }
}

/// Cookie jar with per-cookie expiry. Expired cookies read as absent.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<BTreeMap<String, Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self { Self::default() }

    pub fn set_for_days(&self, name: &str, value: &str, days: i64) {
        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            expires: Utc::now() + Duration::days(days),
        };
        self.lock().insert(name.to_string(), cookie);
    }

    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        let now = Utc::now();
        self.lock().get(name).filter(|c| !c.is_expired_at(now)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for CookieJar {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.cookie(key).map(|c| c.value))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_for_days(key, value, DEFAULT_COOKIE_DAYS);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock().clear();
        Ok(())
    }
}
