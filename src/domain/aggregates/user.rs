//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{required, Email, Role, UserId, ValueError};

/// A registered account. The password hash never leaves the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub password_hash: String,
}

/// Profile fields a user may edit on their own account.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileUpdate {
    pub fn cleaned(&self) -> Result<Self, ValueError> {
        Ok(Self {
            first_name: required("first name", &self.first_name)?,
            last_name: required("last name", &self.last_name)?,
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        })
    }
}

impl User {
    pub fn new(first_name: &str, last_name: &str, email: Email, password_hash: String) -> Result<Self, ValueError> {
        Ok(Self {
            id: UserId::new(),
            first_name: required("first name", first_name)?,
            last_name: required("last name", last_name)?,
            email,
            phone: String::new(),
            address: String::new(),
            role: Role::Client,
            created_at: Utc::now(),
            password_hash,
        })
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        self.first_name.clone_from(&update.first_name);
        self.last_name.clone_from(&update.last_name);
        self.phone.clone_from(&update.phone);
        self.address.clone_from(&update.address);
    }
}
