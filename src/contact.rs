//! Contact form relay to a third-party form endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactMessage {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("contact form is not configured")]
    NotConfigured,
    #[error("form endpoint rejected the message with status {0}")]
    Upstream(u16),
    #[error("form endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct ContactRelay {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl ContactRelay {
    pub fn new(http: reqwest::Client, endpoint: Option<String>) -> Self { Self { http, endpoint } }

    pub async fn send(&self, message: &ContactMessage) -> Result<(), ContactError> {
        let message = ContactMessage {
            name: message.name.trim().to_string(),
            email: message.email.trim().to_string(),
            message: message.message.trim().to_string(),
        };
        message.validate().map_err(|e| ContactError::Validation(e.to_string()))?;
        let endpoint = self.endpoint.as_deref().ok_or(ContactError::NotConfigured)?;

        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "contact relay rejected message");
            return Err(ContactError::Upstream(status.as_u16()));
        }
        tracing::info!("contact message relayed");
        Ok(())
    }
}
