//! Domain event publishing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("event transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Publishes JSON-encoded events on their NATS subject.
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(event.subject().to_string(), payload.into())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Writes events to the trace log. Used when no broker is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(subject = event.subject(), %payload, "domain event");
        Ok(())
    }
}

/// Publishes every event in order. Failures are logged, never returned.
pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(subject = event.subject(), error = %e, "failed to publish domain event");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ProductEvent;
    use crate::domain::value_objects::ProductId;

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker down".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_failures_are_swallowed() {
        let event = DomainEvent::Product(ProductEvent::Deleted { product_id: ProductId::new() });
        publish_all(&FailingPublisher, vec![event.clone()]).await;
        publish_all(&LogPublisher, vec![event]).await;
    }

    #[test]
    fn test_event_payload_shape() {
        let event = DomainEvent::Product(ProductEvent::StockAdjusted { product_id: ProductId::new(), from: 4, to: 9 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "product");
        assert_eq!(json["event"]["type"], "stock_adjusted");
        assert_eq!(json["event"]["to"], 9);
    }
}
