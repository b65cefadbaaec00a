//! Order notifications.
//!
//! Accepted order changes are announced on NATS for downstream consumers
//! (confirmation mail, fulfilment). Notification is best-effort: callers log
//! a failure and carry on.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::events::OrderEvent;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to publish event: {0}")]
    Publish(String),
}

#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug)]
pub struct NatsNotifier {
    client: async_nats::Client,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(event.subject().to_string(), payload.into())
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        tracing::debug!(subject = event.subject(), order_id = %event.order_id(), "order event published");
        Ok(())
    }
}

/// Used when no NATS server is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        tracing::info!(subject = event.subject(), order_id = %event.order_id(), "order event (not published)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_log_notifier_accepts_every_event() {
        let event = OrderEvent::Cancelled { order_id: Uuid::now_v7() };
        assert!(LogNotifier.publish(&event).await.is_ok());
    }
}
