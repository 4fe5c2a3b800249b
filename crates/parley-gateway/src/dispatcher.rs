use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use parley_db::{MessageStore, StorageError};
use parley_types::error::ValidationError;
use parley_types::events::{ChatPayload, GatewayEvent};
use parley_types::models::Message;

use crate::registry::{ConnectionId, ConnectionRegistry, Identity};

/// Who receives a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Every other open connection, whoever it belongs to.
    #[default]
    Broadcast,
    /// Only connections bound to the message's receiver.
    Addressed,
}

#[derive(Debug, Error)]
#[error("unknown delivery mode '{0}' (expected 'broadcast' or 'addressed')")]
pub struct UnknownDeliveryMode(String);

impl FromStr for DeliveryMode {
    type Err = UnknownDeliveryMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" => Ok(Self::Broadcast),
            "addressed" => Ok(Self::Addressed),
            _ => Err(UnknownDeliveryMode(s.to_string())),
        }
    }
}

/// Why a `send_message` event was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("connection bound to '{bound}' tried to send as '{claimed}'")]
    SenderMismatch { bound: String, claimed: String },

    #[error("failed to store message: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub recipients: usize,
}

/// Persists inbound messages, then fans them out through the registry.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: ConnectionRegistry,
    store: Arc<dyn MessageStore>,
    mode: DeliveryMode,
}

impl Dispatcher {
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn MessageStore>, mode: DeliveryMode) -> Self {
        Self {
            inner: Arc::new(DispatcherInner { registry, store, mode }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn mode(&self) -> DeliveryMode {
        self.inner.mode
    }

    /// Validate, store, then relay one `send_message` event.
    ///
    /// The store write completes before anything is relayed, so a history
    /// query made after a peer sees the event always includes it. On any
    /// error nothing is relayed.
    pub async fn handle_send(
        &self,
        origin: ConnectionId,
        identity: &Identity,
        payload: ChatPayload,
    ) -> Result<Delivery, DispatchError> {
        let new_message = payload.validate()?;

        if let Identity::Verified(bound) = identity {
            if *bound != new_message.sender {
                return Err(DispatchError::SenderMismatch {
                    bound: bound.clone(),
                    claimed: new_message.sender,
                });
            }
        }

        // Run blocking DB insert off the async runtime
        let store = self.inner.store.clone();
        let message = tokio::task::spawn_blocking(move || store.append(new_message))
            .await
            .map_err(|e| StorageError::new(format!("store task failed: {}", e)))??;

        let event = GatewayEvent::ReceiveMessage(payload);
        let recipients = match self.inner.mode {
            DeliveryMode::Broadcast => self.inner.registry.broadcast_except(origin, &event).await,
            DeliveryMode::Addressed => {
                self.inner
                    .registry
                    .send_to_user_except(origin, &message.receiver, &event)
                    .await
            }
        };

        debug!(
            "Message {} from {} to {} relayed to {} connection(s)",
            message.id, message.sender, message.receiver, recipients
        );

        Ok(Delivery { message, recipients })
    }
}
