use std::sync::Arc;

use thiserror::Error;

use parley_db::{MessageStore, StorageError};
use parley_types::error::{ValidationError, is_blank};
use parley_types::models::Message;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Conversation lookups for the request/response side.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn MessageStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Full conversation between two users, oldest first. Both participants
    /// must be present; storage is not touched otherwise.
    pub async fn conversation(
        &self,
        sender: Option<&str>,
        receiver: Option<&str>,
    ) -> Result<Vec<Message>, HistoryError> {
        let sender = present(sender).ok_or(ValidationError::MissingSender)?;
        let receiver = present(receiver).ok_or(ValidationError::MissingReceiver)?;

        let store = self.store.clone();
        let messages = tokio::task::spawn_blocking(move || store.find_conversation(&sender, &receiver))
            .await
            .map_err(|e| StorageError::new(format!("store task failed: {}", e)))??;

        Ok(messages)
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|v| !is_blank(v)).map(str::to_string)
}
