use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use parley_types::models::{Message, NewMessage, UserEntry};

use crate::Database;
use crate::models::{MessageRow, UserRow};

/// The backing store could not be reached or the read/write failed.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StorageError(String);

impl StorageError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

impl From<anyhow::Error> for StorageError {
    fn from(e: anyhow::Error) -> Self {
        Self(format!("{:#}", e))
    }
}

/// Durable, append-only message log.
pub trait MessageStore: Send + Sync {
    /// Store a new message with a server-assigned id and timestamp.
    fn append(&self, message: NewMessage) -> Result<Message, StorageError>;

    /// Every message exchanged between `a` and `b` in either direction,
    /// oldest first.
    fn find_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StorageError>;
}

/// Read side of the registered-user table.
pub trait UserDirectory: Send + Sync {
    /// Every user except `current_user`. `None` or empty returns all users.
    fn list_except(&self, current_user: Option<&str>) -> Result<Vec<UserEntry>, StorageError>;
}

impl MessageStore for Database {
    fn append(&self, message: NewMessage) -> Result<Message, StorageError> {
        let id = Uuid::new_v4();
        let row = self.insert_message(
            &id.to_string(),
            &message.sender,
            &message.receiver,
            &message.body,
        )?;
        Ok(message_from_row(row))
    }

    fn find_conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StorageError> {
        let rows = self.get_conversation(a, b)?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }
}

impl UserDirectory for Database {
    fn list_except(&self, current_user: Option<&str>) -> Result<Vec<UserEntry>, StorageError> {
        let excluded = current_user.filter(|u| !u.is_empty());
        let rows = self.get_users_except(excluded)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on message '{}'", row.created_at, row.id);
            DateTime::default()
        }),
        sender: row.sender,
        receiver: row.receiver,
        body: row.body,
    }
}

fn user_from_row(row: UserRow) -> UserEntry {
    UserEntry {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt user id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on user '{}'", row.created_at, row.username);
            DateTime::default()
        }),
        username: row.username,
    }
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format ("YYYY-MM-DD HH:MM:SS", UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .ok()
}
