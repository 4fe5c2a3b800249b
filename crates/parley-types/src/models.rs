use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted direct message. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub receiver: String,
    #[serde(rename = "message")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A message that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: String,
    pub receiver: String,
    pub body: String,
}

/// Directory projection of a registered user. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}
