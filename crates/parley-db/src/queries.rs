use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension};

/// Storage format for message timestamps. Fixed width, so text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    /// All users except `excluded`, ordered by username. `None` returns everyone.
    pub fn get_users_except(&self, excluded: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users_except(conn, excluded))
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> Result<MessageRow> {
        self.insert_message_at(id, sender, receiver, body, Utc::now())
    }

    /// Insert with an explicit clock reading. The stored timestamp is bumped
    /// to 1µs past the newest existing one when the clock hasn't moved on.
    pub fn insert_message_at(
        &self,
        id: &str,
        sender: &str,
        receiver: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let mut created_at = now.trunc_subsecs(6);
            if let Some(last) = latest_message_timestamp(conn)? {
                if created_at <= last {
                    created_at = last + TimeDelta::microseconds(1);
                }
            }
            let created_at = created_at.format(TIMESTAMP_FORMAT).to_string();

            conn.execute(
                "INSERT INTO messages (id, sender, receiver, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender, receiver, body, created_at],
            )?;

            Ok(MessageRow {
                id: id.to_string(),
                sender: sender.to_string(),
                receiver: receiver.to_string(),
                body: body.to_string(),
                created_at,
            })
        })
    }

    /// Both directions of the `a`/`b` conversation, oldest first.
    pub fn get_conversation(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b))
    }
}

fn latest_message_timestamp(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row("SELECT MAX(created_at) FROM messages", [], |row| row.get(0))
        .optional()?
        .flatten();

    match raw {
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| anyhow::anyhow!("Corrupt created_at '{}': {}", raw, e))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

fn query_conversation(conn: &Connection, a: &str, b: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, receiver, body, created_at
         FROM messages
         WHERE (sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1)
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![a, b], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender: row.get(1)?,
                receiver: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_users_except(conn: &Connection, excluded: Option<&str>) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, created_at
         FROM users
         WHERE ?1 IS NULL OR username <> ?1
         ORDER BY username ASC",
    )?;

    let rows = stmt
        .query_map([excluded], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
