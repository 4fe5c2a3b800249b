/// Database row types, these map directly to SQLite rows.
/// Distinct from parley-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub created_at: String,
}
