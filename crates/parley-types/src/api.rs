use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Claims carried by gateway tokens. Tokens are issued by the external
/// auth service; this side only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Queries --

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub sender: Option<String>,
    pub receiver: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(rename = "currentUser")]
    pub current_user: Option<String>,
}

// -- Errors --

/// JSON body returned with every non-2xx REST response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}
