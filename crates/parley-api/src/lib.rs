pub mod error;
pub mod history;
pub mod messages;
pub mod users;

use std::sync::Arc;

use axum::{Router, routing::get};

use parley_db::{MessageStore, UserDirectory};

use crate::history::HistoryService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub history: HistoryService,
    pub users: Arc<dyn UserDirectory>,
}

impl AppStateInner {
    pub fn new(messages: Arc<dyn MessageStore>, users: Arc<dyn UserDirectory>) -> AppState {
        Arc::new(Self {
            history: HistoryService::new(messages),
            users,
        })
    }
}

/// REST routes: liveness, conversation history and the user directory.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/messages", get(messages::get_messages))
        .route("/users", get(users::get_users))
        .with_state(state)
}

async fn welcome() -> &'static str {
    "Welcome to Parley"
}
