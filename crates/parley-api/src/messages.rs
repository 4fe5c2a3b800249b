use axum::{
    Json,
    extract::{Query, State},
};
use tracing::error;

use parley_types::api::ConversationQuery;
use parley_types::models::Message;

use crate::AppState;
use crate::error::ApiError;
use crate::history::HistoryError;

const FETCH_FAILED: &str = "Error fetching messages";

/// `GET /messages?sender=&receiver=`
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state
        .history
        .conversation(query.sender.as_deref(), query.receiver.as_deref())
        .await
        .map_err(|e| match e {
            HistoryError::Validation(source) => ApiError::BadRequest {
                context: FETCH_FAILED,
                source,
            },
            HistoryError::Storage(source) => {
                error!("{}: {}", FETCH_FAILED, source);
                ApiError::Storage {
                    context: FETCH_FAILED,
                    source,
                }
            }
        })?;

    Ok(Json(messages))
}
