use axum::{
    Json,
    extract::{Query, State},
};
use tracing::error;

use parley_db::StorageError;
use parley_types::api::UsersQuery;
use parley_types::models::UserEntry;

use crate::AppState;
use crate::error::ApiError;

const FETCH_FAILED: &str = "Error fetching users";

/// `GET /users?currentUser=`
pub async fn get_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<UserEntry>>, ApiError> {
    let directory = state.users.clone();
    let users = tokio::task::spawn_blocking(move || directory.list_except(query.current_user.as_deref()))
        .await
        .map_err(|e| StorageError::new(format!("directory task failed: {}", e)))
        .and_then(|result| result)
        .map_err(|source| {
            error!("{}: {}", FETCH_FAILED, source);
            ApiError::Storage {
                context: FETCH_FAILED,
                source,
            }
        })?;

    Ok(Json(users))
}
