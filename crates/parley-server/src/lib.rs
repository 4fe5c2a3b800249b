pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use parley_api::AppState;
use parley_gateway::{Dispatcher, HEARTBEAT_INTERVAL, Identity, connection};
use parley_types::api::Claims;
use parley_types::error::is_blank;

/// State for the `/gateway` upgrade route.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Dispatcher,
    pub allowed_origin: Arc<str>,
    pub jwt_secret: Option<Arc<str>>,
    pub heartbeat: Duration,
}

impl GatewayState {
    pub fn new(dispatcher: Dispatcher, allowed_origin: &str, jwt_secret: Option<&str>) -> Self {
        Self {
            dispatcher,
            allowed_origin: allowed_origin.into(),
            jwt_secret: jwt_secret.map(Into::into),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
    pub username: Option<String>,
}

/// Full HTTP surface: REST routes plus the real-time gateway.
pub fn app(state: AppState, gateway: GatewayState) -> Router {
    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway);

    Router::new()
        .merge(parley_api::routes(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN) {
        if &*state.allowed_origin != "*" && origin.as_bytes() != state.allowed_origin.as_bytes() {
            warn!("Rejected gateway upgrade from origin {:?}", origin);
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let identity = match resolve_identity(&state, &headers, query) {
        Ok(identity) => identity,
        Err(status) => return status.into_response(),
    };

    ws.on_upgrade(move |socket| {
        connection::handle_connection_with_heartbeat(socket, state.dispatcher, identity, state.heartbeat)
    })
}

/// Bind the connection to a user. With a secret configured a valid token is
/// mandatory; otherwise an optional `username` is taken on trust.
fn resolve_identity(
    state: &GatewayState,
    headers: &HeaderMap,
    query: GatewayQuery,
) -> Result<Identity, StatusCode> {
    let Some(secret) = &state.jwt_secret else {
        return Ok(match query.username {
            Some(name) if !is_blank(&name) => Identity::Claimed(name),
            _ => Identity::Anonymous,
        });
    };

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(query.token)
        .ok_or_else(|| {
            warn!("Rejected gateway upgrade without token");
            StatusCode::UNAUTHORIZED
        })?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Rejected gateway upgrade with invalid token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    Ok(Identity::Verified(token_data.claims.username))
}
