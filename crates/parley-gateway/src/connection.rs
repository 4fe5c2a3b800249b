use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

use parley_types::events::GatewayCommand;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::registry::{ConnectionId, Identity};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one gateway connection until the client leaves or the transport fails.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, identity: Identity) {
    handle_connection_with_heartbeat(socket, dispatcher, identity, HEARTBEAT_INTERVAL).await
}

/// Same as [`handle_connection`] with a custom ping interval.
///
/// Inbound commands are queued to a per-connection dispatch task that is
/// never aborted: once a `send_message` frame has been read it is stored
/// and relayed even if the transport dies meanwhile.
pub async fn handle_connection_with_heartbeat(
    socket: WebSocket,
    dispatcher: Dispatcher,
    identity: Identity,
    heartbeat_interval: Duration,
) {
    let (mut sender, mut receiver) = socket.split();

    let registry = dispatcher.registry().clone();
    let (conn_id, mut peer_rx) = registry.register(identity.clone()).await;
    info!("Connection {} opened by {}", conn_id, identity);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward fanned-out events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = peer_rx.recv() => {
                    let Some(event) = result else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Commands are handled in arrival order, one at a time
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<GatewayCommand>();
    let dispatch_identity = identity.clone();
    let dispatch_task = tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            handle_command(&dispatcher, conn_id, &dispatch_identity, cmd).await;
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if cmd_tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        warn!("Connection {} bad command: {} -- raw: {}", conn_id, e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(conn_id).await;

    // recv_task is gone, so the queue is closed; let queued sends finish
    if let Err(e) = dispatch_task.await {
        error!("Connection {} dispatch task failed: {}", conn_id, e);
    }
    info!("Connection {} closed by {}", conn_id, identity);
}

async fn handle_command(
    dispatcher: &Dispatcher,
    conn_id: ConnectionId,
    identity: &Identity,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::SendMessage(payload) => {
            match dispatcher.handle_send(conn_id, identity, payload).await {
                Ok(delivery) => {
                    trace!("Connection {} stored message {}", conn_id, delivery.message.id);
                }
                Err(e @ DispatchError::Storage(_)) => {
                    error!("Connection {} message dropped: {}", conn_id, e);
                }
                Err(e) => {
                    warn!("Connection {} message dropped: {}", conn_id, e);
                }
            }
        }
    }
}
