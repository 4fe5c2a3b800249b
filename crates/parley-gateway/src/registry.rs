use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Opaque handle for one live gateway connection.
pub type ConnectionId = Uuid;

/// Who a connection speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Nothing was presented at upgrade time.
    Anonymous,
    /// A username supplied by the client without proof.
    Claimed(String),
    /// A username taken from a verified token.
    Verified(String),
}

impl Identity {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Claimed(name) | Self::Verified(name) => Some(name),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Claimed(name) => write!(f, "{} (unverified)", name),
            Self::Verified(name) => write!(f, "{}", name),
        }
    }
}

struct Peer {
    identity: Identity,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Tracks every open gateway connection and fans events out to them.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    peers: Arc<RwLock<HashMap<ConnectionId, Peer>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Events for it arrive on the returned receiver.
    pub async fn register(
        &self,
        identity: Identity,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.write().await.insert(conn_id, Peer { identity, tx });
        (conn_id, rx)
    }

    /// Remove a connection. Returns false if it was not registered.
    pub async fn unregister(&self, conn_id: ConnectionId) -> bool {
        self.peers.write().await.remove(&conn_id).is_some()
    }

    /// Deliver `event` to every connection except `origin`.
    /// Returns the number of peers that accepted it.
    pub async fn broadcast_except(&self, origin: ConnectionId, event: &GatewayEvent) -> usize {
        let peers = self.peers.read().await;
        peers
            .iter()
            .filter(|(id, _)| **id != origin)
            .filter(|(_, peer)| peer.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Deliver `event` only to connections bound to `username`, skipping `origin`.
    pub async fn send_to_user_except(
        &self,
        origin: ConnectionId,
        username: &str,
        event: &GatewayEvent,
    ) -> usize {
        let peers = self.peers.read().await;
        peers
            .iter()
            .filter(|(id, _)| **id != origin)
            .filter(|(_, peer)| peer.identity.username() == Some(username))
            .filter(|(_, peer)| peer.tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::events::ChatPayload;

    fn event(body: &str) -> GatewayEvent {
        GatewayEvent::ReceiveMessage(ChatPayload {
            sender: "alice".into(),
            receiver: "bob".into(),
            message: body.into(),
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<GatewayEvent>) -> Vec<GatewayEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn broadcast_skips_origin() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = registry.register(Identity::Anonymous).await;
        let (_b, mut rx_b) = registry.register(Identity::Anonymous).await;
        let (_c, mut rx_c) = registry.register(Identity::Anonymous).await;

        let delivered = registry.broadcast_except(a, &event("hi")).await;

        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut rx_a), vec![]);
        assert_eq!(drain(&mut rx_b), vec![event("hi")]);
        assert_eq!(drain(&mut rx_c), vec![event("hi")]);
    }

    #[tokio::test]
    async fn unregister_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register(Identity::Anonymous).await;
        let (_b, mut rx_b) = registry.register(Identity::Anonymous).await;

        assert!(!registry.unregister(Uuid::new_v4()).await);
        assert_eq!(registry.len().await, 2);

        registry.broadcast_except(a, &event("still here")).await;
        assert_eq!(drain(&mut rx_b), vec![event("still here")]);
    }

    #[tokio::test]
    async fn unregister_twice_is_noop() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = registry.register(Identity::Anonymous).await;

        assert!(registry.unregister(a).await);
        assert!(!registry.unregister(a).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn unregistered_peer_receives_nothing() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register(Identity::Anonymous).await;
        let (b, mut rx_b) = registry.register(Identity::Anonymous).await;

        registry.unregister(b).await;
        assert_eq!(registry.broadcast_except(a, &event("gone")).await, 0);
        assert_eq!(drain(&mut rx_b), vec![]);
    }

    #[tokio::test]
    async fn closed_peer_is_skipped() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register(Identity::Anonymous).await;
        let (_b, rx_b) = registry.register(Identity::Anonymous).await;
        let (_c, mut rx_c) = registry.register(Identity::Anonymous).await;
        drop(rx_b);

        assert_eq!(registry.broadcast_except(a, &event("hi")).await, 1);
        assert_eq!(drain(&mut rx_c), vec![event("hi")]);
    }

    #[tokio::test]
    async fn targeted_send_matches_bound_username() {
        let registry = ConnectionRegistry::new();
        let (origin, _rx) = registry.register(Identity::Verified("alice".into())).await;
        let (_bob1, mut rx_bob1) = registry.register(Identity::Verified("bob".into())).await;
        let (_bob2, mut rx_bob2) = registry.register(Identity::Claimed("bob".into())).await;
        let (_carol, mut rx_carol) = registry.register(Identity::Claimed("carol".into())).await;
        let (_anon, mut rx_anon) = registry.register(Identity::Anonymous).await;

        assert_eq!(registry.send_to_user_except(origin, "bob", &event("hi")).await, 2);
        assert_eq!(drain(&mut rx_bob1).len(), 1);
        assert_eq!(drain(&mut rx_bob2).len(), 1);
        assert!(drain(&mut rx_carol).is_empty());
        assert!(drain(&mut rx_anon).is_empty());
    }

    #[test]
    fn identity_username() {
        assert_eq!(Identity::Anonymous.username(), None);
        assert_eq!(Identity::Claimed("bob".into()).username(), Some("bob"));
        assert_eq!(Identity::Verified("bob".into()).username(), Some("bob"));
    }
}
