use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use parley_api::{AppStateInner, routes};
use parley_db::{Database, MessageStore, StorageError, UserDirectory};
use parley_types::models::{Message, NewMessage, UserEntry};

struct OfflineStore;

impl MessageStore for OfflineStore {
    fn append(&self, _message: NewMessage) -> Result<Message, StorageError> {
        Err(StorageError::new("unable to open database file"))
    }

    fn find_conversation(&self, _a: &str, _b: &str) -> Result<Vec<Message>, StorageError> {
        Err(StorageError::new("unable to open database file"))
    }
}

impl UserDirectory for OfflineStore {
    fn list_except(&self, _current_user: Option<&str>) -> Result<Vec<UserEntry>, StorageError> {
        Err(StorageError::new("unable to open database file"))
    }
}

fn app_with(db: Arc<Database>) -> Router {
    routes(AppStateInner::new(db.clone(), db))
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn seed(db: &Database) {
    for (sender, receiver, body) in [
        ("alice", "bob", "hi"),
        ("bob", "alice", "hey"),
        ("alice", "carol", "not for bob"),
        ("alice", "bob", "how are you?"),
    ] {
        db.append(NewMessage {
            sender: sender.into(),
            receiver: receiver.into(),
            body: body.into(),
        })
        .unwrap();
    }
}

#[tokio::test]
async fn root_is_plain_text_greeting() {
    let app = app_with(Arc::new(Database::open_in_memory().unwrap()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Welcome to Parley");
}

#[tokio::test]
async fn messages_returns_conversation_in_order() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    seed(&db);
    let app = app_with(db);

    let (status, json) = get(app.clone(), "/messages?sender=alice&receiver=bob").await;
    assert_eq!(status, StatusCode::OK);

    let bodies: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["hi", "hey", "how are you?"]);
    assert!(json[0]["createdAt"].is_string());
    assert!(json[0]["id"].is_string());

    let (_, reversed) = get(app, "/messages?sender=bob&receiver=alice").await;
    assert_eq!(json, reversed);
}

#[tokio::test]
async fn messages_requires_both_participants() {
    let app = app_with(Arc::new(Database::open_in_memory().unwrap()));

    let (status, json) = get(app.clone(), "/messages?sender=alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Error fetching messages");
    assert_eq!(json["error"], "receiver is required");

    let (status, _) = get(app, "/messages?sender=&receiver=bob").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn messages_storage_failure_is_500() {
    let store = Arc::new(OfflineStore);
    let app = routes(AppStateInner::new(store.clone(), store));

    let (status, json) = get(app, "/messages?sender=alice&receiver=bob").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Error fetching messages");
    assert_eq!(json["error"], "unable to open database file");
}

#[tokio::test]
async fn users_excludes_current_user() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    for name in ["alice", "bob", "carol"] {
        db.create_user(&Uuid::new_v4().to_string(), name, "opaque").unwrap();
    }
    let app = app_with(db);

    let (status, json) = get(app.clone(), "/users?currentUser=bob").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "carol"]);
    assert!(json[0].get("password").is_none());

    let (_, everyone) = get(app, "/users").await;
    assert_eq!(everyone.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn users_storage_failure_is_500() {
    let store = Arc::new(OfflineStore);
    let app = routes(AppStateInner::new(store.clone(), store));

    let (status, json) = get(app, "/users?currentUser=alice").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Error fetching users");
    assert_eq!(json["error"], "unable to open database file");
}
