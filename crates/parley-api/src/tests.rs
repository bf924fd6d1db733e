//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use parley_core::{
  event::EventRecord,
  message::{ChatId, Message, NewMessage},
  session::SessionConfig,
  store::{ChangeHandler, FeedQuery, MessagingStore, Subscription},
  user::{Role, User},
};
use parley_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_stream::StreamExt;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{AppState, api_router};

// ─── Fixtures ─────────────────────────────────────────────────────────────────

fn user(email: &str, dept: &str, role: Role) -> User {
  User {
    user_id:    Uuid::new_v4(),
    email:      email.into(),
    department: dept.into(),
    role,
  }
}

/// alice and bob share Ops; carol sits alone in Finance; root is an admin.
async fn seeded() -> Arc<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  for u in [
    user("alice@x", "Ops", Role::User),
    user("bob@x", "Ops", Role::User),
    user("carol@x", "Finance", Role::User),
    user("root@x", "Ops", Role::Admin),
  ] {
    store.upsert_user(&u).await.unwrap();
  }
  Arc::new(store)
}

fn app<S: MessagingStore + 'static>(store: Arc<S>) -> Router {
  api_router(AppState::new(store, SessionConfig::default()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
  let resp = app
    .oneshot(Request::get(uri).body(Body::empty()).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_message(
  app: Router,
  from: &str,
  to: &str,
  body: &str,
) -> (StatusCode, Value) {
  let payload = json!({
    "sender_email": from,
    "recipient_email": to,
    "body": body,
  });
  let resp = app
    .oneshot(
      Request::post("/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap(),
    )
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

fn emails(contacts: &Value) -> Vec<String> {
  contacts["users"]
    .as_array()
    .unwrap()
    .iter()
    .map(|c| c["user"]["email"].as_str().unwrap().to_owned())
    .collect()
}

// ─── Failing store ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("backend unavailable")]
struct Unavailable;

/// Every read fails.
struct DownStore;

impl MessagingStore for DownStore {
  type Error = Unavailable;

  async fn query_events(&self) -> Result<Vec<EventRecord>, Unavailable> {
    Err(Unavailable)
  }

  async fn query_users(&self) -> Result<Vec<User>, Unavailable> {
    Err(Unavailable)
  }

  async fn query_messages_by_chat(
    &self,
    _chat_id: &ChatId,
  ) -> Result<Vec<Message>, Unavailable> {
    Err(Unavailable)
  }

  async fn query_messages_by_participant(
    &self,
    _email: &str,
  ) -> Result<Vec<Message>, Unavailable> {
    Err(Unavailable)
  }

  fn watch(
    &self,
    _query: FeedQuery,
    _on_change: ChangeHandler,
  ) -> Result<Subscription, Unavailable> {
    Err(Unavailable)
  }

  async fn append_message(&self, _input: NewMessage) -> Result<Message, Unavailable> {
    Err(Unavailable)
  }
}

// ─── Contacts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn contacts_lists_department_peers_without_admins() {
  let (status, body) = get(app(seeded().await), "/contacts?email=alice@x").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(emails(&body), ["bob@x"]);
  assert_eq!(body["users"][0]["reasons"], json!(["DEPARTMENT_PEER"]));
}

#[tokio::test]
async fn contacts_of_unknown_user_is_empty_not_error() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let (status, body) = get(app(store), "/contacts?email=nobody@x").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "users": [] }));
}

#[tokio::test]
async fn contacts_read_failure_is_an_error_not_an_empty_list() {
  let (status, body) = get(app(Arc::new(DownStore)), "/contacts?email=alice@x").await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body["error"].as_str().unwrap().contains("read"));
}

#[tokio::test]
async fn contacts_requires_email() {
  let resp = app(seeded().await)
    .oneshot(Request::get("/contacts").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ─── Messages ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_to_contact_then_read_back() {
  let store = seeded().await;

  let (status, sent) =
    post_message(app(store.clone()), "alice@x", "bob@x", "hi bob").await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(sent["chat_id"], "alice@x_bob@x");
  assert_eq!(sent["participants"], json!(["alice@x", "bob@x"]));

  post_message(app(store.clone()), "bob@x", "alice@x", "hi alice").await;

  let (status, convo) =
    get(app(store.clone()), "/chats/alice@x_bob@x/messages").await;
  assert_eq!(status, StatusCode::OK);
  let bodies: Vec<_> = convo
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["body"].as_str().unwrap())
    .collect();
  assert_eq!(bodies, ["hi bob", "hi alice"]);

  let (status, chats) = get(app(store), "/users/bob@x/chats").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(chats.as_array().unwrap().len(), 1);
  assert_eq!(chats[0]["body"], "hi alice");
}

#[tokio::test]
async fn send_to_non_contact_is_forbidden() {
  let store = seeded().await;
  let (status, body) =
    post_message(app(store.clone()), "alice@x", "carol@x", "hello?").await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].as_str().unwrap().contains("carol@x"));

  let (_, chats) = get(app(store), "/users/alice@x/chats").await;
  assert_eq!(chats, json!([]));
}

#[tokio::test]
async fn send_to_self_is_rejected() {
  let (status, _) =
    post_message(app(seeded().await), "alice@x", "alice@x", "note").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conversation_read_failure_is_500() {
  let (status, body) =
    get(app(Arc::new(DownStore)), "/chats/alice@x_bob@x/messages").await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["error"], "backend unavailable");
}

// ─── Streams ──────────────────────────────────────────────────────────────────

async fn next_frame(body: &mut axum::body::BodyDataStream) -> String {
  let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
    .await
    .expect("frame in time")
    .expect("stream open")
    .unwrap();
  String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn conversation_stream_pushes_new_messages_and_closes_feed_on_drop() {
  let store = seeded().await;

  let resp = app(store.clone())
    .oneshot(
      Request::get("/users/alice@x/chats/bob@x/stream")
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
  let mut body = resp.into_body().into_data_stream();

  let first = next_frame(&mut body).await;
  assert!(first.starts_with("event: messages"), "{first}");
  assert!(first.contains("data: []"), "{first}");

  post_message(app(store.clone()), "bob@x", "alice@x", "ping").await;
  let mut pushed = false;
  for _ in 0..5 {
    if next_frame(&mut body).await.contains("ping") {
      pushed = true;
      break;
    }
  }
  assert!(pushed, "new message reached the stream");

  assert_eq!(store.live_feeds(), 1);
  drop(body);
  for _ in 0..200 {
    if store.live_feeds() == 0 {
      break;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  assert_eq!(store.live_feeds(), 0);
}

#[tokio::test]
async fn chat_list_stream_emits_previews() {
  let store = seeded().await;
  post_message(app(store.clone()), "alice@x", "bob@x", "one").await;
  post_message(app(store.clone()), "bob@x", "alice@x", "two").await;

  let resp = app(store)
    .oneshot(
      Request::get("/users/alice@x/chats/stream")
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  let mut body = resp.into_body().into_data_stream();

  let first = next_frame(&mut body).await;
  assert!(first.starts_with("event: chats"), "{first}");
  assert!(first.contains("\"two\""), "{first}");
  assert!(!first.contains("\"one\""), "{first}");
}

#[tokio::test]
async fn stream_with_self_is_rejected() {
  let resp = app(seeded().await)
    .oneshot(
      Request::get("/users/alice@x/chats/alice@x/stream")
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
