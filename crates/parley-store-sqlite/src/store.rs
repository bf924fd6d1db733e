//! [`SqliteStore`], the SQLite implementation of [`MessagingStore`].

use std::path::Path;

use chrono::{SubsecRound as _, Utc};
use parley_core::{
  event::EventRecord,
  message::{ChatId, Message, NewMessage},
  store::{ChangeHandler, FeedQuery, MessagingStore, Subscription},
  user::User,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  encode::{
    encode_dt, encode_role, encode_tagged, encode_uuid, RawEvent, RawMessage,
    RawUser,
  },
  feed::{self, CHANGE_CAPACITY},
  schema::SCHEMA,
  Error, Result,
};

const MESSAGE_COLUMNS: &str = "message_id, chat_id, participant_a, \
                               participant_b, body, sender_email, sent_at";

fn raw_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMessage> {
  Ok(RawMessage {
    message_id:    row.get(0)?,
    chat_id:       row.get(1)?,
    participant_a: row.get(2)?,
    participant_b: row.get(3)?,
    body:          row.get(4)?,
    sender_email:  row.get(5)?,
    sent_at:       row.get(6)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change broadcast are
/// reference-counted, and clones share both.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<Message>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
    let store = Self { conn, changes };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────
  //
  // Users and events belong to other parts of the application. These writes
  // exist so the server and the tests can populate a store.

  /// Insert a user, or update department and role of the user with the same
  /// email.
  pub async fn upsert_user(&self, user: &User) -> Result<()> {
    let id_str   = encode_uuid(user.user_id);
    let email    = user.email.clone();
    let dept     = user.department.clone();
    let role_str = encode_role(user.role).to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, department, role)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(email) DO UPDATE
             SET department = excluded.department, role = excluded.role",
          rusqlite::params![id_str, email, dept, role_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Persist a submitted event.
  pub async fn record_event(&self, event: &EventRecord) -> Result<()> {
    let id_str     = encode_uuid(event.event_id);
    let title      = event.title.clone();
    let author     = event.author_email.clone();
    let author_dep = event.author_department.clone();
    let tagged     = encode_tagged(&event.tagged)?;
    let at_str     = encode_dt(event.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (
             event_id, title, author_email, author_department, tagged, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, title, author, author_dep, tagged, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of live feeds currently attached to this store.
  pub fn live_feeds(&self) -> usize { self.changes.receiver_count() }

  async fn select_messages(
    &self,
    filter: &'static str,
    order: &'static str,
    arg: String,
  ) -> Result<Vec<Message>> {
    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {filter} ORDER BY {order}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![arg], raw_message)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}

// ─── MessagingStore impl ─────────────────────────────────────────────────────

impl MessagingStore for SqliteStore {
  type Error = Error;

  async fn query_events(&self) -> Result<Vec<EventRecord>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, title, author_email, author_department, tagged, created_at
           FROM events
           ORDER BY created_at ASC",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEvent {
              event_id:          row.get(0)?,
              title:             row.get(1)?,
              author_email:      row.get(2)?,
              author_department: row.get(3)?,
              tagged:            row.get(4)?,
              created_at:        row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn query_users(&self) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, email, department, role FROM users ORDER BY email",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawUser {
              user_id:    row.get(0)?,
              email:      row.get(1)?,
              department: row.get(2)?,
              role:       row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn query_messages_by_chat(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
    self
      .select_messages("chat_id = ?1", "sent_at ASC, seq ASC", chat_id.to_string())
      .await
  }

  async fn query_messages_by_participant(&self, email: &str) -> Result<Vec<Message>> {
    self
      .select_messages(
        "participant_a = ?1 OR participant_b = ?1",
        "sent_at DESC, seq DESC",
        email.to_owned(),
      )
      .await
  }

  fn watch(
    &self,
    query: FeedQuery,
    on_change: ChangeHandler,
  ) -> Result<Subscription> {
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|_| Error::NoRuntime)?;

    // Subscribe before spawning so appends racing the spawn are still seen.
    let changes = self.changes.subscribe();
    tracing::debug!(feed = %query, "attaching live feed");
    let task = runtime.spawn(feed::run(self.clone(), query, on_change, changes));
    Ok(Subscription::from_task(task.abort_handle()))
  }

  async fn append_message(&self, input: NewMessage) -> Result<Message> {
    // Stored timestamps keep microseconds; the returned copy must match.
    let message = input.into_message(Uuid::new_v4(), Utc::now().trunc_subsecs(6))?;

    let id_str             = encode_uuid(message.message_id);
    let chat_id            = message.chat_id.to_string();
    let [part_a, part_b]   = message.participants.clone();
    let body               = message.body.clone();
    let sender             = message.sender_email.clone();
    let sent_at_str        = encode_dt(message.sent_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (
             message_id, chat_id, participant_a, participant_b,
             body, sender_email, sent_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, chat_id, part_a, part_b, body, sender, sent_at_str],
        )?;
        Ok(())
      })
      .await?;

    // No receivers simply means no live feeds.
    let _ = self.changes.send(message.clone());
    Ok(message)
  }
}
