//! # Chat history
//!
//! Optional durable copy of the transcript, kept in a SQLite file via Diesel.
//! Enabled by `history_db_url` in the application config; without it the
//! transcript lives only as long as the panel.
//!
//! The in-memory [`Transcript`](crate::transcript::Transcript) stays the source
//! of truth for paging. This store only seeds it at start-up and receives a
//! copy of every appended message. Rows are ordered by id, which follows
//! insertion order.

use diesel::{Connection, SqliteConnection, prelude::*};
use std::error::Error;
use tracing::{debug, info};

use crate::{models::StoredMessage, schema::messages, transcript::ChatMessage};

const CREATE_MESSAGES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    code TEXT,
    explanation TEXT
)";

pub fn establish_connection(db_url: &str) -> Result<SqliteConnection, Box<dyn Error>> {
    SqliteConnection::establish(db_url)
        .map_err(|err| format!("Error connecting to {db_url}: {err}").into())
}

/// SQLite-backed message log.
pub struct ChatHistory {
    sqlite_connection: SqliteConnection,
}

impl ChatHistory {
    /// Open (and if needed create) the history database at `db_url`.
    pub fn open(db_url: &str) -> Result<Self, Box<dyn Error>> {
        let mut sqlite_connection = establish_connection(db_url)?;
        diesel::sql_query(CREATE_MESSAGES_TABLE).execute(&mut sqlite_connection)?;
        info!("Chat history at {}", db_url);
        Ok(Self { sqlite_connection })
    }

    /// Insert a message and return its row id.
    pub fn save_message(&mut self, message: &ChatMessage) -> Result<i64, Box<dyn Error>> {
        let row = StoredMessage::from(message);
        let stored: StoredMessage = self.sqlite_connection.transaction(|conn| {
            diesel::insert_into(messages::table)
                .values(&row)
                .returning(StoredMessage::as_returning())
                .get_result(conn)
        })?;

        let id = stored.id.map(i64::from).ok_or("Inserted message has no id")?;
        debug!("Saved {} message {}", stored.role, id);
        Ok(id)
    }

    /// Up to `limit` messages, skipping the `offset` newest, oldest-first.
    pub fn recent_messages(
        &mut self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChatMessage>, Box<dyn Error>> {
        let rows: Vec<StoredMessage> = messages::table
            .order(messages::id.desc())
            .limit(i64::try_from(limit)?)
            .offset(i64::try_from(offset)?)
            .select(StoredMessage::as_select())
            .load(&mut self.sqlite_connection)?;

        rows.into_iter().rev().map(ChatMessage::try_from).collect()
    }

    /// Every stored message, oldest-first.
    pub fn all_messages(&mut self) -> Result<Vec<ChatMessage>, Box<dyn Error>> {
        let rows: Vec<StoredMessage> = messages::table
            .order(messages::id.asc())
            .select(StoredMessage::as_select())
            .load(&mut self.sqlite_connection)?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    pub fn message_count(&mut self) -> Result<i64, Box<dyn Error>> {
        Ok(messages::table
            .count()
            .get_result(&mut self.sqlite_connection)?)
    }

    /// Delete every message; returns how many were removed.
    pub fn clear(&mut self) -> Result<usize, Box<dyn Error>> {
        let removed = diesel::delete(messages::table).execute(&mut self.sqlite_connection)?;
        info!("Cleared {} messages from chat history", removed);
        Ok(removed)
    }
}
