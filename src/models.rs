//! # Database models
//!
//! Data structures that map to the chat-history SQLite schema via **Diesel**.
//!
//! - [`StoredMessage`]: one row per transcript entry (user question or
//!   assistant reply).
//!
//! ## Diesel expectations
//!
//! This module assumes the `messages` table from `crate::schema` exists;
//! [`crate::history::ChatHistory::open`] creates it on first use.
//!
//! Timestamps are stored as RFC 3339 text so the file stays readable with the
//! plain `sqlite3` shell.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::error::Error;

use crate::transcript::{ChatMessage, Role};

#[derive(Queryable, Insertable, Debug, Selectable, Clone, PartialEq)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StoredMessage {
    #[diesel(deserialize_as = i32)]
    pub id: Option<i32>,
    pub timestamp: String,
    pub role: String,
    pub content: String,
    pub code: Option<String>,
    pub explanation: Option<String>,
}

impl From<&ChatMessage> for StoredMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: None,
            timestamp: message.timestamp.to_rfc3339(),
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            code: message.code.clone(),
            explanation: message.explanation.clone(),
        }
    }
}

impl TryFrom<StoredMessage> for ChatMessage {
    type Error = Box<dyn Error>;

    fn try_from(row: StoredMessage) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| format!("Unknown role: {}", row.role))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)?.with_timezone(&Utc);

        Ok(ChatMessage {
            id: row.id.map(i64::from),
            timestamp,
            role,
            content: row.content,
            code: row.code,
            explanation: row.explanation,
        })
    }
}
