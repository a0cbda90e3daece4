//! # Chat transcript
//!
//! The append-only log of user/assistant messages for one panel session, and
//! the cursor that pages it back to the UI when the user scrolls up.
//!
//! ## Paging model
//!
//! Pages are addressed from the newest message backwards: `offset` counts
//! messages already shown at the bottom of the list, `limit` how many older
//! ones to fetch. Each page comes back oldest-first so the UI can prepend it.
//!
//! ```text
//!   oldest                                   newest
//!   [m0] [m1] [m2] [m3] [m4] [m5] [m6] [m7] [m8] [m9]
//!                  └──── limit=4 ────┘└─ offset=3 ─┘
//!                  page = [m3, m4, m5, m6]
//! ```
//!
//! The cursor tracks `total` (messages in the log), `delivered` (messages the
//! UI already has) and a single-flight flag so overlapping scroll events
//! collapse into one fetch. `delivered` never decreases and never exceeds
//! `total`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One entry of the transcript. Immutable once appended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ChatMessage {
    pub fn user(question: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            role: Role::User,
            content: question.into(),
            code: None,
            explanation: None,
        }
    }

    /// A successful answer: the explanation is the display text.
    pub fn answer(code: impl Into<String>, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        Self {
            id: None,
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: explanation.clone(),
            code: Some(code.into()),
            explanation: Some(explanation),
        }
    }

    /// An assistant reply that carries no code (declined questions).
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: message.into(),
            code: None,
            explanation: None,
        }
    }
}

/// One page of messages for the UI.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub messages: Vec<ChatMessage>,
    pub has_more: bool,
}

/// The window of `messages` ending `offset` from the newest and reaching
/// `limit` further back, oldest-first.
pub fn window(messages: &[ChatMessage], limit: usize, offset: usize) -> &[ChatMessage] {
    let end = messages.len().saturating_sub(offset);
    let start = end.saturating_sub(limit);
    &messages[start..end]
}

/// Delivery bookkeeping for backward scrolling.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageCursor {
    total: usize,
    delivered: usize,
    loading: bool,
}

impl PageCursor {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.delivered < self.total
    }

    /// Claim the single fetch slot. Returns `false` if a fetch is running or
    /// there is nothing left to fetch.
    pub fn begin_fetch(&mut self) -> bool {
        if self.loading || !self.has_more() {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn end_fetch(&mut self) {
        self.loading = false;
    }

    fn record_delivery(&mut self, upto: usize) {
        self.delivered = self.delivered.max(upto).min(self.total);
    }
}

/// Append-only message log with its paging cursor.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    cursor: PageCursor,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a transcript with history the UI has not seen yet.
    pub fn from_history(messages: Vec<ChatMessage>) -> Self {
        let total = messages.len();
        Self {
            messages,
            cursor: PageCursor {
                total,
                delivered: 0,
                loading: false,
            },
        }
    }

    /// Append a message that is shown to the UI as it happens, so it counts as
    /// delivered straight away.
    pub fn append(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        self.cursor.total += 1;
        self.cursor.delivered += 1;
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Return the page at (`limit`, `offset`) and advance `delivered`.
    pub fn load_messages(&mut self, limit: usize, offset: usize) -> Page {
        let messages = window(&self.messages, limit, offset).to_vec();
        self.cursor
            .record_delivery(offset.saturating_add(messages.len()));
        Page {
            messages,
            has_more: self.cursor.has_more(),
        }
    }

    /// Serve one backward-scroll trigger.
    ///
    /// Returns `None` when a fetch is already in flight or everything has been
    /// delivered.
    pub fn load_more(&mut self, page_size: usize) -> Option<Page> {
        if !self.cursor.begin_fetch() {
            return None;
        }
        let offset = self.cursor.delivered;
        let page = self.load_messages(page_size, offset);
        self.cursor.end_fetch();
        Some(page)
    }
}
