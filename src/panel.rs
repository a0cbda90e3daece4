//! # Panel protocol
//!
//! The chat panel and the orchestrator talk in JSON messages tagged by a
//! `type` field. `inquira panel` carries them as newline-delimited JSON: one
//! inbound message per line on stdin, one outbound message per line on stdout.
//!
//! ```text
//! → {"type":"askQuestion","question":"Total sales per region?"}
//! ← {"type":"response","code":"…","explanation":"…"}
//! → {"type":"loadMoreMessages"}
//! ← {"type":"loadMessages","messages":[…],"hasMore":false}
//! ```
//!
//! Editor commands share the same input. `{"type":"openSettings"}` asks for
//! the settings form and is answered with `openSettings` on stdout.
//!
//! Lines are handled one at a time, in order, each to completion before the
//! next is read.

use serde::{Deserialize, Serialize};
use std::error::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    api::CompletionService,
    editor::EditorHost,
    orchestrator::{Orchestrator, QuestionOutcome},
    settings::{Settings, SettingsUpdate},
    transcript::Page,
};

/// Messages sent by the panel.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    AskQuestion {
        question: String,
    },
    LoadMoreMessages,
    UpdateSettings(SettingsUpdate),
    RequestSettings,
    GenerateSchema,
    OpenSchema,
    ViewSchema,
    OpenFileDialog,
    /// The editor's "open settings" command.
    OpenSettings,
    /// Diagnostics from the panel itself; only logged.
    Debug {
        #[serde(default)]
        message: String,
    },
}

/// Messages sent to the panel.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    LoadMessages(Page),
    LoadSettings { settings: Settings },
    SettingsUpdated,
    Response { code: String, explanation: String },
    Error { message: String },
    FileSelected { path: String },
    OpenSettings,
}

/// Routes panel messages to an [`Orchestrator`].
pub struct Panel<C, E> {
    orchestrator: Orchestrator<C, E>,
}

impl<C: CompletionService, E: EditorHost> Panel<C, E> {
    pub fn new(orchestrator: Orchestrator<C, E>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<C, E> {
        &self.orchestrator
    }

    /// What the panel gets when it is first shown.
    pub fn open(&mut self) -> Vec<Outbound> {
        vec![Outbound::LoadMessages(self.orchestrator.initial_page())]
    }

    /// Ask the panel to show its settings form.
    pub fn open_settings(&self) -> Outbound {
        Outbound::OpenSettings
    }

    pub async fn dispatch(&mut self, message: Inbound) -> Vec<Outbound> {
        debug!("Dispatching {:?}", message);
        match message {
            Inbound::AskQuestion { question } => {
                let settings = self.orchestrator.settings();
                match self.orchestrator.handle_question(&settings, &question).await {
                    Ok(QuestionOutcome::Answered { code, explanation }) => {
                        vec![Outbound::Response { code, explanation }]
                    }
                    Ok(QuestionOutcome::Declined { message }) => vec![Outbound::Error {
                        message: message.to_string(),
                    }],
                    Err(err) if err.is_precondition() => Vec::new(),
                    Err(err) => vec![Outbound::Error {
                        message: err.to_string(),
                    }],
                }
            }
            Inbound::LoadMoreMessages => self
                .orchestrator
                .load_more()
                .map(Outbound::LoadMessages)
                .into_iter()
                .collect(),
            Inbound::UpdateSettings(update) => {
                self.orchestrator.update_settings(&update).await;
                vec![Outbound::SettingsUpdated]
            }
            Inbound::RequestSettings => vec![Outbound::LoadSettings {
                settings: self.orchestrator.settings(),
            }],
            Inbound::GenerateSchema => {
                let settings = self.orchestrator.settings();
                let _ = self.orchestrator.generate_schema(&settings, None).await;
                Vec::new()
            }
            Inbound::OpenSchema | Inbound::ViewSchema => {
                let settings = self.orchestrator.settings();
                let _ = self.orchestrator.open_schema(&settings);
                Vec::new()
            }
            Inbound::OpenFileDialog => self
                .orchestrator
                .pick_data_file()
                .map(|path| Outbound::FileSelected {
                    path: path.to_string_lossy().into_owned(),
                })
                .into_iter()
                .collect(),
            Inbound::OpenSettings => vec![self.open_settings()],
            Inbound::Debug { message } => {
                debug!("Panel: {}", message);
                Vec::new()
            }
        }
    }

    /// Decode and dispatch one protocol line. Blank and malformed lines are
    /// skipped.
    pub async fn handle_line(&mut self, line: &str) -> Vec<Outbound> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Inbound>(line) {
            Ok(message) => self.dispatch(message).await,
            Err(err) => {
                warn!("Skipping malformed panel message {:?}: {}", line, err);
                Vec::new()
            }
        }
    }

    /// Serve the protocol until `reader` is exhausted.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Panel ready");
        write_messages(&mut writer, &self.open()).await?;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let replies = self.handle_line(&line).await;
            write_messages(&mut writer, &replies).await?;
        }

        info!("Panel input closed");
        Ok(())
    }
}

async fn write_messages<W: AsyncWrite + Unpin>(
    writer: &mut W,
    messages: &[Outbound],
) -> Result<(), Box<dyn Error>> {
    for message in messages {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}
