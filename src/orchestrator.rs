//! # Orchestrator
//!
//! The flow between the panel, the completion service and the editor:
//!
//! ```text
//! question ─▶ preconditions ─▶ schema ─▶ generate_code ─▶ verdict ─┬─▶ insert code
//!                                                                 └─▶ decline
//!                          every step that succeeds lands in the transcript
//! ```
//!
//! Settings are passed into each call rather than cached, so a question always
//! sees what the settings form last saved. The orchestrator owns the transcript
//! (and its optional durable copy), the editor host and the completion client.
//!
//! Every failure is reported to the user through [`EditorHost::show_error`]
//! before it is returned, so callers only decide what to send back to the
//! panel.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    BoxError,
    api::{CodeRequest, CompletionService, SchemaRequest},
    config::InquiraConfig,
    data_schema::{ColumnDescription, SchemaCache},
    editor::{EditorHost, insert_code},
    headers::{FirstLineHeaders, HeaderReader},
    history::ChatHistory,
    settings::{Settings, SettingsStore, SettingsUpdate},
    transcript::{ChatMessage, Page, Transcript},
};

pub const EMPTY_QUESTION: &str = "Please enter a question";
pub const MISSING_API_KEY: &str = "Please set your Google Gemini API key in settings";
pub const MISSING_DATA_PATH: &str = "Please set your data file path in settings";
pub const SCHEMA_NOT_GENERATED: &str =
    "Schema not generated. Please save settings first to generate schema.";
pub const SCHEMA_NOT_FOUND: &str = "Schema not found. Please regenerate schema.";
pub const MISSING_SCHEMA_INPUTS: &str = "Please set data path and API key in settings first";
pub const MISSING_DATA_PATH_FOR_SCHEMA: &str = "Please set data path in settings first";
pub const NOT_SAFE: &str = "Question is not safe to answer";
pub const NOT_RELEVANT: &str = "Question is not relevant to data analysis";
pub const SCHEMA_GENERATED: &str = "Schema generated successfully";

/// Why an orchestration call did not complete.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A required setting or file is missing; nothing was changed.
    #[error("{0}")]
    Precondition(&'static str),

    #[error("{0}")]
    Completion(#[source] BoxError),

    #[error("Failed to insert code: {0}")]
    Editor(#[source] Box<dyn std::error::Error>),

    #[error("Could not read column headers: {0}")]
    Headers(#[source] Box<dyn std::error::Error>),

    #[error("No column headers found in {}", .0.display())]
    NoHeaders(PathBuf),

    #[error("{0}")]
    Storage(#[source] Box<dyn std::error::Error>),
}

impl OrchestratorError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, OrchestratorError::Precondition(_))
    }
}

/// Result of a question that reached the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// Code was generated and inserted into the active document.
    Answered { code: String, explanation: String },
    /// The model judged the question unsafe or off-topic.
    Declined { message: &'static str },
}

/// Turn the two verdicts into a decline message, if any. Safety wins.
pub fn decline_reason(is_safe: bool, is_relevant: bool) -> Option<&'static str> {
    if !is_safe {
        Some(NOT_SAFE)
    } else if !is_relevant {
        Some(NOT_RELEVANT)
    } else {
        None
    }
}

pub struct Orchestrator<C, E> {
    config: InquiraConfig,
    settings_store: SettingsStore,
    schema_cache: SchemaCache,
    header_reader: Box<dyn HeaderReader>,
    completion: C,
    editor: E,
    transcript: Transcript,
    history: Option<ChatHistory>,
}

impl<C: CompletionService, E: EditorHost> Orchestrator<C, E> {
    pub fn new(
        config: InquiraConfig,
        settings_store: SettingsStore,
        completion: C,
        editor: E,
    ) -> Self {
        Self {
            config,
            settings_store,
            schema_cache: SchemaCache::new(),
            header_reader: Box::new(FirstLineHeaders),
            completion,
            editor,
            transcript: Transcript::new(),
            history: None,
        }
    }

    pub fn with_header_reader(mut self, header_reader: Box<dyn HeaderReader>) -> Self {
        self.header_reader = header_reader;
        self
    }

    /// Keep a durable copy of the transcript in `history`, seeding the
    /// transcript from what it already holds.
    pub fn with_history(mut self, mut history: ChatHistory) -> Self {
        match history.all_messages() {
            Ok(messages) => {
                info!("Restored {} messages from chat history", messages.len());
                self.transcript = Transcript::from_history(messages);
            }
            Err(err) => error!("Error reading chat history: {}", err),
        }
        self.history = Some(history);
        self
    }

    /// Current settings record, read fresh from disk.
    pub fn settings(&self) -> Settings {
        self.settings_store.load()
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings_store
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn completion(&self) -> &C {
        &self.completion
    }

    /// Answer `question` about the data file named in `settings`.
    pub async fn handle_question(
        &mut self,
        settings: &Settings,
        question: &str,
    ) -> Result<QuestionOutcome, OrchestratorError> {
        let result = self.answer_question(settings, question).await;
        if let Err(err) = &result {
            if err.is_precondition() {
                self.editor.show_error(&err.to_string());
            } else {
                error!("Error answering question: {}", err);
                self.editor.show_error(&format!("Error: {err}"));
            }
        }
        result
    }

    async fn answer_question(
        &mut self,
        settings: &Settings,
        question: &str,
    ) -> Result<QuestionOutcome, OrchestratorError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(OrchestratorError::Precondition(EMPTY_QUESTION));
        }
        let schema = self.question_schema(settings)?;

        let current_code = self.editor.current_code();
        self.record(ChatMessage::user(question));

        let request = CodeRequest {
            api_key: settings.api_key.clone(),
            model: settings.model_or(&self.config.default_model).to_string(),
            question: question.to_string(),
            schema,
            current_code,
            data_path: settings.data_path.clone(),
        };
        debug!("Asking {} about {}", request.model, request.data_path);

        let answer = self
            .completion
            .generate_code(&request)
            .await
            .map_err(OrchestratorError::Completion)?;

        if let Some(message) = decline_reason(answer.is_safe, answer.is_relevant) {
            info!("Declined question: {}", message);
            self.record(ChatMessage::notice(message));
            return Ok(QuestionOutcome::Declined { message });
        }

        insert_code(&mut self.editor, &answer.code).map_err(OrchestratorError::Editor)?;
        self.record(ChatMessage::answer(
            answer.code.clone(),
            answer.explanation.clone(),
        ));
        Ok(QuestionOutcome::Answered {
            code: answer.code,
            explanation: answer.explanation,
        })
    }

    /// The schema for the configured data file, after every question
    /// precondition has been checked in order.
    fn question_schema(
        &self,
        settings: &Settings,
    ) -> Result<Vec<ColumnDescription>, OrchestratorError> {
        if !settings.has_api_key() {
            return Err(OrchestratorError::Precondition(MISSING_API_KEY));
        }
        if !settings.has_data_path() {
            return Err(OrchestratorError::Precondition(MISSING_DATA_PATH));
        }
        if !settings.has_schema {
            return Err(OrchestratorError::Precondition(SCHEMA_NOT_GENERATED));
        }
        self.schema_cache
            .load(Path::new(&settings.data_path))
            .ok_or(OrchestratorError::Precondition(SCHEMA_NOT_FOUND))
    }

    /// Describe the columns of the configured data file and cache the result.
    ///
    /// The model is `model_override`, else the settings model, else the
    /// configured default. Returns the schema file location.
    pub async fn generate_schema(
        &mut self,
        settings: &Settings,
        model_override: Option<&str>,
    ) -> Result<PathBuf, OrchestratorError> {
        match self.describe_columns(settings, model_override).await {
            Ok(schema_path) => {
                self.editor.show_info(SCHEMA_GENERATED);
                Ok(schema_path)
            }
            Err(err) => {
                if err.is_precondition() {
                    self.editor.show_error(&err.to_string());
                } else {
                    error!("Error generating schema: {}", err);
                    self.editor
                        .show_error(&format!("Failed to generate schema: {err}"));
                }
                Err(err)
            }
        }
    }

    async fn describe_columns(
        &mut self,
        settings: &Settings,
        model_override: Option<&str>,
    ) -> Result<PathBuf, OrchestratorError> {
        if !settings.has_data_path() || !settings.has_api_key() {
            return Err(OrchestratorError::Precondition(MISSING_SCHEMA_INPUTS));
        }

        let data_path = Path::new(&settings.data_path);
        let columns = self
            .header_reader
            .read_header_fields(data_path)
            .map_err(OrchestratorError::Headers)?;
        if columns.is_empty() {
            return Err(OrchestratorError::NoHeaders(data_path.to_path_buf()));
        }

        let model = match model_override {
            Some(model) if !model.trim().is_empty() => model.to_string(),
            _ => settings.model_or(&self.config.default_model).to_string(),
        };
        let request = SchemaRequest {
            api_key: settings.api_key.clone(),
            model,
            columns,
            context: settings.context.clone(),
        };
        debug!(
            "Describing {} columns of {} with {}",
            request.columns.len(),
            data_path.display(),
            request.model
        );

        let schema = self
            .completion
            .generate_schema(&request)
            .await
            .map_err(OrchestratorError::Completion)?;
        let schema_path = self
            .schema_cache
            .save(data_path, &schema)
            .map_err(OrchestratorError::Storage)?;
        self.settings_store
            .mark_schema_generated()
            .map_err(OrchestratorError::Storage)?;
        Ok(schema_path)
    }

    /// Merge `update` into the stored settings, regenerating the schema when
    /// it names both a key and a data file. Schema failures are reported but
    /// do not fail the update.
    pub async fn update_settings(&mut self, update: &SettingsUpdate) -> Settings {
        let settings = self.settings_store.update(update);
        if !update.triggers_schema_generation() {
            return settings;
        }

        let model_override = Some(update.model.as_str()).filter(|model| !model.is_empty());
        match self.generate_schema(&settings, model_override).await {
            Ok(_) => self.settings_store.load(),
            Err(_) => settings,
        }
    }

    /// Location of the schema file for the configured data file.
    pub fn schema_location(&self, settings: &Settings) -> Result<PathBuf, OrchestratorError> {
        if !settings.has_data_path() {
            return Err(OrchestratorError::Precondition(
                MISSING_DATA_PATH_FOR_SCHEMA,
            ));
        }
        Ok(self.schema_cache.path_for(Path::new(&settings.data_path)))
    }

    /// Show the cached schema file in the editor.
    pub fn open_schema(&mut self, settings: &Settings) -> Result<PathBuf, OrchestratorError> {
        let schema_path = match self.schema_location(settings) {
            Ok(path) => path,
            Err(err) => {
                self.editor.show_error(&err.to_string());
                return Err(err);
            }
        };

        if let Err(err) = self.editor.open_document(&schema_path) {
            self.editor
                .show_error(&format!("Failed to open schema file: {err}"));
            return Err(OrchestratorError::Storage(err));
        }
        Ok(schema_path)
    }

    pub fn pick_data_file(&mut self) -> Option<PathBuf> {
        self.editor.pick_data_file()
    }

    /// The page ending `offset` messages back from the newest.
    pub fn load_messages(&mut self, limit: usize, offset: usize) -> Page {
        self.transcript.load_messages(limit, offset)
    }

    /// The first page, shown when the panel opens.
    pub fn initial_page(&mut self) -> Page {
        self.transcript.load_messages(self.config.page_size, 0)
    }

    /// Serve a scroll-to-top trigger with the configured page size.
    pub fn load_more(&mut self) -> Option<Page> {
        self.transcript.load_more(self.config.page_size)
    }

    fn record(&mut self, message: ChatMessage) {
        let stored = self.transcript.append(message);
        if let Some(history) = self.history.as_mut() {
            if let Err(err) = history.save_message(stored) {
                error!("Error saving message to chat history: {}", err);
            }
        }
    }
}
