//! In-memory stand-ins for the completion service and the editor host.

use std::{
    cell::RefCell,
    error::Error,
    path::{Path, PathBuf},
};

use crate::{
    BoxError,
    api::{CodeAnswer, CodeRequest, CompletionService, SchemaRequest},
    data_schema::ColumnDescription,
    editor::{ActiveDocument, EditorHost, TextDocument},
};

/// Replies with a canned answer; with no answer every code request fails, and
/// with no columns every schema request fails.
#[derive(Default)]
pub(crate) struct FakeCompletion {
    pub answer: Option<CodeAnswer>,
    pub columns: Vec<ColumnDescription>,
    pub code_requests: RefCell<Vec<CodeRequest>>,
    pub schema_requests: RefCell<Vec<SchemaRequest>>,
}

impl FakeCompletion {
    pub fn answering(is_safe: bool, is_relevant: bool) -> Self {
        Self {
            answer: Some(CodeAnswer {
                is_safe,
                is_relevant,
                code: "df.groupby('region').amount.sum()".to_string(),
                explanation: "Sums **amount** per region.".to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn describing(columns: &[(&str, &str)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, description)| ColumnDescription::new(*name, *description))
                .collect(),
            ..Self::default()
        }
    }
}

impl CompletionService for FakeCompletion {
    async fn generate_code(&self, request: &CodeRequest) -> Result<CodeAnswer, BoxError> {
        self.code_requests.borrow_mut().push(request.clone());
        self.answer.clone().ok_or_else(|| "connection refused".into())
    }

    async fn generate_schema(
        &self,
        request: &SchemaRequest,
    ) -> Result<Vec<ColumnDescription>, BoxError> {
        self.schema_requests.borrow_mut().push(request.clone());
        if self.columns.is_empty() {
            return Err("quota exceeded".into());
        }
        Ok(self.columns.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeDocument {
    pub text: String,
    pub appends: usize,
    pub cursor: Option<(usize, usize)>,
}

impl TextDocument for FakeDocument {
    fn text(&self) -> Result<String, Box<dyn Error>> {
        Ok(self.text.clone())
    }

    fn line_count(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.text.split('\n').count())
    }

    fn append_at_end(&mut self, text: &str) -> Result<(), Box<dyn Error>> {
        self.appends += 1;
        self.text.push_str(text);
        Ok(())
    }

    fn set_cursor(&mut self, line: usize, column: usize) {
        self.cursor = Some((line, column));
    }
}

/// Records every notification; the active document, if any, is plain code.
#[derive(Default)]
pub(crate) struct FakeEditor {
    pub document: Option<FakeDocument>,
    pub picked: Option<PathBuf>,
    pub errors: Vec<String>,
    pub infos: Vec<String>,
    pub opened: Vec<PathBuf>,
}

impl FakeEditor {
    pub fn with_code(text: &str) -> Self {
        Self {
            document: Some(FakeDocument {
                text: text.to_string(),
                ..FakeDocument::default()
            }),
            ..Self::default()
        }
    }

    pub fn appends(&self) -> usize {
        self.document.as_ref().map_or(0, |document| document.appends)
    }
}

impl EditorHost for FakeEditor {
    fn active_document(&mut self) -> Option<ActiveDocument<'_>> {
        self.document
            .as_mut()
            .map(|document| ActiveDocument::Code(document))
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn show_info(&mut self, message: &str) {
        self.infos.push(message.to_string());
    }

    fn open_document(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        if !path.exists() {
            return Err(format!("{} does not exist", path.display()).into());
        }
        self.opened.push(path.to_path_buf());
        Ok(())
    }

    fn pick_data_file(&mut self) -> Option<PathBuf> {
        self.picked.clone()
    }
}
