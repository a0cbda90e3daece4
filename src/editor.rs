//! # Editor integration
//!
//! Everything Inquira needs from the host editor, plus the code injector that
//! writes generated code into the active document.
//!
//! The active document is one of three kinds, each carrying the capability that
//! applies to it:
//!
//! - [`ActiveDocument::Code`]: a plain source file; code is appended at the end.
//! - [`ActiveDocument::Notebook`]: code goes into a new cell after the last one.
//! - [`ActiveDocument::Unsupported`]: nothing is written, the user is told why.
//!
//! [`FileEditor`] is the host used by the command-line front end: it works on
//! files on disk, treating `.py` files as code and `.ipynb` files as notebooks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub const NO_ACTIVE_EDITOR: &str = "No active editor found";
pub const UNSUPPORTED_FILE_TYPE: &str =
    "Unsupported file type. Please open a Python file or Jupyter notebook.";

/// A plain text document.
pub trait TextDocument {
    fn text(&self) -> Result<String, Box<dyn Error>>;

    /// Number of lines, counting an empty document as one line.
    fn line_count(&self) -> Result<usize, Box<dyn Error>>;

    fn append_at_end(&mut self, text: &str) -> Result<(), Box<dyn Error>>;

    fn set_cursor(&mut self, line: usize, column: usize);
}

/// A notebook made of cells.
pub trait NotebookDocument {
    fn cell_count(&self) -> Result<usize, Box<dyn Error>>;

    fn insert_code_cell(&mut self, index: usize, source: &str) -> Result<(), Box<dyn Error>>;

    fn focus_cell(&mut self, index: usize) -> Result<(), Box<dyn Error>>;
}

/// The document currently open in the editor.
pub enum ActiveDocument<'a> {
    Code(&'a mut dyn TextDocument),
    Notebook(&'a mut dyn NotebookDocument),
    Unsupported { kind: String },
}

/// The host editor, as seen by the orchestrator.
pub trait EditorHost {
    fn active_document(&mut self) -> Option<ActiveDocument<'_>>;

    /// User-visible error notification.
    fn show_error(&mut self, message: &str);

    /// User-visible informational notification.
    fn show_info(&mut self, message: &str);

    /// Open `path` for the user to look at.
    fn open_document(&mut self, path: &Path) -> Result<(), Box<dyn Error>>;

    /// Let the user pick a data file. Hosts without a picker return `None`.
    fn pick_data_file(&mut self) -> Option<PathBuf> {
        None
    }

    /// Text of the active document, only when it is plain code.
    fn current_code(&mut self) -> Option<String> {
        match self.active_document() {
            Some(ActiveDocument::Code(document)) => match document.text() {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!("Could not read the active document: {}", err);
                    None
                }
            },
            _ => None,
        }
    }
}

/// Insert `code` into the active document.
///
/// Not idempotent: every call appends. Unsupported or missing documents are
/// reported through the host and leave everything untouched.
pub fn insert_code<E: EditorHost + ?Sized>(host: &mut E, code: &str) -> Result<(), Box<dyn Error>> {
    let problem = match host.active_document() {
        None => Some(NO_ACTIVE_EDITOR),
        Some(ActiveDocument::Code(document)) => {
            append_to_document(document, code)?;
            None
        }
        Some(ActiveDocument::Notebook(notebook)) => {
            append_cell(notebook, code)?;
            None
        }
        Some(ActiveDocument::Unsupported { kind }) => {
            debug!("Not inserting code into a {} document", kind);
            Some(UNSUPPORTED_FILE_TYPE)
        }
    };

    if let Some(message) = problem {
        host.show_error(message);
    }
    Ok(())
}

fn append_to_document(document: &mut dyn TextDocument, code: &str) -> Result<(), Box<dyn Error>> {
    let last_line = document.line_count()?.saturating_sub(1);
    document.append_at_end(&format!("\n\n{code}"))?;
    document.set_cursor(last_line + 2, 0);
    Ok(())
}

fn append_cell(notebook: &mut dyn NotebookDocument, code: &str) -> Result<(), Box<dyn Error>> {
    let index = notebook.cell_count()?;
    notebook.insert_code_cell(index, code)?;
    notebook.focus_cell(index)
}

/// A source file on disk.
///
/// Nothing is cached: every read goes to the file, and code is appended in
/// place, so edits saved by the user in the meantime are kept.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    cursor: (usize, usize),
}

impl SourceFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        fs::read_to_string(&path)?;
        Ok(Self {
            path,
            cursor: (0, 0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(line, column)`, both zero-based.
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }
}

impl TextDocument for SourceFile {
    fn text(&self) -> Result<String, Box<dyn Error>> {
        Ok(fs::read_to_string(&self.path)?)
    }

    fn line_count(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.text()?.split('\n').count())
    }

    fn append_at_end(&mut self, text: &str) -> Result<(), Box<dyn Error>> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        info!("Appended {} bytes to {}", text.len(), self.path.display());
        Ok(())
    }

    fn set_cursor(&mut self, line: usize, column: usize) {
        self.cursor = (line, column);
    }
}

/// The parts of an `.ipynb` file Inquira touches; everything else is carried
/// through untouched.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct NotebookJson {
    cells: Vec<Value>,
    #[serde(default)]
    nbformat: u32,
    #[serde(default)]
    nbformat_minor: u32,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl NotebookJson {
    /// Cell ids became mandatory in nbformat 4.5.
    fn wants_cell_ids(&self) -> bool {
        self.nbformat > 4 || (self.nbformat == 4 && self.nbformat_minor >= 5)
    }
}

/// A Jupyter notebook on disk.
///
/// The notebook is re-read before every change, so cells the user saved in
/// the meantime are kept.
#[derive(Debug, Clone)]
pub struct NotebookFile {
    path: PathBuf,
    focused_cell: Option<usize>,
}

impl NotebookFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        read_notebook(&path)?;
        Ok(Self {
            path,
            focused_cell: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn focused_cell(&self) -> Option<usize> {
        self.focused_cell
    }

    /// Source text of the cell at `index`.
    pub fn cell_source(&self, index: usize) -> Result<Option<String>, Box<dyn Error>> {
        let notebook = read_notebook(&self.path)?;
        let Some(source) = notebook.cells.get(index).and_then(|cell| cell.get("source")) else {
            return Ok(None);
        };
        Ok(match source {
            Value::String(text) => Some(text.clone()),
            Value::Array(lines) => Some(lines.iter().filter_map(Value::as_str).collect()),
            _ => None,
        })
    }

    fn new_cell_id(&self, index: usize, source: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.path.to_string_lossy().as_bytes());
        hasher.update(&index.to_le_bytes());
        hasher.update(source.as_bytes());
        hasher.update(&chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.finalize().to_hex()[..16].to_string()
    }
}

impl NotebookDocument for NotebookFile {
    fn cell_count(&self) -> Result<usize, Box<dyn Error>> {
        Ok(read_notebook(&self.path)?.cells.len())
    }

    fn insert_code_cell(&mut self, index: usize, source: &str) -> Result<(), Box<dyn Error>> {
        let mut notebook = read_notebook(&self.path)?;
        if index > notebook.cells.len() {
            return Err(format!("Cell index {index} is out of range").into());
        }

        let lines: Vec<&str> = source.split_inclusive('\n').collect();
        let mut cell = json!({
            "cell_type": "code",
            "execution_count": null,
            "metadata": {},
            "outputs": [],
            "source": lines,
        });
        if notebook.wants_cell_ids() {
            cell["id"] = Value::String(self.new_cell_id(index, source));
        }

        notebook.cells.insert(index, cell);
        replace_contents(&self.path, serde_json::to_string_pretty(&notebook)?.as_bytes())?;
        info!("Inserted cell {} into {}", index, self.path.display());
        Ok(())
    }

    fn focus_cell(&mut self, index: usize) -> Result<(), Box<dyn Error>> {
        if index >= self.cell_count()? {
            return Err(format!("Cell index {index} is out of range").into());
        }
        self.focused_cell = Some(index);
        Ok(())
    }
}

fn read_notebook(path: &Path) -> Result<NotebookJson, Box<dyn Error>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Swap in new contents for an existing document through a temp file next to
/// it. Symlinks are followed and the document keeps its permissions.
fn replace_contents(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    let target = fs::canonicalize(path)?;
    let permissions = fs::metadata(&target)?.permissions();
    let dir = target.parent().ok_or("Document has no parent directory")?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(&target)?;
    Ok(())
}

#[derive(Debug)]
enum OpenFile {
    Source(SourceFile),
    Notebook(NotebookFile),
    Other { path: PathBuf },
}

/// File-backed editor host for the command line.
///
/// Notifications go to stderr so they never mix with the panel protocol on
/// stdout.
#[derive(Debug, Default)]
pub struct FileEditor {
    active: Option<OpenFile>,
}

impl FileEditor {
    /// A host with no document open.
    pub fn new() -> Self {
        Self { active: None }
    }

    /// A host with `path` as the active document, its kind chosen by extension.
    pub fn with_active(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let active = match extension.as_str() {
            "py" => OpenFile::Source(SourceFile::open(&path)?),
            "ipynb" => OpenFile::Notebook(NotebookFile::open(&path)?),
            _ => OpenFile::Other { path },
        };
        Ok(Self {
            active: Some(active),
        })
    }

    pub fn source_file(&self) -> Option<&SourceFile> {
        match &self.active {
            Some(OpenFile::Source(file)) => Some(file),
            _ => None,
        }
    }

    pub fn notebook_file(&self) -> Option<&NotebookFile> {
        match &self.active {
            Some(OpenFile::Notebook(file)) => Some(file),
            _ => None,
        }
    }
}

impl EditorHost for FileEditor {
    fn active_document(&mut self) -> Option<ActiveDocument<'_>> {
        match self.active.as_mut()? {
            OpenFile::Source(file) => Some(ActiveDocument::Code(file)),
            OpenFile::Notebook(file) => Some(ActiveDocument::Notebook(file)),
            OpenFile::Other { path } => Some(ActiveDocument::Unsupported {
                kind: path
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }

    fn show_error(&mut self, message: &str) {
        warn!("{}", message);
        eprintln!("error: {message}");
    }

    fn show_info(&mut self, message: &str) {
        info!("{}", message);
        eprintln!("{message}");
    }

    fn open_document(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        let content = fs::read_to_string(path)?;
        eprintln!("── {} ──\n{}", path.display(), content);
        Ok(())
    }
}
