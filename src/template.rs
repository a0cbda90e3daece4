//! # Prompt templates
//!
//! The two prompts Inquira sends to the model, each paired with the JSON schema
//! the response must match:
//!
//! - `code_generation`: question → `{ is_safe, is_relevant, code, explanation }`
//! - `schema_generation`: column names → `{ columns: [{ name, description }] }`
//!
//! Both are compiled in. Either can be overridden by dropping a YAML file into
//! the per-user configuration directory:
//!
//! ```text
//! <config_dir>/templates/<name>.yaml
//! ```
//!
//! ## YAML shape
//!
//! ```yaml
//! system_instruction: "You are a careful data analyst..."   # optional
//! prompt: "{SYSTEM_INSTRUCTION}\n\nQuestion: {QUESTION}\n..."
//! response_format:
//!   name: "code_output"
//!   strict: true
//!   schema: { ... }   # JSON schema of the reply
//! ```
//!
//! ## Placeholders
//! Placeholders are written `{NAME}` (upper-case letters and underscores) and are
//! replaced in a single pass, so text substituted into a prompt (a question, the
//! current file) is never itself expanded. Placeholders without a value are left
//! untouched. `system_instruction` is filled first and then substituted for
//! `{SYSTEM_INSTRUCTION}`.

use async_openai::types::chat::ResponseFormatJsonSchema;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, error::Error, fs, path::Path};

pub const CODE_GENERATION: &str = "code_generation";
pub const SCHEMA_GENERATION: &str = "schema_generation";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Z][A-Z_]*)\}").unwrap());

const CODE_SYSTEM_INSTRUCTION: &str = r#"You are an expert data analysis assistant. For every question:

1. Decide whether the question is safe to answer (is_safe).
2. Decide whether the question is about analysing the data described below (is_relevant).
3. Write Python code that answers it (code).
4. Explain, step by step and in markdown, what the code does (explanation).

Columns of the data file:
{SCHEMA}

The data file is located at:
{DATA_PATH}

The file may be very large. Load only the rows and columns the question needs, using DuckDB
to query the file directly. Simple questions can be answered entirely in DuckDB SQL. For anything
more involved, load the needed subset with DuckDB and continue in pandas:
- filter rows with `.query`
- derive columns with `.assign`
- prefer chained operations

Every result must be a pandas DataFrame, a plotly figure, or a scalar.

Reply with a JSON object with exactly these keys:
- is_safe: boolean
- is_relevant: boolean
- code: string (Python code)
- explanation: string (markdown)"#;

const CODE_PROMPT: &str = r#"{SYSTEM_INSTRUCTION}

Question: {QUESTION}

{CURRENT_CODE_CONTEXT}

Schema: {SCHEMA}"#;

const SCHEMA_PROMPT: &str = r#"You are given the column names of a data file and some context about the domain it comes from.

Context: {CONTEXT}

Columns: {COLUMNS}

Describe what each column represents in that domain. Reply with a JSON object whose "columns" key
holds an array with one object per column, each with a "name" and a "description"."#;

/// A prompt plus the structured-output contract of its reply.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromptTemplate {
    /// Filled separately and substituted for `{SYSTEM_INSTRUCTION}`.
    #[serde(default)]
    pub system_instruction: Option<String>,

    /// The prompt text with `{NAME}` placeholders.
    pub prompt: String,

    /// JSON schema the model's reply must follow.
    pub response_format: ResponseFormatJsonSchema,
}

impl PromptTemplate {
    /// Fill the template with `values`.
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut values = values.clone();
        if let Some(system_instruction) = &self.system_instruction {
            values.insert("SYSTEM_INSTRUCTION", fill(system_instruction, &values));
        }
        fill(&self.prompt, &values)
    }

    /// Built-in template for turning a question into code.
    pub fn code_generation() -> Self {
        Self {
            system_instruction: Some(CODE_SYSTEM_INSTRUCTION.to_string()),
            prompt: CODE_PROMPT.to_string(),
            response_format: ResponseFormatJsonSchema {
                description: Some("Generated analysis code with safety and relevance verdicts".into()),
                name: "code_output".to_string(),
                schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "is_safe": { "type": "boolean" },
                        "is_relevant": { "type": "boolean" },
                        "code": { "type": "string" },
                        "explanation": { "type": "string" }
                    },
                    "required": ["is_safe", "is_relevant", "code", "explanation"],
                    "additionalProperties": false
                })),
                strict: Some(true),
            },
        }
    }

    /// Built-in template for describing the columns of a data file.
    pub fn schema_generation() -> Self {
        Self {
            system_instruction: None,
            prompt: SCHEMA_PROMPT.to_string(),
            response_format: ResponseFormatJsonSchema {
                description: Some("One description per column of the data file".into()),
                name: "column_schema".to_string(),
                schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "columns": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "description": { "type": "string" }
                                },
                                "required": ["name", "description"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["columns"],
                    "additionalProperties": false
                })),
                strict: Some(true),
            },
        }
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            CODE_GENERATION => Some(Self::code_generation()),
            SCHEMA_GENERATION => Some(Self::schema_generation()),
            _ => None,
        }
    }
}

/// Replace every `{NAME}` in `template` that has an entry in `values`.
pub fn fill(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// The pair of templates a completion client works with.
#[derive(Debug, Clone)]
pub struct Templates {
    pub code_generation: PromptTemplate,
    pub schema_generation: PromptTemplate,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            code_generation: PromptTemplate::code_generation(),
            schema_generation: PromptTemplate::schema_generation(),
        }
    }
}

impl Templates {
    /// Built-ins, overridden by any YAML files under `<config_dir>/templates`.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let dir = crate::config_dir()?.join("templates");
        Self::load_from(&dir)
    }

    pub fn load_from(dir: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            code_generation: resolve_template(dir, CODE_GENERATION)?,
            schema_generation: resolve_template(dir, SCHEMA_GENERATION)?,
        })
    }
}

/// Load `<dir>/<name>.yaml` if present, else the built-in template.
///
/// An override file that exists but does not parse is an error rather than a
/// silent fallback.
pub fn resolve_template(dir: &Path, name: &str) -> Result<PromptTemplate, Box<dyn Error>> {
    let path = dir.join(format!("{name}.yaml"));
    if path.exists() {
        tracing::info!("Loading template: {}", path.display());
        let content = fs::read_to_string(&path)?;
        let template: PromptTemplate = serde_yaml::from_str(&content)?;
        return Ok(template);
    }

    PromptTemplate::builtin(name).ok_or_else(|| format!("Unknown template: {name}").into())
}

/// Write the built-in templates as YAML into `dir`, for users to edit.
pub fn write_default_templates(dir: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    for name in [CODE_GENERATION, SCHEMA_GENERATION] {
        if let Some(template) = PromptTemplate::builtin(name) {
            let path = dir.join(format!("{name}.yaml"));
            tracing::info!("Creating template file: {}", path.display());
            fs::write(path, serde_yaml::to_string(&template)?)?;
        }
    }
    Ok(())
}
