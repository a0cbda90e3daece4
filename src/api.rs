//! # API Module
//!
//! This module talks to the completion service: an OpenAI-compatible
//! chat-completions endpoint (by default Google's Gemini compatibility layer).
//!
//! Each operation is a single request with a JSON-schema response format; the
//! reply text must decode into the expected shape or the call fails. There is
//! no retry and no partial-result handling.
//!
//! - [`CompletionService::generate_code`] turns a question into
//!   `{ is_safe, is_relevant, code, explanation }`.
//! - [`CompletionService::generate_schema`] turns column names into
//!   `[{ name, description }]`.
//!
//! # Example
//!
//! ```no_run
//! use inquira::api::{CodeRequest, CompletionService, OpenAiCompletionClient};
//! use inquira::config::InquiraConfig;
//! use inquira::template::Templates;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let client = OpenAiCompletionClient::new(&InquiraConfig::default(), Templates::default())?;
//! let answer = client
//!     .generate_code(&CodeRequest {
//!         api_key: "…".into(),
//!         model: "gemini-2.5-flash".into(),
//!         question: "Total sales per region".into(),
//!         schema: vec![],
//!         current_code: None,
//!         data_path: "/data/sales.csv".into(),
//!     })
//!     .await?;
//! println!("{}", answer.code);
//! # Ok(()) }
//! ```
use crate::{
    BoxError,
    config::InquiraConfig,
    data_schema::ColumnDescription,
    template::{PromptTemplate, Templates},
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::HashMap, time::Duration};

use tracing::{debug, error};

/// Context used when the settings carry none.
pub const DEFAULT_SCHEMA_CONTEXT: &str = "General data analysis";

/// Everything the code-generation prompt needs.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    pub api_key: String,
    pub model: String,
    pub question: String,
    pub schema: Vec<ColumnDescription>,
    /// Text of the active code document, if any.
    pub current_code: Option<String>,
    pub data_path: String,
}

/// Everything the schema-generation prompt needs.
#[derive(Debug, Clone)]
pub struct SchemaRequest {
    pub api_key: String,
    pub model: String,
    pub columns: Vec<String>,
    pub context: String,
}

/// The model's structured answer to a question.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CodeAnswer {
    pub is_safe: bool,
    pub is_relevant: bool,
    pub code: String,
    pub explanation: String,
}

/// Wire shape of a schema reply. Strict structured outputs want an object at
/// the top level, but a bare array is accepted too.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SchemaReply {
    Wrapped { columns: Vec<ColumnDescription> },
    Bare(Vec<ColumnDescription>),
}

impl SchemaReply {
    fn into_columns(self) -> Vec<ColumnDescription> {
        match self {
            SchemaReply::Wrapped { columns } => columns,
            SchemaReply::Bare(columns) => columns,
        }
    }
}

/// The remote text-generation model, as the orchestrator sees it.
#[allow(async_fn_in_trait)]
pub trait CompletionService {
    async fn generate_code(&self, request: &CodeRequest) -> Result<CodeAnswer, BoxError>;

    async fn generate_schema(
        &self,
        request: &SchemaRequest,
    ) -> Result<Vec<ColumnDescription>, BoxError>;
}

/// Build the code-generation prompt.
pub fn code_prompt(template: &PromptTemplate, request: &CodeRequest) -> Result<String, BoxError> {
    let current_code_context = match &request.current_code {
        Some(text) if !text.is_empty() => format!("\nExisting code in the file:\n{text}"),
        _ => String::new(),
    };

    let values: HashMap<&str, String> = HashMap::from([
        ("QUESTION", request.question.clone()),
        ("CURRENT_CODE_CONTEXT", current_code_context),
        ("SCHEMA", serde_json::to_string_pretty(&request.schema)?),
        ("DATA_PATH", request.data_path.clone()),
    ]);
    Ok(template.render(&values))
}

/// Build the schema-generation prompt.
pub fn schema_prompt(template: &PromptTemplate, request: &SchemaRequest) -> String {
    let context = if request.context.trim().is_empty() {
        DEFAULT_SCHEMA_CONTEXT.to_string()
    } else {
        request.context.clone()
    };

    let values: HashMap<&str, String> = HashMap::from([
        ("CONTEXT", context),
        ("COLUMNS", request.columns.join(", ")),
    ]);
    template.render(&values)
}

/// Decode a model reply into `T`.
pub fn decode_reply<T: DeserializeOwned>(text: &str) -> Result<T, BoxError> {
    serde_json::from_str(text).map_err(|err| {
        error!("Reply did not match the requested shape: {}", err);
        format!("Invalid JSON from model: {err}").into()
    })
}

/// [`CompletionService`] backed by `async-openai`.
///
/// The API key is supplied per request (it lives in the user's settings and can
/// change between calls), so a client is created for each round trip from the
/// shared HTTP client.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    api_base: String,
    http: reqwest::Client,
    templates: Templates,
}

impl OpenAiCompletionClient {
    pub fn new(config: &InquiraConfig, templates: Templates) -> Result<Self, BoxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            api_base: config.api_base.clone(),
            http,
            templates,
        })
    }

    /// Creates a new OpenAI API client for `api_key`.
    fn create_client(&self, api_key: &str) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.to_string())
            .with_api_base(self.api_base.clone());
        debug!("Client created for {}", self.api_base);
        Client::with_config(openai_config).with_http_client(self.http.clone())
    }

    /// Send one prompt and return the reply text.
    async fn fetch_response(
        &self,
        api_key: &str,
        model: &str,
        prompt: String,
        template: &PromptTemplate,
    ) -> Result<String, BoxError> {
        let client = self.create_client(api_key);

        let message = ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt),
            name: None,
        });

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![message])
            .response_format(ResponseFormat::JsonSchema {
                json_schema: template.response_format.clone(),
            })
            .build()?;

        debug!("Sending request: {:?}", request);

        let response = client.chat().create(request).await?;

        let mut response_string = String::new();
        response.choices.iter().for_each(|chat_choice| {
            if let Some(message_text) = &chat_choice.message.content {
                response_string.push_str(message_text);
            }
        });

        if response_string.trim().is_empty() {
            return Err("No content in model response".into());
        }

        debug!("Received response: {}", response_string);
        Ok(response_string)
    }

    async fn fetch_structured<T: DeserializeOwned>(
        &self,
        api_key: &str,
        model: &str,
        prompt: String,
        template: &PromptTemplate,
    ) -> Result<T, BoxError> {
        let text = self.fetch_response(api_key, model, prompt, template).await?;
        decode_reply(&text)
    }
}

impl CompletionService for OpenAiCompletionClient {
    async fn generate_code(&self, request: &CodeRequest) -> Result<CodeAnswer, BoxError> {
        let template = &self.templates.code_generation;
        let prompt = code_prompt(template, request)?;
        self.fetch_structured(&request.api_key, &request.model, prompt, template)
            .await
    }

    async fn generate_schema(
        &self,
        request: &SchemaRequest,
    ) -> Result<Vec<ColumnDescription>, BoxError> {
        let template = &self.templates.schema_generation;
        let prompt = schema_prompt(template, request);
        let reply: SchemaReply = self
            .fetch_structured(&request.api_key, &request.model, prompt, template)
            .await?;
        Ok(reply.into_columns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn setup() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    fn mock_config(api_base: String) -> InquiraConfig {
        InquiraConfig {
            api_base,
            request_timeout_secs: 5,
            ..InquiraConfig::default()
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "mock-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn code_request() -> CodeRequest {
        CodeRequest {
            api_key: "test-key".to_string(),
            model: "mock-model".to_string(),
            question: "What is the average price?".to_string(),
            schema: vec![ColumnDescription::new("price", "Unit price in USD")],
            current_code: Some("import pandas as pd".to_string()),
            data_path: "/data/products.csv".to_string(),
        }
    }

    #[test]
    fn test_code_prompt_includes_inputs() {
        let prompt = code_prompt(&PromptTemplate::code_generation(), &code_request()).unwrap();
        assert!(prompt.contains("What is the average price?"));
        assert!(prompt.contains("Existing code in the file:\nimport pandas as pd"));
        assert!(prompt.contains("Unit price in USD"));
        assert!(prompt.contains("/data/products.csv"));
    }

    #[test]
    fn test_code_prompt_without_current_code() {
        let mut request = code_request();
        request.current_code = None;
        let prompt = code_prompt(&PromptTemplate::code_generation(), &request).unwrap();
        assert!(!prompt.contains("Existing code in the file"));
    }

    #[test]
    fn test_schema_prompt_defaults_context() {
        let prompt = schema_prompt(
            &PromptTemplate::schema_generation(),
            &SchemaRequest {
                api_key: String::new(),
                model: String::new(),
                columns: vec!["region".to_string(), "amount".to_string()],
                context: "  ".to_string(),
            },
        );
        assert!(prompt.contains("Context: General data analysis"));
        assert!(prompt.contains("Columns: region, amount"));
    }

    #[test]
    fn test_decode_reply_rejects_wrong_shape() {
        let result: Result<CodeAnswer, _> = decode_reply(r#"{"is_safe": true}"#);
        assert!(result.is_err());
        let result: Result<CodeAnswer, _> = decode_reply("not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_reply_accepts_both_shapes() {
        let wrapped: SchemaReply =
            decode_reply(r#"{"columns":[{"name":"a","description":"A"}]}"#).unwrap();
        let bare: SchemaReply = decode_reply(r#"[{"name":"a","description":"A"}]"#).unwrap();
        assert_eq!(wrapped.into_columns(), bare.into_columns());
    }

    #[tokio::test]
    async fn test_generate_code_round_trip() {
        setup();
        let server = MockServer::start_async().await;
        let answer = json!({
            "is_safe": true,
            "is_relevant": true,
            "code": "import duckdb\nduckdb.sql('select avg(price) from products')",
            "explanation": "Averages the price column."
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .body_includes("json_schema")
                    .body_includes("What is the average price?");
                then.status(200)
                    .json_body(completion_body(&answer.to_string()));
            })
            .await;

        let client =
            OpenAiCompletionClient::new(&mock_config(server.base_url()), Templates::default())
                .unwrap();
        let result = client.generate_code(&code_request()).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_safe);
        assert!(result.is_relevant);
        assert!(result.code.starts_with("import duckdb"));
        assert_eq!(result.explanation, "Averages the price column.");
    }

    #[tokio::test]
    async fn test_generate_schema_round_trip() {
        setup();
        let server = MockServer::start_async().await;
        let reply = json!({
            "columns": [
                { "name": "region", "description": "Sales region" },
                { "name": "amount", "description": "Order value" }
            ]
        });
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .body_includes("region, amount");
                then.status(200).json_body(completion_body(&reply.to_string()));
            })
            .await;

        let client =
            OpenAiCompletionClient::new(&mock_config(server.base_url()), Templates::default())
                .unwrap();
        let columns = client
            .generate_schema(&SchemaRequest {
                api_key: "test-key".to_string(),
                model: "mock-model".to_string(),
                columns: vec!["region".to_string(), "amount".to_string()],
                context: "Retail".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            columns,
            vec![
                ColumnDescription::new("region", "Sales region"),
                ColumnDescription::new("amount", "Order value"),
            ]
        );
    }

    #[tokio::test]
    async fn test_undecodable_reply_is_an_error() {
        setup();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .json_body(completion_body("Sure! Here is your code: print(1)"));
            })
            .await;

        let client =
            OpenAiCompletionClient::new(&mock_config(server.base_url()), Templates::default())
                .unwrap();
        assert!(client.generate_code(&code_request()).await.is_err());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        setup();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).json_body(json!({
                    "error": {
                        "message": "API key not valid",
                        "type": "invalid_request_error",
                        "param": null,
                        "code": "invalid_api_key"
                    }
                }));
            })
            .await;

        let client =
            OpenAiCompletionClient::new(&mock_config(server.base_url()), Templates::default())
                .unwrap();
        assert!(client.generate_code(&code_request()).await.is_err());
    }
}
