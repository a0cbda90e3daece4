//! Main module for the Inquira CLI application.
//!
//! This module provides the main function: it initialises logging, loads the
//! application config, parses the command line and runs the chosen command.
//!
//! # Examples
//!
//! Serving the chat panel for an editor front end:
//!
//! ```sh
//! inquira panel --file analysis.ipynb
//! ```
//!
//! Configuring and asking from the terminal:
//!
//! ```sh
//! inquira settings --api-key "$GEMINI_API_KEY" --data-path ./sales.csv --context "Retail sales"
//! inquira ask "Total amount per region, as a bar chart" --file analysis.py
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

use clap::Parser;
use inquira::{
    api::OpenAiCompletionClient,
    commands::{Cli, Commands},
    config::{self, InquiraConfig},
    config_dir,
    data_schema::SchemaCache,
    editor::FileEditor,
    history::ChatHistory,
    orchestrator::{Orchestrator, QuestionOutcome},
    panel::Panel,
    pretty,
    settings::{Settings, SettingsStore, SettingsUpdate},
    template::{self, Templates},
};
use once_cell::sync::OnceCell;
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    process,
};
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

static TRACING: OnceCell<()> = OnceCell::new();

type CliOrchestrator = Orchestrator<OpenAiCompletionClient, FileEditor>;

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Load the config and execute the parsed command.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    debug!("Loading config from: {}", config_path.display());
    let config = config::load_config_or_default(&config_path)?;
    debug!("Config loaded: {:?}", config);

    match cli.command {
        Commands::Panel { file } => {
            let mut panel = Panel::new(build_orchestrator(&config, file.as_deref())?);
            panel
                .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
        Commands::Ask { question, file } => {
            let mut orchestrator = build_orchestrator(&config, file.as_deref())?;
            let settings = orchestrator.settings();
            match orchestrator.handle_question(&settings, &question).await {
                Ok(QuestionOutcome::Answered { code, explanation }) => {
                    pretty::print_answer(&code, &explanation)?;
                }
                Ok(QuestionOutcome::Declined { message }) => {
                    eprintln!("{message}");
                    process::exit(2);
                }
                Err(_) => process::exit(1),
            }
        }
        Commands::Settings {
            api_key,
            data_path,
            context,
            model,
        } => {
            let update = SettingsUpdate {
                api_key: api_key.unwrap_or_default(),
                data_path: data_path
                    .map(|path| absolute(&path).to_string_lossy().into_owned())
                    .unwrap_or_default(),
                context: context.unwrap_or_default(),
                model: model.unwrap_or_default(),
            };
            let mut orchestrator = build_orchestrator(&config, None)?;
            let settings = if update == SettingsUpdate::default() {
                orchestrator.settings()
            } else {
                orchestrator.update_settings(&update).await
            };
            print_settings(&settings, orchestrator.settings_store().path())?;
        }
        Commands::GenerateSchema { model } => {
            let mut orchestrator = build_orchestrator(&config, None)?;
            let settings = orchestrator.settings();
            match orchestrator.generate_schema(&settings, model.as_deref()).await {
                Ok(_) => print_schema(&settings)?,
                Err(_) => process::exit(1),
            }
        }
        Commands::ViewSchema => {
            let orchestrator = build_orchestrator(&config, None)?;
            let settings = orchestrator.settings();
            let schema_path = orchestrator.schema_location(&settings)?;
            println!("{}", schema_path.display());
            print_schema(&settings)?;
        }
        Commands::History { clear, last } => {
            let Some(db_url) = &config.history_db_url else {
                eprintln!(
                    "Chat history is disabled. Set history_db_url in {}",
                    config_path.display()
                );
                return Ok(());
            };
            let mut history = ChatHistory::open(db_url)?;
            if clear {
                let removed = history.clear()?;
                println!("Removed {removed} messages");
            } else {
                let messages = match last {
                    Some(count) => history.recent_messages(count, 0)?,
                    None => history.all_messages()?,
                };
                pretty::render_messages(&messages, &mut std::io::stdout())?;
            }
        }
        Commands::Init => {
            debug!("Initializing configuration");
            init(&config_path)?;
        }
    }

    Ok(())
}

/// Wire the orchestrator to the real completion client and a file-backed
/// editor whose active document is `file`.
fn build_orchestrator(
    config: &InquiraConfig,
    file: Option<&Path>,
) -> Result<CliOrchestrator, Box<dyn Error>> {
    let templates = Templates::load()?;
    let completion =
        OpenAiCompletionClient::new(config, templates).map_err(|err| err as Box<dyn Error>)?;
    let editor = match file {
        Some(path) => FileEditor::with_active(path)?,
        None => FileEditor::new(),
    };
    let store = SettingsStore::new(config.resolve_settings_path()?);

    let orchestrator = Orchestrator::new(config.clone(), store, completion, editor);
    let Some(db_url) = &config.history_db_url else {
        return Ok(orchestrator);
    };
    match ChatHistory::open(db_url) {
        Ok(history) => Ok(orchestrator.with_history(history)),
        Err(err) => {
            error!("Chat history unavailable: {}", err);
            Ok(orchestrator)
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Print the settings record with the API key masked.
fn print_settings(settings: &Settings, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut shown = settings.clone();
    if shown.has_api_key() {
        let count = shown.api_key.chars().count();
        let tail: String = shown.api_key.chars().skip(count.saturating_sub(4)).collect();
        shown.api_key = format!("…{tail}");
    }
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

fn print_schema(settings: &Settings) -> Result<(), Box<dyn Error>> {
    match SchemaCache::new().load(Path::new(&settings.data_path)) {
        Some(schema) => pretty::render_schema(&schema, &mut std::io::stdout()),
        None => Err("Schema not found. Please regenerate schema.".into()),
    }
}

/// Initializes the application's configuration and templates.
///
/// Writes the default config to `config_path` and the built-in prompt
/// templates to `<config_dir>/templates`, both as YAML.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let templates_dir = config_dir()?.join("templates");
    info!("Creating template directory: {}", templates_dir.display());
    template::write_default_templates(&templates_dir)?;

    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir)?;
    }
    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&InquiraConfig::default())?;
    fs::write(config_path, config_yaml)?;

    println!("Wrote {}", config_path.display());
    println!("Wrote templates to {}", templates_dir.display());
    Ok(())
}
