//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use inquira::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! if let Commands::Ask { question, .. } = cli.command {
//!     println!("asking {question}");
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Auto)]
pub struct Cli {
    /// Application config file (defaults to `<config_dir>/config.yaml`).
    #[arg(long, global = true, env = "INQUIRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None)]
pub enum Commands {
    /// Serve the chat panel as newline-delimited JSON over stdin/stdout.
    #[clap(name = "panel", alias = "p")]
    Panel {
        /// Document generated code is inserted into (`.py` or `.ipynb`).
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Ask one question about the configured data file.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question, in plain language.
        question: String,

        /// Document generated code is inserted into (`.py` or `.ipynb`).
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Show the settings, or update the fields that are given.
    ///
    /// Setting both an API key and a data path regenerates the schema.
    Settings {
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Free-text description of the data's domain.
        #[arg(long)]
        context: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },

    /// Describe the columns of the configured data file.
    #[clap(name = "generate-schema")]
    GenerateSchema {
        /// Model to use instead of the configured one.
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the cached schema of the configured data file.
    #[clap(name = "view-schema")]
    ViewSchema,

    /// Show the stored chat history.
    History {
        /// Delete every stored message instead.
        #[arg(long)]
        clear: bool,

        /// Only show the newest N messages.
        #[arg(long, value_name = "N", conflicts_with = "clear")]
        last: Option<usize>,
    },

    /// Write the default config file and prompt templates.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_file() {
        let cli = Cli::parse_from(["inquira", "ask", "total sales", "--file", "a.py"]);
        match cli.command {
            Commands::Ask { question, file } => {
                assert_eq!(question, "total sales");
                assert_eq!(file, Some(PathBuf::from("a.py")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_settings_update() {
        let cli = Cli::parse_from([
            "inquira",
            "settings",
            "--api-key",
            "k",
            "--data-path",
            "/data/sales.csv",
        ]);
        match cli.command {
            Commands::Settings {
                api_key,
                data_path,
                context,
                model,
            } => {
                assert_eq!(api_key.as_deref(), Some("k"));
                assert_eq!(data_path, Some(PathBuf::from("/data/sales.csv")));
                assert!(context.is_none());
                assert!(model.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_history_clear() {
        let cli = Cli::parse_from(["inquira", "history", "--clear"]);
        assert!(matches!(cli.command, Commands::History { clear: true, .. }));
    }

    #[test]
    fn test_parse_history_last() {
        let cli = Cli::parse_from(["inquira", "history", "--last", "6"]);
        assert!(matches!(
            cli.command,
            Commands::History {
                clear: false,
                last: Some(6)
            }
        ));
        assert!(Cli::try_parse_from(["inquira", "history", "--clear", "--last", "2"]).is_err());
    }
}
