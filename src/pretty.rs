//! # Pretty printing
//!
//! Terminal rendering for what the CLI shows: answers (markdown explanation plus
//! syntax-highlighted Python), column schemas and the chat history.
//!
//! Markdown support is deliberately small:
//!
//! | Markdown | Terminal |
//! |----------|----------|
//! | `# Header` .. `### Header` | bold cyan |
//! | `**bold**` | bold |
//! | `*italic*` | italic |
//! | `` `code` `` | yellow |
//! | ` ```lang ` blocks | highlighted with Syntect (`base16-ocean.dark`) |
//!
//! Every renderer writes to any [`Write`], so output can be captured;
//! [`print_answer`] targets stdout.

use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    error::Error,
    io::{Write, stdout},
};
use syntect::{
    easy::HighlightLines,
    highlighting::{Style, Theme, ThemeSet},
    parsing::SyntaxSet,
    util::{LinesWithEndings, as_24_bit_terminal_escaped},
};

use crate::{
    data_schema::ColumnDescription,
    transcript::{ChatMessage, Role},
};

const THEME: &str = "base16-ocean.dark";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(\w+)?\n([\s\S]*?)```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^\*]+)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^\*]+)\*").unwrap());

fn theme() -> Result<&'static Theme, Box<dyn Error>> {
    THEMES
        .themes
        .get(THEME)
        .ok_or_else(|| format!("Missing syntax theme {THEME}").into())
}

/// Print a generated answer to stdout.
pub fn print_answer(code: &str, explanation: &str) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    render_answer(code, explanation, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Render markdown, highlighting fenced code blocks.
pub fn render_markdown<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    let mut last_end = 0;

    for cap in CODE_BLOCK.captures_iter(text) {
        let Some(block) = cap.get(0) else { continue };

        if block.start() > last_end {
            render_text(&text[last_end..block.start()], out)?;
        }

        let language = cap.get(1).map(|m| m.as_str()).unwrap_or("text");
        let code = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        render_code_block(code, language, out)?;

        last_end = block.end();
    }

    if last_end < text.len() {
        render_text(&text[last_end..], out)?;
    }
    Ok(())
}

/// Render an answer: the explanation, then the inserted code.
pub fn render_answer<W: Write>(
    code: &str,
    explanation: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    render_markdown(explanation, out)?;
    writeln!(out)?;
    render_code_block(code, "python", out)
}

/// Render a schema as `name  description` rows.
pub fn render_schema<W: Write>(
    schema: &[ColumnDescription],
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let width = schema.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in schema {
        out.execute(SetAttribute(Attribute::Bold))?;
        write!(out, "{:width$}", column.name)?;
        out.execute(SetAttribute(Attribute::Reset))?;
        writeln!(out, "  {}", column.description)?;
    }
    Ok(())
}

/// Render transcript messages, oldest first.
pub fn render_messages<W: Write>(
    messages: &[ChatMessage],
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    for message in messages {
        let (label, color) = match message.role {
            Role::User => ("you", Color::Green),
            Role::Assistant => ("inquira", Color::Magenta),
        };
        out.execute(SetForegroundColor(color))?;
        out.execute(SetAttribute(Attribute::Bold))?;
        write!(out, "{label}")?;
        out.execute(SetAttribute(Attribute::Reset))?;
        out.execute(SetForegroundColor(Color::DarkGrey))?;
        writeln!(out, " {}", message.timestamp.format("%Y-%m-%d %H:%M"))?;
        out.execute(SetForegroundColor(Color::Reset))?;

        match &message.code {
            Some(code) => render_answer(code, &message.content, out)?,
            None => render_markdown(&message.content, out)?,
        }
        writeln!(out)?;
    }
    Ok(())
}

fn render_text<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    for line in text.lines() {
        let header = ["### ", "## ", "# "]
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix));

        if let Some(header) = header {
            out.execute(SetForegroundColor(Color::Cyan))?;
            out.execute(SetAttribute(Attribute::Bold))?;
            writeln!(out, "{header}")?;
            out.execute(SetAttribute(Attribute::Reset))?;
            out.execute(SetForegroundColor(Color::Reset))?;
        } else if line.is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "{}", inline_markdown(line))?;
        }
    }
    Ok(())
}

/// Apply inline code, bold and italic styling to one line.
fn inline_markdown(line: &str) -> String {
    let line = INLINE_CODE.replace_all(line, "\x1b[33m$1\x1b[0m");
    let line = BOLD.replace_all(&line, "\x1b[1m$1\x1b[0m");
    ITALIC.replace_all(&line, "\x1b[3m$1\x1b[0m").into_owned()
}

fn render_code_block<W: Write>(
    code: &str,
    language: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    out.execute(SetForegroundColor(Color::DarkGrey))?;
    out.execute(SetAttribute(Attribute::Italic))?;
    writeln!(out, "[{language}]")?;
    out.execute(SetAttribute(Attribute::Reset))?;
    out.execute(SetForegroundColor(Color::Reset))?;

    let syntax = SYNTAXES
        .find_syntax_by_token(language)
        .or_else(|| SYNTAXES.find_syntax_by_extension(language))
        .or_else(|| match language.to_lowercase().as_str() {
            "py" | "python3" => SYNTAXES.find_syntax_by_extension("py"),
            "sql" | "duckdb" => SYNTAXES.find_syntax_by_extension("sql"),
            "sh" | "bash" | "shell" => SYNTAXES.find_syntax_by_extension("sh"),
            _ => None,
        })
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());

    let mut highlighter = HighlightLines::new(syntax, theme()?);
    for line in LinesWithEndings::from(code) {
        let ranges: Vec<(Style, &str)> = highlighter.highlight_line(line, &SYNTAXES)?;
        write!(out, "{}", as_24_bit_terminal_escaped(&ranges[..], false))?;
        out.execute(SetAttribute(Attribute::Reset))?;
    }
    if !code.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
