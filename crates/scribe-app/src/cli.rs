//! CLI argument definitions for the Scribe client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use scribe_core::types::ContentKind;

/// Scribe - talk to your OmniScribe knowledge base from the terminal.
#[derive(Parser, Debug)]
#[command(name = "scribe", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the knowledge service.
    #[arg(long = "backend-url", global = true)]
    pub backend_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether the backend is reachable.
    Health,
    /// Ask a single question and print the answer with its sources.
    Ask {
        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Interactive chat. `:feedback <text>` corrects the last answer,
    /// `:log` prints the transcript, `:quit` exits.
    Chat,
    /// Upload files one after another and print their outcomes.
    Ingest {
        /// Treat every file as this kind instead of inferring it.
        #[arg(short = 'k', long = "kind", value_enum)]
        kind: Option<KindArg>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask the backend to index its knowledge folder.
    Scan,
    /// Record a voice note from the microphone and upload it.
    Record {
        /// Stop after this many seconds instead of waiting for Enter.
        #[arg(short = 's', long = "seconds")]
        seconds: Option<u64>,
        /// File name for the upload (default: recording_<unix-ms>.wav).
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        /// Throw the recording away instead of uploading it.
        #[arg(long = "discard")]
        discard: bool,
    },
}

/// Content kind accepted by `--kind`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Audio,
    Image,
    Text,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Audio => ContentKind::Audio,
            KindArg::Image => ContentKind::Image,
            KindArg::Text => ContentKind::Text,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SCRIBE_CONFIG env var > platform default
    /// (~/.omniscribe/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SCRIBE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --backend-url flag > SCRIBE_BACKEND_URL env var > config file value.
    pub fn resolve_backend_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.backend_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("SCRIBE_BACKEND_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }
        config_url.to_string()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// One line typed into the interactive chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Empty,
    Quit,
    Log,
    /// `:feedback <correction>`; the correction may be empty.
    Feedback(&'a str),
    Message(&'a str),
}

impl<'a> ChatInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => ChatInput::Empty,
            ":quit" | ":q" => ChatInput::Quit,
            ":log" => ChatInput::Log,
            _ => match line.strip_prefix(":feedback") {
                Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                    ChatInput::Feedback(rest.trim())
                }
                _ => ChatInput::Message(line),
            },
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".omniscribe").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".omniscribe").join("config.toml");
    }
    PathBuf::from("config.toml")
}
