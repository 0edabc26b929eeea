//! REPL input parsing for the `elicit` binary.
//!
//! Slash commands drive navigation; anything else is an answer to the
//! selected topic.

use crate::session::Command;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// A session operation.
    Session(Command),
    /// Print overall and per-group progress.
    Progress,
    /// Print the topic list with status and accessibility.
    Topics,
    Help,
    Quit,
    /// Blank line.
    Empty,
    /// A slash command that was not recognised or lacked its argument.
    Unknown(String),
}

/// Parses REPL lines into [`CliCommand`]s.
pub struct CliParser;

impl CliParser {
    pub fn parse(line: &str) -> CliCommand {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return CliCommand::Empty;
        }
        if !trimmed.starts_with('/') {
            return CliCommand::Session(Command::Submit {
                text: trimmed.to_string(),
            });
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match (head.as_str(), arg) {
            ("/continue" | "/next" | "/advance", None) => CliCommand::Session(Command::Advance),
            ("/skip", None) => CliCommand::Session(Command::Skip),
            ("/begin" | "/start", None) => CliCommand::Session(Command::Begin),
            ("/select", Some(id)) => CliCommand::Session(Command::Select {
                topic_id: id.to_string(),
                review: false,
            }),
            ("/review", Some(id)) => CliCommand::Session(Command::Select {
                topic_id: id.to_string(),
                review: true,
            }),
            ("/toggle", Some(id)) => CliCommand::Session(Command::ToggleGroup {
                group_id: id.to_string(),
            }),
            ("/progress", None) => CliCommand::Progress,
            ("/topics", None) => CliCommand::Topics,
            ("/help" | "/?", None) => CliCommand::Help,
            ("/quit" | "/exit", None) => CliCommand::Quit,
            _ => CliCommand::Unknown(trimmed.to_string()),
        }
    }
}

pub const HELP: &str = "\
Type your answer and press Enter.

  /select <topic>   open a topic
  /review <topic>   read a completed topic
  /continue         finish the current topic
  /skip             skip the current topic
  /toggle <group>   expand or collapse a group
  /topics           list topics
  /progress         show progress
  /quit             leave";
