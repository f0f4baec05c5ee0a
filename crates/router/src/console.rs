//! Operator console commands.

use nami_core::error::IngestError;
use nami_core::source::{ConversationState, SourceKind};

pub const HELP: &str = "\
Commands:
  /state <idle|engaged|observing|busy>   switch conversation state
  /clear                                 drop everything waiting for admission
  /interval <secs>                       minimum gap between replies
  /enable <source>, /disable <source>    toggle an input source
  /status                                queue, state and counters
  /context                               current situation summary
  /help                                  this list
  exit | quit                            shut down
Anything else is sent to Nami directly.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorCommand {
    SetState(ConversationState),
    Clear,
    Interval(f64),
    Enable(SourceKind),
    Disable(SourceKind),
    Status,
    Context,
    Help,
    Exit,
}

impl OperatorCommand {
    /// Parse a console line.
    ///
    /// Returns `None` for plain text that should be answered rather than
    /// executed, and `Some(Err(_))` for a command with bad arguments.
    pub fn parse(line: &str) -> Option<Result<Self, IngestError>> {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "exit" | "quit" => return Some(Ok(OperatorCommand::Exit)),
            "status" => return Some(Ok(OperatorCommand::Status)),
            _ => {}
        }

        let rest = line.strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();
        if parts.next().is_some() {
            return Some(Err(malformed(line)));
        }

        let command = match (name.as_str(), arg) {
            ("state", Some(state)) => state.parse().map(OperatorCommand::SetState),
            ("interval", Some(secs)) => match secs.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(OperatorCommand::Interval(secs)),
                _ => Err(malformed(line)),
            },
            ("enable", Some(source)) => source.parse().map(OperatorCommand::Enable),
            ("disable", Some(source)) => source.parse().map(OperatorCommand::Disable),
            ("clear", None) => Ok(OperatorCommand::Clear),
            ("status", None) => Ok(OperatorCommand::Status),
            ("context", None) => Ok(OperatorCommand::Context),
            ("help", None) => Ok(OperatorCommand::Help),
            ("exit" | "quit", None) => Ok(OperatorCommand::Exit),
            _ => Err(malformed(line)),
        };
        Some(command)
    }
}

fn malformed(line: &str) -> IngestError {
    IngestError::MalformedCommand(line.to_string())
}
