use thiserror::Error;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    List,
    Switch(usize),
    Delete(Option<usize>),
    Model(Option<String>),
    Models,
    Regenerate,
    Like,
    Dislike,
    Export,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("/{0} needs a conversation number")]
    MissingIndex(&'static str),
    #[error("'{0}' is not a conversation number")]
    InvalidIndex(String),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        if trimmed.is_empty() {
            return Ok(Command::Empty);
        }
        return Ok(Command::Send(trimmed.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let argument = parts.next();

    match name.as_str() {
        "new" => Ok(Command::New),
        "list" | "ls" => Ok(Command::List),
        "switch" => {
            let raw = argument.ok_or(CommandError::MissingIndex("switch"))?;
            Ok(Command::Switch(parse_index(raw)?))
        }
        "delete" | "rm" => Ok(Command::Delete(argument.map(parse_index).transpose()?)),
        "model" => Ok(Command::Model(argument.map(str::to_string))),
        "models" => Ok(Command::Models),
        "regenerate" | "regen" => Ok(Command::Regenerate),
        "like" => Ok(Command::Like),
        "dislike" => Ok(Command::Dislike),
        "export" => Ok(Command::Export),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Conversation numbers are 1-based as shown by `/list`.
fn parse_index(raw: &str) -> Result<usize, CommandError> {
    raw.parse::<usize>()
        .ok()
        .filter(|index| *index > 0)
        .map(|index| index - 1)
        .ok_or_else(|| CommandError::InvalidIndex(raw.to_string()))
}

pub const HELP_TEXT: &str = "\
Type a message and press enter to send it.

Commands:
  /new             start a new conversation
  /list            list conversations
  /switch N        make conversation N active
  /delete [N]      delete conversation N (default: the active one)
  /model [ID]      show or change the model
  /models          list available models
  /regenerate      replace the last reply
  /like, /dislike  rate the last reply (repeat to clear)
  /export          write the active conversation to a JSON file
  /help            show this help
  /quit            exit";
