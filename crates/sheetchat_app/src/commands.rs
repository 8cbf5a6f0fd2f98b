//! Parsing of REPL input lines.

use thiserror::Error;

/// Slash commands. Sheet, row and column numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sheets,
    Add(usize),
    Remove { sheet: usize, row: usize },
    Set { sheet: usize, row: usize, col: usize, value: String },
    Delete(usize),
    Save(usize),
    Update(usize),
    Csv(usize),
    SignIn,
    SignOut,
    Help,
    Quit,
}

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Chat(String),
    Command(Command),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command /{0}. Type /help for the list.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

fn number(arg: Option<&str>, usage: &'static str) -> Result<usize, CommandError> {
    arg.and_then(|a| a.parse().ok())
        .ok_or(CommandError::Usage(usage))
}

pub fn parse_input(line: &str) -> Result<Input, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Chat(line.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args = parts.next().unwrap_or_default().trim();
    let mut words = args.split_whitespace();

    let command = match name.as_str() {
        "sheets" | "list" => Command::Sheets,
        "add" => Command::Add(number(words.next(), "/add <n>")?),
        "remove" => {
            const USAGE: &str = "/remove <n> <row>";
            Command::Remove {
                sheet: number(words.next(), USAGE)?,
                row: number(words.next(), USAGE)?,
            }
        }
        "set" => {
            const USAGE: &str = "/set <n> <row> <col> <value>";
            let mut fields = args.splitn(4, char::is_whitespace);
            let sheet = number(fields.next(), USAGE)?;
            let row = number(fields.next(), USAGE)?;
            let col = number(fields.next(), USAGE)?;
            let value = fields.next().unwrap_or_default().trim().to_string();
            Command::Set { sheet, row, col, value }
        }
        "delete" => Command::Delete(number(words.next(), "/delete <n>")?),
        "save" => Command::Save(number(words.next(), "/save <n>")?),
        "update" => Command::Update(number(words.next(), "/update <n>")?),
        "csv" | "download" => Command::Csv(number(words.next(), "/csv <n>")?),
        "signin" => Command::SignIn,
        "signout" => Command::SignOut,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Input::Command(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            parse_input("  make me a budget  "),
            Ok(Input::Chat("make me a budget".into()))
        );
        assert_eq!(parse_input("   "), Ok(Input::Empty));
    }

    #[test]
    fn numeric_commands() {
        assert_eq!(parse_input("/add 2"), Ok(Input::Command(Command::Add(2))));
        assert_eq!(
            parse_input("/remove 1 3"),
            Ok(Input::Command(Command::Remove { sheet: 1, row: 3 }))
        );
        assert_eq!(parse_input("/CSV 1"), Ok(Input::Command(Command::Csv(1))));
    }

    #[test]
    fn set_keeps_spaces_in_value() {
        assert_eq!(
            parse_input("/set 1 2 3 New York, NY"),
            Ok(Input::Command(Command::Set {
                sheet: 1,
                row: 2,
                col: 3,
                value: "New York, NY".into()
            }))
        );
        assert_eq!(
            parse_input("/set 1 2 3"),
            Ok(Input::Command(Command::Set {
                sheet: 1,
                row: 2,
                col: 3,
                value: String::new()
            }))
        );
    }

    #[test]
    fn bad_arguments_report_usage() {
        assert_eq!(
            parse_input("/remove 1"),
            Err(CommandError::Usage("/remove <n> <row>"))
        );
        assert_eq!(parse_input("/save x"), Err(CommandError::Usage("/save <n>")));
    }

    #[test]
    fn unknown_command() {
        let err = parse_input("/frobnicate").unwrap_err();
        assert_eq!(err.to_string(), "Unknown command /frobnicate. Type /help for the list.");
    }
}
