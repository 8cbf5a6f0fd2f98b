//! Model reply → [`Action`].
//!
//! The model is asked to answer with a single JSON object, but nothing
//! enforces that. [`parse_action`] therefore never fails: anything that is not
//! a JSON object comes back as [`Action::Chat`] carrying the raw reply.

use serde_json::{Map, Value};
use tracing::debug;

use sheetchat_core::spreadsheet::FormulaSpec;

/// A command decoded from one model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateSpreadsheet {
        spreadsheet_type: Option<String>,
        columns: Vec<String>,
        sample_data: Vec<Vec<String>>,
        formulas: Vec<FormulaSpec>,
        message: Option<String>,
    },
    AddRow {
        message: Option<String>,
    },
    /// `row_number` is 1-based, as in the protocol.
    RemoveRow {
        row_number: i64,
        message: Option<String>,
    },
    DeleteSpreadsheet {
        message: Option<String>,
    },
    SaveToGoogle {
        message: Option<String>,
    },
    UpdateGoogle {
        message: Option<String>,
    },
    Chat {
        message: Option<String>,
    },
    Error {
        message: Option<String>,
    },
}

impl Action {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::CreateSpreadsheet { message, .. }
            | Self::AddRow { message }
            | Self::RemoveRow { message, .. }
            | Self::DeleteSpreadsheet { message }
            | Self::SaveToGoogle { message }
            | Self::UpdateGoogle { message }
            | Self::Chat { message }
            | Self::Error { message } => message.as_deref(),
        }
    }

    /// Protocol tag, e.g. `"create_spreadsheet"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateSpreadsheet { .. } => "create_spreadsheet",
            Self::AddRow { .. } => "add_row",
            Self::RemoveRow { .. } => "remove_row",
            Self::DeleteSpreadsheet { .. } => "delete_spreadsheet",
            Self::SaveToGoogle { .. } => "save_to_google",
            Self::UpdateGoogle { .. } => "update_google",
            Self::Chat { .. } => "chat",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: Some(message.into()),
        }
    }
}

/// Decode a raw model reply. Never fails.
pub fn parse_action(raw: &str) -> Action {
    let object = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(object)) => object,
        Ok(_) | Err(_) => {
            debug!(len = raw.len(), "model reply is not a JSON object; treating as chat");
            return Action::Chat {
                message: Some(raw.to_string()),
            };
        }
    };

    let message = object
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    match object.get("action").and_then(Value::as_str) {
        Some("create_spreadsheet") => Action::CreateSpreadsheet {
            spreadsheet_type: object
                .get("spreadsheet_type")
                .and_then(Value::as_str)
                .map(str::to_string),
            columns: string_list(object.get("columns")),
            sample_data: rows(object.get("sample_data")),
            formulas: formulas(object.get("formulas")),
            message,
        },
        Some("add_row") => Action::AddRow { message },
        Some("remove_row") => Action::RemoveRow {
            row_number: row_number(&object),
            message,
        },
        Some("delete_spreadsheet") => Action::DeleteSpreadsheet { message },
        Some("save_to_google") => Action::SaveToGoogle { message },
        Some("update_google") => Action::UpdateGoogle { message },
        Some("error") => Action::Error { message },
        other => {
            if let Some(tag) = other.filter(|t| *t != "chat") {
                debug!(action = tag, "unrecognized action; treating as chat");
            }
            Action::Chat { message }
        }
    }
}

/// Textual form of a JSON cell: strings verbatim, `null` empty, everything
/// else via its JSON rendering.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(cell_text).collect(),
        _ => Vec::new(),
    }
}

fn rows(value: Option<&Value>) -> Vec<Vec<String>> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|row| match row {
                Value::Array(_) => string_list(Some(row)),
                scalar => vec![cell_text(scalar)],
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn formulas(value: Option<&Value>) -> Vec<FormulaSpec> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let cell = obj.get("cell").and_then(Value::as_str)?.trim().to_string();
            let formula = obj.get("formula").map(cell_text)?;
            if cell.is_empty() {
                return None;
            }
            Some(FormulaSpec {
                cell,
                formula,
                description: obj.get("description").map(cell_text).unwrap_or_default(),
            })
        })
        .collect()
}

/// `row_number` as a number or numeric string; missing, zero or garbage
/// means row 1. A fractional number names no row and comes back as 0, which
/// is out of range.
fn row_number(object: &Map<String, Value>) -> i64 {
    let parsed = match object.get("row_number") {
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i),
            (None, Some(f)) if f.fract() != 0.0 => return 0,
            (None, Some(f)) => Some(f as i64),
            (None, None) => None,
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(0) | None => 1,
        Some(n) => n,
    }
}
