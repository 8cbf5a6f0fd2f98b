//! Plain-text rendering for the terminal front end.

use std::fmt::Write;

use chrono::Local;

use sheetchat_core::conversation::{ConversationTurn, TurnRole};
use sheetchat_core::spreadsheet::Spreadsheet;

const MAX_CELL_WIDTH: usize = 24;

pub const HELP: &str = "\
Type a message to talk to the assistant, or use a command:
  /sheets                          list spreadsheets
  /add <n>                         add an empty row to sheet n
  /remove <n> <row>                remove a row from sheet n
  /set <n> <row> <col> <value>     change one cell
  /delete <n>                      delete sheet n
  /save <n>                        save sheet n to a new Google Sheet
  /update <n>                      push sheet n to its Google Sheet
  /csv <n>                         export sheet n as CSV
  /signin, /signout                Google account
  /help, /quit";

/// `[14:05] You: ...`, in local time.
pub fn render_turn(turn: &ConversationTurn) -> String {
    let who = match turn.role() {
        TurnRole::User => "You",
        TurnRole::Assistant => "Assistant",
    };
    let time = turn.timestamp().with_timezone(&Local).format("%H:%M");
    format!("[{time}] {who}: {}", turn.content())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// One-line summary: `#1 Budget · 3 rows · 4 columns`.
pub fn render_sheet_summary(position: usize, sheet: &Spreadsheet) -> String {
    let mut line = format!(
        "#{position} {} · {} · {}",
        sheet.name,
        plural(sheet.row_count(), "row"),
        plural(sheet.column_count(), "column")
    );
    if let Some(url) = sheet.remote_url() {
        let _ = write!(line, " · {url}");
    }
    line
}

pub fn render_sheet_list(sheets: &[impl AsRef<Spreadsheet>]) -> String {
    if sheets.is_empty() {
        return "No spreadsheets yet.".into();
    }
    sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| render_sheet_summary(i + 1, sheet.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        cell.to_string()
    } else {
        let mut clipped: String = cell.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    }
}

/// Summary line, a numbered grid and the formula list.
pub fn render_sheet(position: usize, sheet: &Spreadsheet) -> String {
    let mut out = render_sheet_summary(position, sheet);
    out.push('\n');

    let header: Vec<String> = sheet.columns.iter().map(|c| clip(c)).collect();
    let body: Vec<Vec<String>> = sheet
        .rows
        .iter()
        .map(|row| row.iter().map(|c| clip(c)).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }
    let gutter = sheet.row_count().to_string().len();

    let line = |label: &str, cells: &[String]| {
        let mut s = format!("{label:>gutter$} |");
        for (i, cell) in cells.iter().enumerate() {
            let _ = write!(s, " {cell:<w$} |", w = widths[i]);
        }
        s
    };

    out.push_str(&line("", &header));
    out.push('\n');
    for (i, row) in body.iter().enumerate() {
        out.push_str(&line(&(i + 1).to_string(), row));
        out.push('\n');
    }

    for formula in &sheet.formulas {
        let _ = write!(out, "  {} = {}", formula.cell, formula.formula);
        if !formula.description.is_empty() {
            let _ = write!(out, "  ({})", formula.description);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetchat_core::spreadsheet::{FormulaSpec, RemoteLink};
    use std::sync::Arc;

    fn budget() -> Spreadsheet {
        Spreadsheet::new(
            Some("Budget".into()),
            vec!["Item".into(), "Cost".into()],
            vec![
                vec!["Rent".into(), "1200".into()],
                vec!["Food".into(), "300".into()],
            ],
            vec![FormulaSpec {
                cell: "B4".into(),
                formula: "=SUM(B2:B3)".into(),
                description: "Total".into(),
            }],
        )
    }

    #[test]
    fn summary_mentions_counts_and_link() {
        let sheet = budget();
        assert_eq!(render_sheet_summary(1, &sheet), "#1 Budget · 2 rows · 2 columns");

        let linked = sheet.with_remote(RemoteLink {
            spreadsheet_id: "abc".into(),
            url: "https://docs.google.com/spreadsheets/d/abc".into(),
        });
        assert!(render_sheet_summary(2, &linked).ends_with("· https://docs.google.com/spreadsheets/d/abc"));
    }

    #[test]
    fn grid_has_header_rows_and_formulas() {
        let out = render_sheet(1, &budget());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "  | Item | Cost |");
        assert_eq!(lines[2], "1 | Rent | 1200 |");
        assert_eq!(lines[3], "2 | Food | 300  |");
        assert_eq!(lines[4], "  B4 = =SUM(B2:B3)  (Total)");
    }

    #[test]
    fn long_cells_are_clipped() {
        let clipped = clip(&"x".repeat(40));
        assert_eq!(clipped.chars().count(), MAX_CELL_WIDTH);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn empty_list() {
        let none: Vec<Arc<Spreadsheet>> = Vec::new();
        assert_eq!(render_sheet_list(&none), "No spreadsheets yet.");
    }

    #[test]
    fn singular_counts() {
        let sheet = Spreadsheet::new(None, vec!["A".into()], vec![vec!["1".into()]], vec![]);
        assert_eq!(render_sheet_summary(3, &sheet), "#3 Spreadsheet · 1 row · 1 column");
    }
}
