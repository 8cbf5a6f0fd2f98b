use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Generate a CSV string: the header line, then one line per row.
///
/// Fields containing a comma, quote or newline are quoted, with embedded
/// quotes doubled. Rows may differ in length from the header.
pub fn generate_csv<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> Result<String> {
    let mut out = encode_record(headers.iter().map(|h| h.as_ref()))
        .context("Failed to write header record")?;

    for row in rows {
        let line = encode_record(row.iter().map(String::as_str))
            .context("Failed to write data record")?;
        out.push_str(&line);
    }

    Ok(out)
}

/// One terminated line. A record with no fields or a single empty field is
/// a bare newline; the csv writer would emit `""` for it.
fn encode_record<'a>(fields: impl Iterator<Item = &'a str>) -> Result<String> {
    let fields: Vec<&str> = fields.collect();
    if fields.len() <= 1 && fields.iter().all(|f| f.is_empty()) {
        return Ok("\n".to_string());
    }

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&fields)?;
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;

    String::from_utf8(bytes).context("CSV output contained invalid UTF-8")
}

/// File name for a sheet export: every character outside `[A-Za-z0-9]`
/// becomes `_`, then `.csv` is appended.
pub fn csv_filename(sheet_name: &str) -> String {
    let stem: String = sheet_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.csv")
}

/// Write a sheet as CSV into `dir` and return the file path.
pub fn write_csv<H: AsRef<str>>(
    dir: &Path,
    sheet_name: &str,
    headers: &[H],
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    let content = generate_csv(headers, rows)?;
    let path = dir.join(csv_filename(sheet_name));
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_csv_basic() {
        let headers = &["Name", "Age", "City"];
        let rows = vec![
            vec!["Alice".into(), "30".into(), "New York".into()],
            vec!["Bob".into(), "25".into(), "London".into()],
        ];
        let result = generate_csv(headers, &rows).unwrap();
        assert_eq!(result, "Name,Age,City\nAlice,30,New York\nBob,25,London\n");
    }

    #[test]
    fn test_quotes_are_doubled() {
        let rows = vec![vec![r#"a,"b""#.to_string()]];
        let result = generate_csv(&["Value"], &rows).unwrap();
        assert_eq!(result.lines().nth(1), Some(r#""a,""b""""#));
    }

    #[test]
    fn test_newlines_are_quoted() {
        let rows = vec![vec!["line one\nline two".to_string(), "plain".to_string()]];
        let result = generate_csv(&["Notes", "Other"], &rows).unwrap();
        assert!(result.contains("\"line one\nline two\",plain"));
    }

    #[test]
    fn test_header_only() {
        let rows: Vec<Vec<String>> = vec![];
        let result = generate_csv(&["A", "B"], &rows).unwrap();
        assert_eq!(result, "A,B\n");
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let rows = vec![vec!["1".to_string()], vec!["1".into(), "2".into(), "3".into()]];
        let result = generate_csv(&["A", "B"], &rows).unwrap();
        assert_eq!(result.lines().count(), 3);
    }

    #[test]
    fn test_single_empty_column_is_blank_line() {
        let rows = vec![vec!["a".to_string()], vec![String::new()], vec![]];
        let result = generate_csv(&["Only"], &rows).unwrap();
        assert_eq!(result, "Only\na\n\n\n");

        let two_blank = vec![vec![String::new(), String::new()]];
        assert_eq!(generate_csv(&["A", "B"], &two_blank).unwrap(), "A,B\n,\n");
    }

    #[test]
    fn test_csv_filename() {
        assert_eq!(csv_filename("Expense Report"), "Expense_Report.csv");
        assert_eq!(csv_filename("Q3/Q4 budget!"), "Q3_Q4_budget_.csv");
        assert_eq!(csv_filename("Café"), "Caf_.csv");
    }

    #[test]
    fn test_write_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let rows = vec![vec!["x".to_string()]];
        let path = write_csv(tmp.path(), "My Sheet", &["H"], &rows).unwrap();

        assert_eq!(path.file_name().unwrap(), "My_Sheet.csv");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "H\nx\n");
    }
}
