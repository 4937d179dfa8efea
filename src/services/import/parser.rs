//! Spreadsheet parsing for lead import.
//!
//! Both formats reduce to header-keyed string rows so the rest of the
//! pipeline is format-agnostic. Cell values keep their textual form;
//! interpretation happens in the resolver and normalizer.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use calamine::{open_workbook_auto, Reader};

/// One parsed data row: column header -> raw cell text
pub type RawRow = HashMap<String, String>;

/// Accepted upload formats, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetKind {
    Csv,
    Excel,
}

impl SpreadsheetKind {
    /// `None` for extensions the import does not accept.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(SpreadsheetKind::Csv),
            "xlsx" | "xls" => Some(SpreadsheetKind::Excel),
            _ => None,
        }
    }
}

/// Parse the staged upload into rows. The header row is consumed; data
/// rows keep file order.
pub fn parse_rows(path: &Path, kind: SpreadsheetKind) -> Result<Vec<RawRow>> {
    match kind {
        SpreadsheetKind::Csv => {
            let content = std::fs::read_to_string(path)?;
            parse_csv(&content)
        }
        SpreadsheetKind::Excel => parse_excel(path),
    }
}

/// CSV rows keyed by the header line. Short records pad missing cells
/// with empty strings, spreadsheet exports are rarely rectangular.
pub fn parse_csv(content: &str) -> Result<Vec<RawRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            row.insert(header.to_string(), record.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// First worksheet only, first row as headers. Fully blank rows are
/// dropped, Excel ranges often trail formatting-only rows.
fn parse_excel(path: &Path) -> Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();
    let first_sheet = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook contains no sheets"))?;
    let range = workbook.worksheet_range(&first_sheet)?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(row) => row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for row in rows_iter {
        let mut record = RawRow::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = row.get(i).map(|cell| cell.to_string()).unwrap_or_default();
            record.insert(header.clone(), value);
        }
        if record.values().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_from_extension() {
        assert_eq!(SpreadsheetKind::from_name("leads.csv"), Some(SpreadsheetKind::Csv));
        assert_eq!(SpreadsheetKind::from_name("Leads.XLSX"), Some(SpreadsheetKind::Excel));
        assert_eq!(SpreadsheetKind::from_name("leads.xls"), Some(SpreadsheetKind::Excel));
        assert_eq!(SpreadsheetKind::from_name("leads.pdf"), None);
        assert_eq!(SpreadsheetKind::from_name("leads"), None);
    }

    #[test]
    fn parses_csv_rows_keyed_by_header() {
        let rows = parse_csv(
            "First Name,Last Name,Phone\nJane,Doe,5550100100\nJohn,Smith,5550100101\n",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["First Name"], "Jane");
        assert_eq!(rows[1]["Phone"], "5550100101");
    }

    #[test]
    fn short_csv_records_pad_with_empty() {
        let rows = parse_csv("a,b,c\n1,2\n").unwrap();
        assert_eq!(rows[0]["b"], "2");
        assert_eq!(rows[0]["c"], "");
    }

    #[test]
    fn strips_utf8_bom_from_header() {
        let rows = parse_csv("\u{feff}phone,email\n5550100100,a@b.com\n").unwrap();
        assert_eq!(rows[0]["phone"], "5550100100");
    }

    #[test]
    fn trims_header_and_field_whitespace() {
        let rows = parse_csv(" phone , email \n 5550100100 , a@b.com \n").unwrap();
        assert_eq!(rows[0]["phone"], "5550100100");
        assert_eq!(rows[0]["email"], "a@b.com");
    }
}
