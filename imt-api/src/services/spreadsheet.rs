//! Workbook parsing
//!
//! Converts xlsx bytes into a [`SheetTable`]: the first worksheet's header
//! row plus row-major cells as JSON values. Only the first worksheet is
//! read; the prediction service returns a single-sheet workbook.

use anyhow::{anyhow, Context, Result};
use calamine::{Data, Reader, Xlsx};
use serde_json::{json, Value};
use std::io::Cursor;

/// A parsed worksheet: ordered column names plus row-major cells
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Parse xlsx bytes into a table. The first row is the header.
pub fn parse_xlsx(bytes: &[u8]) -> Result<SheetTable> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).context("response is not a valid xlsx workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .context("failed to read first worksheet")?;

    let mut rows_iter = range.rows();
    let header = rows_iter.next().context("worksheet is empty")?;
    let columns: Vec<String> = header
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect();

    Ok(SheetTable { columns, rows })
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        // Whole floats become integers; spreadsheet tools store all numbers
        // as floats
        Data::Float(f) if f.fract() == 0.0 => json!(*f as i64),
        Data::Float(f) => json!(*f),
        Data::Int(i) => json!(*i),
        Data::Bool(b) => json!(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(format!("{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_xlsx(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, header) in headers.iter().enumerate() {
            sheet.write_string(0, c as u16, *header).expect("write header");
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet
                    .write_string(r as u32 + 1, c as u16, *value)
                    .expect("write cell");
            }
        }
        workbook.save_to_buffer().expect("serialize workbook")
    }

    #[test]
    fn test_parse_header_and_rows() {
        let bytes = build_xlsx(
            &["unit", "Description"],
            &[&["U1", "leak"], &["U2", "vibration"]],
        );

        let table = parse_xlsx(&bytes).expect("parse");
        assert_eq!(table.columns, vec!["unit", "Description"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], Value::String("U1".to_string()));
        assert_eq!(table.rows[1][1], Value::String("vibration".to_string()));
    }

    #[test]
    fn test_parse_numbers() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Criticité").expect("header");
        sheet.write_number(1, 0, 12.0).expect("cell");
        sheet.write_number(2, 0, 2.5).expect("cell");
        let bytes = workbook.save_to_buffer().expect("serialize");

        let table = parse_xlsx(&bytes).expect("parse");
        assert_eq!(table.rows[0][0], json!(12));
        assert_eq!(table.rows[1][0], json!(2.5));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(parse_xlsx(b"this is not a workbook").is_err());
    }
}
