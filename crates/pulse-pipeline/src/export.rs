//! Spreadsheet export.
//!
//! [`SpreadsheetWriter`] is the boundary the rest of the code depends on;
//! [`XlsxExporter`] writes a single-sheet `.xlsx` workbook with a header row.

use polars::prelude::DataFrame;
use rust_xlsxwriter::{ColNum, RowNum, Workbook};
use std::fmt::Debug;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::table::{Cell, header, rows};

/// Default worksheet name.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// MIME type of `.xlsx` payloads.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// File name of the consolidated display workbook.
pub const DISPLAY_FILE_NAME: &str = "Pulse_yf_FormattedData_Consolidated.xlsx";

/// File name of the consolidated full workbook.
pub const FULL_FILE_NAME: &str = "Pulse_yf_AllData_Consolidated.xlsx";

/// File name of one batch's display workbook (batches count from 1).
#[must_use]
pub fn batch_file_name(batch: usize) -> String {
    format!("Pulse_yf_FormattedData_Batch{batch}.xlsx")
}

/// Serializes a table into downloadable spreadsheet bytes.
pub trait SpreadsheetWriter: Send + Sync + Debug {
    /// Writes `table` to a single sheet named `sheet_name`, header row first.
    fn write_table(&self, table: &DataFrame, sheet_name: &str) -> Result<Vec<u8>>;
}

/// `.xlsx` writer backed by `rust_xlsxwriter`.
///
/// Nulls become empty cells; non-finite floats are written as text.
#[derive(Clone, Copy, Debug, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    /// Create a new exporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn col_num(index: usize) -> Result<ColNum> {
    ColNum::try_from(index)
        .map_err(|_| PipelineError::TableTooLarge(format!("{} columns", index + 1)))
}

fn row_num(index: usize) -> Result<RowNum> {
    RowNum::try_from(index).map_err(|_| PipelineError::TableTooLarge(format!("{index} rows")))
}

impl SpreadsheetWriter for XlsxExporter {
    fn write_table(&self, table: &DataFrame, sheet_name: &str) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name)?;

        for (c, name) in header(table).into_iter().enumerate() {
            worksheet.write_string(0, col_num(c)?, name)?;
        }

        for (r, row) in rows(table)?.into_iter().enumerate() {
            let r = row_num(r + 1)?;
            for (c, cell) in row.into_iter().enumerate() {
                let c = col_num(c)?;
                match cell {
                    Cell::Null => {}
                    Cell::Text(text) => {
                        worksheet.write_string(r, c, text)?;
                    }
                    Cell::Integer(value) => {
                        worksheet.write_number(r, c, value as f64)?;
                    }
                    Cell::Number(value) if value.is_finite() => {
                        worksheet.write_number(r, c, value)?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_string(r, c, value.to_string())?;
                    }
                }
            }
        }

        let bytes = workbook.save_to_buffer()?;
        debug!(
            rows = table.height(),
            columns = table.width(),
            bytes = bytes.len(),
            "Wrote workbook"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Ticker".into(), vec!["GOOGL", "GOOGL"]),
            Column::new("Full_Date".into(), vec!["TTM", "2024-12-31"]),
            Column::new("Year_Index".into(), vec![0i64, 1]),
            Column::new("Net Income".into(), vec![None, Some(100_118.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_table_produces_xlsx_container() {
        let bytes = XlsxExporter::new().write_table(&table(), DEFAULT_SHEET).unwrap();

        // .xlsx files are zip archives
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_table_still_exports() {
        let bytes = XlsxExporter::new()
            .write_table(&DataFrame::empty(), DEFAULT_SHEET)
            .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_invalid_sheet_name_is_export_error() {
        let result = XlsxExporter::new().write_table(&table(), "bad[name]");
        assert!(matches!(result, Err(PipelineError::Export(_))));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(batch_file_name(2), "Pulse_yf_FormattedData_Batch2.xlsx");
        assert!(DISPLAY_FILE_NAME.ends_with(".xlsx"));
        assert!(FULL_FILE_NAME.ends_with(".xlsx"));
    }
}
