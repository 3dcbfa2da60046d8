//! Styled XLSX export.
//!
//! Every sheet gets a bold header row on a light blue fill, the header row
//! frozen, and column widths sized to content (clamped to 12..=48).
//! Numbers are written as numbers, dates as `yyyy-mm-dd` date cells and
//! everything else as plain strings, so no cell is ever written as a formula.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, Workbook, Worksheet};

use crate::{data::Value, table::Table};

const HEADER_FILL: u32 = 0xEEF3FF;
const MIN_COLUMN_WIDTH: usize = 12;
const MAX_COLUMN_WIDTH: usize = 48;
const DATE_FORMAT: &str = "yyyy-mm-dd";

/// A named table destined for one worksheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetSpec<'a> {
    pub name: &'a str,
    pub table: &'a Table,
}

impl<'a> SheetSpec<'a> {
    pub fn new(name: &'a str, table: &'a Table) -> Self {
        Self { name, table }
    }
}

pub fn write_workbook(sheets: &[SheetSpec<'_>], path: &Path) -> Result<()> {
    let bytes = workbook_bytes(sheets)?;
    std::fs::write(path, bytes).with_context(|| format!("Writing workbook {path:?}"))
}

/// Builds the workbook in memory.
pub fn workbook_bytes(sheets: &[SheetSpec<'_>]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL));
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for sheet in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(sheet.name)
            .with_context(|| format!("Creating sheet '{}'", sheet.name))?;
        write_sheet(worksheet, sheet.table, &header_format, &date_format)
            .with_context(|| format!("Writing sheet '{}'", sheet.name))?;
    }

    workbook
        .save_to_buffer()
        .context("Serializing workbook")
}

fn write_sheet(
    worksheet: &mut Worksheet,
    table: &Table,
    header_format: &Format,
    date_format: &Format,
) -> Result<()> {
    for (col, header) in table.headers().iter().enumerate() {
        worksheet.write_string_with_format(0, cell_column(col)?, header, header_format)?;
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        let row32 = cell_row(row_idx + 1)?;
        for (col, value) in row.iter().enumerate() {
            let col16 = cell_column(col)?;
            match value {
                Value::Empty => {}
                Value::String(s) => {
                    worksheet.write_string(row32, col16, s)?;
                }
                Value::Number(n) => {
                    worksheet.write_number(row32, col16, *n)?;
                }
                Value::Date(d) => {
                    // Excel cannot represent dates before 1900; keep those as text.
                    match u16::try_from(d.year())
                        .ok()
                        .and_then(|year| ExcelDateTime::from_ymd(year, d.month() as u8, d.day() as u8).ok())
                    {
                        Some(excel_date) => {
                            worksheet.write_datetime_with_format(row32, col16, &excel_date, date_format)?;
                        }
                        None => {
                            worksheet.write_string(row32, col16, value.as_display())?;
                        }
                    }
                }
            }
        }
    }

    if table.column_count() > 0 {
        worksheet.set_freeze_panes(1, 0)?;
    }
    for (col, width) in column_widths(table).into_iter().enumerate() {
        worksheet.set_column_width(cell_column(col)?, width as f64)?;
    }
    Ok(())
}

fn cell_column(col: usize) -> Result<u16> {
    u16::try_from(col).with_context(|| format!("Column index {col} exceeds the worksheet limit"))
}

fn cell_row(row: usize) -> Result<u32> {
    u32::try_from(row).with_context(|| format!("Row index {row} exceeds the worksheet limit"))
}

pub fn column_widths(table: &Table) -> Vec<usize> {
    (0..table.column_count())
        .map(|col| {
            let header_len = table.headers()[col].chars().count();
            let longest = table
                .rows()
                .iter()
                .map(|row| row[col].as_display().chars().count())
                .fold(header_len, usize::max);
            (longest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_widths_are_clamped() {
        let long = "x".repeat(100);
        let table = Table::from_strings(&["id", "nota"], &[&["1", long.as_str()]]);
        assert_eq!(column_widths(&table), vec![12, 48]);
    }

    #[test]
    fn out_of_range_column_is_an_error() {
        assert_eq!(cell_column(16_383).unwrap(), 16_383);
        let err = cell_column(70_000).unwrap_err();
        assert!(err.to_string().contains("70000"));
    }
}
