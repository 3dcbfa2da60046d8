//! In-memory table model and plain-text rendering.
//!
//! A [`Table`] is an ordered list of free-form column names over ordered rows
//! of [`Value`] cells. Every row is kept exactly as wide as the header list.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Write as _;

use crate::data::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Convenience constructor for tests and fixtures: every cell is text.
    pub fn from_strings(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| Value::from(*cell)).collect())
                .collect(),
        )
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, padding with `Empty` or truncating to the header width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.headers.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Value {
        static EMPTY: Value = Value::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    pub fn column_values(&self, column: usize) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect()
    }

    pub fn set_column(&mut self, column: usize, values: Vec<Value>) {
        for (row, value) in self.rows.iter_mut().zip(values) {
            if let Some(cell) = row.get_mut(column) {
                *cell = value;
            }
        }
    }

    /// Appends a column and returns its index. Existing rows receive `Empty`.
    pub fn add_column(&mut self, name: &str) -> usize {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Empty);
        }
        self.headers.len() - 1
    }

    /// Trims every column name, then drops later duplicates of a name.
    pub fn tidy_columns(&mut self) {
        let mut seen = HashSet::new();
        let keep: Vec<bool> = self
            .headers
            .iter()
            .map(|h| seen.insert(h.trim().to_string()))
            .collect();
        if keep.iter().all(|k| *k) {
            for header in &mut self.headers {
                *header = header.trim().to_string();
            }
            return;
        }
        self.headers = self
            .headers
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(h, _)| h.trim().to_string())
            .collect();
        for row in &mut self.rows {
            let mut idx = 0usize;
            row.retain(|_| {
                let retained = keep[idx];
                idx += 1;
                retained
            });
        }
    }

    /// Stacks `other` under `self`; columns are the union in first-seen order.
    pub fn concat(&self, other: &Table) -> Table {
        let mut headers = self.headers.clone();
        for header in &other.headers {
            if !headers.contains(header) {
                headers.push(header.clone());
            }
        }
        let mut combined = Table::new(headers);
        for source in [self, other] {
            let mapping: Vec<Option<usize>> = combined
                .headers
                .iter()
                .map(|h| source.column_index(h))
                .collect();
            for row in &source.rows {
                let cells = mapping
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect();
                combined.rows.push(cells);
            }
        }
        combined
    }

    pub fn display_rows(&self, limit: Option<usize>) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| row.iter().map(Value::as_display).collect())
            .collect()
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    print!("{rendered}");
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
