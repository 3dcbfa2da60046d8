//! Column value normalization.
//!
//! Every output column is coerced to one [`ValueKind`]. Malformed cells never
//! fail: numbers fall back to `0`, dates to `Empty`, and text is always
//! representable. Normalizing an already normalized column is a no-op.

use crate::{
    columns::{Role, RoleMap},
    data::{Value, parse_naive_date},
    table::Table,
    transform::string_ops::{self, MAX_CELL_CHARS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Numeric,
    Date,
    /// Text with any leading internal code stripped.
    PersonName,
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_cell_chars: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            max_cell_chars: MAX_CELL_CHARS,
        }
    }
}

impl Normalizer {
    pub fn new(max_cell_chars: usize) -> Self {
        Self {
            max_cell_chars: max_cell_chars.max(1),
        }
    }

    pub fn normalize_value(&self, value: &Value, kind: ValueKind) -> Value {
        match kind {
            ValueKind::Numeric => Value::Number(to_number(value)),
            ValueKind::Date => to_date(value),
            ValueKind::String => self.to_text(value, false),
            ValueKind::PersonName => self.to_text(value, true),
        }
    }

    pub fn normalize_column(&self, values: &[Value], kind: ValueKind) -> Vec<Value> {
        values
            .iter()
            .map(|value| self.normalize_value(value, kind))
            .collect()
    }

    /// Normalizes every column of `table` in place, inferring kinds from roles.
    pub fn normalize_table(&self, table: &mut Table, roles: &RoleMap) {
        for idx in 0..table.column_count() {
            let values = table.column_values(idx);
            let kind = infer_kind(&table.headers()[idx], &values, roles.role_of(idx));
            let normalized = self.normalize_column(&values, kind);
            table.set_column(idx, normalized);
        }
    }

    fn to_text(&self, value: &Value, strip_prefix: bool) -> Value {
        let raw = match value {
            Value::Empty => return Value::Empty,
            other => other.as_display(),
        };
        let cleaned = string_ops::strip_control(&raw);
        let trimmed = cleaned.trim();
        let text = if strip_prefix {
            string_ops::sanitize_text(&string_ops::strip_code_prefix(trimmed), self.max_cell_chars)
        } else {
            string_ops::sanitize_text(trimmed, self.max_cell_chars)
        };
        Value::from(text)
    }
}

/// Numeric coercion: anything that is not a number becomes `0`.
pub fn to_number(value: &Value) -> f64 {
    value.as_number().unwrap_or(0.0)
}

/// Date coercion: unparseable input becomes `Empty`.
pub fn to_date(value: &Value) -> Value {
    match value {
        Value::Date(d) => Value::Date(*d),
        Value::String(s) => parse_naive_date(s).map(Value::Date).unwrap_or(Value::Empty),
        _ => Value::Empty,
    }
}

const DATE_HEADER_HINTS: &[&str] = &["fecha", "inicio", "fin"];

/// Picks the kind a column is normalized to.
pub fn infer_kind(header: &str, values: &[Value], role: Option<Role>) -> ValueKind {
    match role {
        Some(Role::UnitValue | Role::Quantity | Role::TotalValue) => return ValueKind::Numeric,
        Some(Role::ProfessionalName) => return ValueKind::PersonName,
        Some(Role::Date) => return ValueKind::Date,
        _ => {}
    }
    let lowered = header.to_lowercase();
    if DATE_HEADER_HINTS.iter().any(|hint| lowered.contains(hint)) || stores_dates(values) {
        ValueKind::Date
    } else {
        ValueKind::String
    }
}

fn stores_dates(values: &[Value]) -> bool {
    let mut saw_date = false;
    for value in values {
        match value {
            Value::Date(_) => saw_date = true,
            Value::Empty => {}
            _ => return false,
        }
    }
    saw_date
}
