//! Cross-tab summaries of the canonical dataset.

use std::{cmp::Ordering, collections::HashMap, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use log::{info, warn};

use crate::{
    cli::{Dimension, ReportArgs},
    columns::{Role, RoleMap},
    config::Settings,
    data::{Value, format_number},
    io_utils::{self, ReadOptions},
    normalize,
    table::{self, Table},
};

const BLANK_KEY: &str = "(blank)";

impl Dimension {
    pub fn role(self) -> Role {
        match self {
            Dimension::Professional => Role::ProfessionalName,
            Dimension::Patient => Role::PatientName,
            Dimension::Procedure => Role::ProcedureName,
            Dimension::City => Role::City,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub key: String,
    pub records: usize,
    pub quantity: f64,
    pub total: f64,
    pub goal: Option<f64>,
}

impl ReportRow {
    /// Share of the goal reached, in percent.
    pub fn attainment(&self) -> Option<f64> {
        self.goal
            .filter(|goal| *goal > 0.0)
            .map(|goal| self.total / goal * 100.0)
    }
}

/// A calendar month filter parsed from `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn parse(raw: &str) -> Result<Self> {
        let first = NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
            .map_err(|_| anyhow!("Month '{raw}' must be formatted YYYY-MM"))?;
        Ok(Self {
            year: first.year(),
            month: first.month(),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Groups rows by the column resolved for `dimension`, summing records,
/// quantity and total value. Rows are ordered by total (descending), then key.
pub fn cross_tab(
    table: &Table,
    dimension: Dimension,
    month: Option<Month>,
    settings: &Settings,
) -> Result<Vec<ReportRow>> {
    let roles = RoleMap::resolve(table.headers(), &settings.role_keywords());
    let key_col = roles
        .get(dimension.role())
        .ok_or_else(|| anyhow!("No column found for role '{}'", dimension.role()))?;
    let date_col = match month {
        Some(_) => Some(
            roles
                .get(Role::Date)
                .ok_or_else(|| anyhow!("Filtering by month requires a date column"))?,
        ),
        None => None,
    };
    let quantity_col = roles.get(Role::Quantity);
    let total_col = roles.get(Role::TotalValue);
    let unit_col = roles.get(Role::UnitValue);
    if total_col.is_none() && unit_col.is_none() {
        warn!("No total or unit value column found; totals will be 0");
    }

    let mut groups: HashMap<String, ReportRow> = HashMap::new();
    for row in table.rows() {
        if let (Some(month), Some(idx)) = (month, date_col) {
            let in_month = match normalize::to_date(&row[idx]) {
                Value::Date(date) => month.contains(date),
                _ => false,
            };
            if !in_month {
                continue;
            }
        }
        let quantity = quantity_col
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(1.0);
        let total = match (total_col, unit_col) {
            (Some(idx), _) => normalize::to_number(&row[idx]),
            (None, Some(idx)) => normalize::to_number(&row[idx]) * quantity,
            (None, None) => 0.0,
        };
        let key = match row[key_col].as_display().trim() {
            "" => BLANK_KEY.to_string(),
            other => other.to_string(),
        };
        let entry = groups.entry(key.clone()).or_insert_with(|| ReportRow {
            goal: settings.goal_for(&key),
            key,
            records: 0,
            quantity: 0.0,
            total: 0.0,
        });
        entry.records += 1;
        entry.quantity += quantity;
        entry.total += total;
    }

    let mut rows: Vec<ReportRow> = groups.into_values().collect();
    rows.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    Ok(rows)
}

pub fn execute(args: &ReportArgs, settings: &Settings) -> Result<()> {
    let input: PathBuf = args
        .input
        .clone()
        .unwrap_or_else(|| settings.canonical_path.clone());
    let options = ReadOptions::from_cli(args.delimiter, args.input_encoding.as_deref(), None)?;
    let loaded = io_utils::read_table(&input, &options)
        .with_context(|| format!("Reading {input:?}"))?;
    let month = args.month.as_deref().map(Month::parse).transpose()?;
    let rows = cross_tab(&loaded, args.by, month, settings)?;

    let headers = vec![
        dimension_label(args.by).to_string(),
        "records".to_string(),
        "quantity".to_string(),
        "total".to_string(),
        "goal".to_string(),
        "attainment".to_string(),
    ];
    let rendered = rows
        .iter()
        .map(|row| {
            vec![
                row.key.clone(),
                row.records.to_string(),
                format_number(row.quantity),
                format_number(row.total),
                row.goal.map(format_number).unwrap_or_default(),
                row.attainment()
                    .map(|pct| format!("{pct:.1}%"))
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rendered);
    info!("Report over {:?}: {} group(s)", input, rows.len());
    Ok(())
}

fn dimension_label(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Professional => "professional",
        Dimension::Patient => "patient",
        Dimension::Procedure => "procedure",
        Dimension::City => "city",
    }
}
