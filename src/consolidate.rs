//! Merges a primary activity table with a reference price table.
//!
//! Unit values are looked up by procedure code first, then by procedure
//! name, falling back to the primary row's own unit value. Totals are always
//! recomputed as `unit × quantity`. When the two tables cannot be joined the
//! result is their concatenation, still normalized.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use encoding_rs::Encoding;
use log::{info, warn};

use crate::{
    cli::ConsolidateArgs,
    columns::{Role, RoleKeywords, RoleMap},
    config::Settings,
    data::Value,
    io_utils::{self, ReadOptions},
    normalize::Normalizer,
    progress::{LogProgress, Phase, Progress},
    store::{CANONICAL_SHEET, CanonicalStore},
    table::Table,
    transform::string_ops::MAX_CELL_CHARS,
    workbook::{self, SheetSpec},
};

#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    pub keywords: RoleKeywords,
    pub max_cell_chars: usize,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            keywords: RoleKeywords::default(),
            max_cell_chars: MAX_CELL_CHARS,
        }
    }
}

impl ConsolidateOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            keywords: settings.role_keywords(),
            max_cell_chars: settings.max_cell_chars,
        }
    }
}

/// How the output table was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Unit values were looked up in the reference table.
    Joined { by_code: bool, by_name: bool },
    /// The tables could not be joined and were stacked instead.
    Concatenated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub rows: usize,
    pub matched_by_code: usize,
    pub matched_by_name: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub table: Table,
    pub strategy: Strategy,
    pub stats: ConsolidationStats,
    pub notices: Vec<String>,
}

pub fn consolidate(primary: &Table, reference: &Table, options: &ConsolidateOptions) -> Consolidation {
    consolidate_with_progress(primary, reference, options, &mut LogProgress)
}

pub fn consolidate_with_progress(
    primary: &Table,
    reference: &Table,
    options: &ConsolidateOptions,
    progress: &mut dyn Progress,
) -> Consolidation {
    let primary_roles = RoleMap::resolve(primary.headers(), &options.keywords);
    let reference_roles = RoleMap::resolve(reference.headers(), &options.keywords);
    progress.phase(Phase::Parsed);

    let normalizer = Normalizer::new(options.max_cell_chars);
    let by_code = both_resolve(&primary_roles, &reference_roles, Role::ProcedureCode);
    let by_name = both_resolve(&primary_roles, &reference_roles, Role::ProcedureName);
    let Some(reference_unit) = reference_roles.get(Role::UnitValue).filter(|_| by_code || by_name)
    else {
        let notice = concat_notice(by_code || by_name);
        warn!("{notice}");
        let mut table = primary.concat(reference);
        let roles = RoleMap::resolve(table.headers(), &options.keywords);
        normalizer.normalize_table(&mut table, &roles);
        table.tidy_columns();
        let stats = ConsolidationStats {
            rows: table.row_count(),
            ..ConsolidationStats::default()
        };
        return Consolidation {
            table,
            strategy: Strategy::Concatenated,
            stats,
            notices: vec![notice],
        };
    };

    let code_lookup = if by_code {
        build_lookup(reference, reference_roles.get(Role::ProcedureCode), reference_unit)
    } else {
        HashMap::new()
    };
    let name_lookup = if by_name {
        build_lookup(reference, reference_roles.get(Role::ProcedureName), reference_unit)
    } else {
        HashMap::new()
    };
    progress.phase(Phase::LookupBuilt);

    let mut notices = Vec::new();
    let mut table = primary.clone();
    let mut roles = primary_roles;
    let unit_col = ensure_column(&mut table, &mut roles, Role::UnitValue);
    let total_col = ensure_column(&mut table, &mut roles, Role::TotalValue);
    let quantity_col = roles.get(Role::Quantity);
    if quantity_col.is_none() {
        notices.push("No quantity column found; every row counts as quantity 1".to_string());
    }
    let code_col = roles.get(Role::ProcedureCode).filter(|_| by_code);
    let name_col = roles.get(Role::ProcedureName).filter(|_| by_name);

    let mut stats = ConsolidationStats {
        rows: table.row_count(),
        ..ConsolidationStats::default()
    };
    let mut units = Vec::with_capacity(table.row_count());
    let mut quantities = Vec::with_capacity(table.row_count());
    let mut totals = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let from_code = code_col.and_then(|idx| code_lookup.get(&lookup_key(&row[idx])));
        let from_name = name_col.and_then(|idx| name_lookup.get(&lookup_key(&row[idx])));
        let unit = match (from_code, from_name) {
            (Some(unit), _) => {
                stats.matched_by_code += 1;
                *unit
            }
            (None, Some(unit)) => {
                stats.matched_by_name += 1;
                *unit
            }
            (None, None) => {
                stats.unmatched += 1;
                row[unit_col].as_number().unwrap_or(0.0)
            }
        };
        let quantity = quantity_col
            .and_then(|idx| row[idx].as_number())
            .unwrap_or(1.0);
        units.push(Value::Number(unit));
        quantities.push(Value::Number(quantity));
        totals.push(Value::Number(unit * quantity));
    }
    table.set_column(unit_col, units);
    table.set_column(total_col, totals);
    if let Some(idx) = quantity_col {
        table.set_column(idx, quantities);
    }
    progress.phase(Phase::Joined);

    normalizer.normalize_table(&mut table, &roles);
    table.tidy_columns();
    if stats.unmatched > 0 {
        notices.push(format!(
            "{} row(s) had no reference price and kept their own unit value",
            stats.unmatched
        ));
    }
    info!(
        "Consolidated {} row(s): {} by code, {} by name, {} unmatched",
        stats.rows, stats.matched_by_code, stats.matched_by_name, stats.unmatched
    );
    Consolidation {
        table,
        strategy: Strategy::Joined { by_code, by_name },
        stats,
        notices,
    }
}

/// Consolidates and replaces the canonical dataset with the result.
///
/// Returns the consolidation together with the store's last-updated time
/// as observed after the write.
pub fn consolidate_into_store(
    primary: &Table,
    reference: &Table,
    options: &ConsolidateOptions,
    store: &CanonicalStore,
    progress: &mut dyn Progress,
) -> Result<(Consolidation, Option<DateTime<Local>>)> {
    let consolidation = consolidate_with_progress(primary, reference, options, progress);
    store
        .save(&consolidation.table)
        .with_context(|| format!("Persisting canonical dataset {:?}", store.path()))?;
    let last_updated = store.last_updated()?;
    Ok((consolidation, last_updated))
}

fn both_resolve(primary: &RoleMap, reference: &RoleMap, role: Role) -> bool {
    primary.get(role).is_some() && reference.get(role).is_some()
}

fn concat_notice(has_join_column: bool) -> String {
    if has_join_column {
        "Reference table has no unit value column; tables were concatenated".to_string()
    } else {
        "No procedure code or name column shared by both tables; tables were concatenated"
            .to_string()
    }
}

fn lookup_key(value: &Value) -> String {
    value.as_display().trim().to_lowercase()
}

/// Key → unit value from the reference. Blank keys and rows without a
/// numeric unit value are skipped; the first occurrence of a key wins.
fn build_lookup(reference: &Table, key_col: Option<usize>, unit_col: usize) -> HashMap<String, f64> {
    let mut lookup = HashMap::new();
    let Some(key_col) = key_col else {
        return lookup;
    };
    for row in reference.rows() {
        let key = lookup_key(&row[key_col]);
        if key.is_empty() {
            continue;
        }
        let Some(unit) = row[unit_col].as_number() else {
            continue;
        };
        lookup.entry(key).or_insert(unit);
    }
    lookup
}

fn ensure_column(table: &mut Table, roles: &mut RoleMap, role: Role) -> usize {
    if let Some(idx) = roles.get(role) {
        return idx;
    }
    let idx = table.add_column(role.canonical_header());
    roles.insert(role, idx);
    idx
}

/// Writes a table as a single-sheet workbook or a delimited file, by extension.
/// `encoding` applies to delimited output only.
pub fn export_table(
    table: &Table,
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<()> {
    if io_utils::is_spreadsheet(path) {
        return workbook::write_workbook(&[SheetSpec::new(CANONICAL_SHEET, table)], path);
    }
    let delimiter =
        io_utils::resolve_output_delimiter(Some(path), delimiter, io_utils::DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(Some(path), delimiter, encoding)?;
    io_utils::write_csv_table(&mut writer, table)
}

pub fn execute(args: &ConsolidateArgs, settings: &Settings) -> Result<()> {
    let primary_options = ReadOptions::from_cli(
        args.delimiter,
        args.primary_encoding.as_deref(),
        args.primary_sheet.clone(),
    )?;
    let reference_options = ReadOptions::from_cli(
        args.delimiter,
        args.reference_encoding.as_deref(),
        args.reference_sheet.clone(),
    )?;
    let primary = io_utils::read_table(&args.primary, &primary_options)
        .with_context(|| format!("Reading primary table {:?}", args.primary))?;
    let reference = io_utils::read_table(&args.reference, &reference_options)
        .with_context(|| format!("Reading reference table {:?}", args.reference))?;

    let options = ConsolidateOptions::from_settings(settings);
    let mut progress = LogProgress;
    let consolidation = if args.no_persist {
        consolidate_with_progress(&primary, &reference, &options, &mut progress)
    } else {
        let store = CanonicalStore::new(
            args.canonical
                .clone()
                .unwrap_or_else(|| settings.canonical_path.clone()),
        );
        let (consolidation, last_updated) =
            consolidate_into_store(&primary, &reference, &options, &store, &mut progress)?;
        if let Some(stamp) = last_updated {
            println!(
                "Canonical dataset {} updated {}",
                store.path().display(),
                stamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
        consolidation
    };

    if let Some(output) = &args.output {
        let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
        export_table(&consolidation.table, output, args.delimiter, encoding)
            .with_context(|| format!("Exporting consolidated table to {output:?}"))?;
        progress.phase(Phase::ExportBuilt);
        info!("Consolidated table written to {output:?}");
    }

    for notice in &consolidation.notices {
        println!("note: {notice}");
    }
    let stats = consolidation.stats;
    println!(
        "rows: {}, matched by code: {}, matched by name: {}, unmatched: {}",
        stats.rows, stats.matched_by_code, stats.matched_by_name, stats.unmatched
    );
    Ok(())
}
