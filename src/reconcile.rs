//! Set reconciliation ("cruce") of two tables on a shared key column.
//!
//! Rows are partitioned into `matched` (inner join on the key), `only_in_a`
//! and `only_in_b`. The exclusive sets are computed with set membership on
//! the normalized key, never by materializing an outer join. Keys compare on
//! their trimmed display text, case-sensitively.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::Path,
};

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::ReconcileArgs,
    config::{ReconcileSettings, Settings},
    data::Value,
    error::{CruceError, Side},
    io_utils::{self, ReadOptions},
    progress::{LogProgress, Phase, Progress},
    table::Table,
    workbook::{self, SheetSpec},
};

const SUFFIX_A: &str = "_A";
const SUFFIX_B: &str = "_B";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Refuse runs whose matched output would exceed this many rows.
    pub max_matched_rows: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileCounts {
    pub matched: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
}

impl fmt::Display for ReconcileCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matched: {}, only in A: {}, only in B: {}",
            self.matched, self.only_in_a, self.only_in_b
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationResult {
    pub key: String,
    pub matched: Table,
    pub only_in_a: Table,
    pub only_in_b: Table,
}

impl ReconciliationResult {
    pub fn counts(&self) -> ReconcileCounts {
        ReconcileCounts {
            matched: self.matched.row_count(),
            only_in_a: self.only_in_a.row_count(),
            only_in_b: self.only_in_b.row_count(),
        }
    }
}

pub fn reconcile(
    a: &Table,
    b: &Table,
    key: &str,
    options: &ReconcileOptions,
) -> Result<ReconciliationResult, CruceError> {
    reconcile_with_progress(a, b, key, options, &mut LogProgress)
}

pub fn reconcile_with_progress(
    a: &Table,
    b: &Table,
    key: &str,
    options: &ReconcileOptions,
    progress: &mut dyn Progress,
) -> Result<ReconciliationResult, CruceError> {
    let a_key = find_key_column(a, key).ok_or_else(|| CruceError::MissingKeyColumn {
        side: Side::A,
        column: key.to_string(),
    })?;
    let b_key = find_key_column(b, key).ok_or_else(|| CruceError::MissingKeyColumn {
        side: Side::B,
        column: key.to_string(),
    })?;

    let a_keys = normalized_keys(a, a_key);
    let b_keys = normalized_keys(b, b_key);
    progress.phase(Phase::Parsed);

    let mut b_lookup: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row_idx, value) in b_keys.iter().enumerate() {
        b_lookup.entry(value.as_str()).or_default().push(row_idx);
    }
    let a_key_set: HashSet<&str> = a_keys.iter().map(String::as_str).collect();
    progress.phase(Phase::LookupBuilt);

    let only_in_a = select_rows(a, a_keys.iter().map(|k| !b_lookup.contains_key(k.as_str())));
    let only_in_b = select_rows(b, b_keys.iter().map(|k| !a_key_set.contains(k.as_str())));

    let matched_total: usize = a_keys
        .iter()
        .map(|k| b_lookup.get(k.as_str()).map_or(0, Vec::len))
        .sum();
    if options
        .max_matched_rows
        .is_some_and(|limit| matched_total > limit)
    {
        return Err(CruceError::ResourceExhausted {
            rows: matched_total,
        });
    }
    let mut matched_rows: Vec<Vec<Value>> = Vec::new();
    matched_rows
        .try_reserve_exact(matched_total)
        .map_err(|_| CruceError::ResourceExhausted {
            rows: matched_total,
        })?;

    let (headers, b_columns) = build_output_headers(a.headers(), b.headers(), a_key, b_key);
    for (a_row, a_value) in a.rows().iter().zip(&a_keys) {
        let Some(bucket) = b_lookup.get(a_value.as_str()) else {
            continue;
        };
        for b_idx in bucket {
            let b_row = &b.rows()[*b_idx];
            let mut combined = a_row.clone();
            combined.extend(b_columns.iter().map(|idx| b_row[*idx].clone()));
            matched_rows.push(combined);
        }
    }
    let matched = Table::from_rows(headers, matched_rows);
    progress.phase(Phase::Joined);

    let result = ReconciliationResult {
        key: a.headers()[a_key].clone(),
        matched,
        only_in_a,
        only_in_b,
    };
    info!("Reconciliation on '{}' complete: {}", result.key, result.counts());
    Ok(result)
}

/// Exact (trimmed) header match first, then a case-insensitive one.
pub fn find_key_column(table: &Table, key: &str) -> Option<usize> {
    let wanted = key.trim();
    let headers = table.headers();
    headers
        .iter()
        .position(|h| h.trim() == wanted)
        .or_else(|| {
            let lowered = wanted.to_lowercase();
            headers.iter().position(|h| h.trim().to_lowercase() == lowered)
        })
}

fn normalized_keys(table: &Table, column: usize) -> Vec<String> {
    table
        .rows()
        .iter()
        .map(|row| row[column].as_display().trim().to_string())
        .collect()
}

fn select_rows(table: &Table, keep: impl Iterator<Item = bool>) -> Table {
    let rows = table
        .rows()
        .iter()
        .zip(keep)
        .filter(|(_, keep)| *keep)
        .map(|(row, _)| row.clone())
        .collect();
    Table::from_rows(table.headers().to_vec(), rows)
}

/// A's columns keep their position; B's non-key columns follow. A non-key
/// name present on both sides is suffixed with its origin.
fn build_output_headers(
    a_headers: &[String],
    b_headers: &[String],
    a_key: usize,
    b_key: usize,
) -> (Vec<String>, Vec<usize>) {
    let b_names: HashSet<&str> = b_headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != b_key)
        .map(|(_, name)| name.as_str())
        .collect();
    let a_names: HashSet<&str> = a_headers.iter().map(String::as_str).collect();

    let mut headers = Vec::with_capacity(a_headers.len() + b_headers.len());
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, name) in a_headers.iter().enumerate() {
        let candidate = if idx != a_key && b_names.contains(name.as_str()) {
            format!("{name}{SUFFIX_A}")
        } else {
            name.clone()
        };
        headers.push(unique_name(candidate, &mut seen));
    }

    let mut b_columns = Vec::new();
    for (idx, name) in b_headers.iter().enumerate() {
        if idx == b_key {
            continue;
        }
        let candidate = if a_names.contains(name.as_str()) {
            format!("{name}{SUFFIX_B}")
        } else {
            name.clone()
        };
        headers.push(unique_name(candidate, &mut seen));
        b_columns.push(idx);
    }
    (headers, b_columns)
}

fn unique_name(candidate: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(candidate.clone()) {
        return candidate;
    }
    let mut counter = 1usize;
    loop {
        let next = format!("{candidate}_{counter}");
        if seen.insert(next.clone()) {
            return next;
        }
        counter += 1;
    }
}

/// Writes the result as a multi-sheet workbook.
pub fn export(
    result: &ReconciliationResult,
    path: &Path,
    sheets: &ReconcileSettings,
    include_only_b: bool,
) -> Result<()> {
    if !io_utils::is_spreadsheet(path) {
        bail!("Reconciliation output must be a workbook (.xlsx), got {path:?}");
    }
    let mut specs = vec![
        SheetSpec::new(&sheets.matched_sheet, &result.matched),
        SheetSpec::new(&sheets.only_a_sheet, &result.only_in_a),
    ];
    if include_only_b {
        specs.push(SheetSpec::new(&sheets.only_b_sheet, &result.only_in_b));
    }
    workbook::write_workbook(&specs, path)
}

pub fn execute(args: &ReconcileArgs, settings: &Settings) -> Result<()> {
    let left_options = ReadOptions::from_cli(
        args.delimiter,
        args.left_encoding.as_deref(),
        args.left_sheet.clone(),
    )?;
    let right_options = ReadOptions::from_cli(
        args.delimiter,
        args.right_encoding.as_deref(),
        args.right_sheet.clone(),
    )?;
    let a = io_utils::read_table(&args.left, &left_options)
        .with_context(|| format!("Reading left input {:?}", args.left))?;
    let b = io_utils::read_table(&args.right, &right_options)
        .with_context(|| format!("Reading right input {:?}", args.right))?;

    let options = ReconcileOptions {
        max_matched_rows: args.max_matched_rows.or(settings.reconcile.max_matched_rows),
    };
    let mut progress = LogProgress;
    let result = reconcile_with_progress(&a, &b, &args.key, &options, &mut progress)?;
    export(&result, &args.output, &settings.reconcile, !args.no_only_right)
        .with_context(|| format!("Writing reconciliation to {:?}", args.output))?;
    progress.phase(Phase::ExportBuilt);

    println!("{}", result.counts());
    info!("Reconciliation written to {:?}", args.output);
    Ok(())
}

/// Where a reconciliation session stands, as seen by an interactive caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FilesLoaded,
    KeySelected,
    Running,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::FilesLoaded => "files loaded",
            SessionState::KeySelected => "key selected",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// One reconciliation session: load a pair, pick a key, run, export.
///
/// A failed run records its error and returns to `KeySelected` with the
/// loaded files and key intact. A completed result stays exportable until a
/// new pair is loaded.
#[derive(Debug)]
pub struct ReconSession {
    state: SessionState,
    options: ReconcileOptions,
    tables: Option<(Table, Table)>,
    key: Option<String>,
    result: Option<ReconciliationResult>,
    last_error: Option<String>,
}

impl ReconSession {
    pub fn new(options: ReconcileOptions) -> Self {
        Self {
            state: SessionState::Idle,
            options,
            tables: None,
            key: None,
            result: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loads a new pair of tables, discarding any key and result.
    pub fn load(&mut self, a: Table, b: Table) {
        self.tables = Some((a, b));
        self.key = None;
        self.result = None;
        self.last_error = None;
        self.state = SessionState::FilesLoaded;
    }

    pub fn select_key(&mut self, key: &str) -> Result<(), CruceError> {
        match self.state {
            SessionState::FilesLoaded | SessionState::KeySelected | SessionState::Completed => {
                self.key = Some(key.to_string());
                self.state = SessionState::KeySelected;
                Ok(())
            }
            other => Err(self.invalid(other, "select a key")),
        }
    }

    pub fn run(&mut self) -> Result<&ReconciliationResult, CruceError> {
        self.run_with_progress(&mut LogProgress)
    }

    pub fn run_with_progress(
        &mut self,
        progress: &mut dyn Progress,
    ) -> Result<&ReconciliationResult, CruceError> {
        if !matches!(self.state, SessionState::KeySelected | SessionState::Completed) {
            return Err(self.invalid(self.state, "run"));
        }
        let (Some((a, b)), Some(key)) = (self.tables.as_ref(), self.key.as_deref()) else {
            return Err(self.invalid(self.state, "run"));
        };

        self.state = SessionState::Running;
        match reconcile_with_progress(a, b, key, &self.options, progress) {
            Ok(result) => {
                self.last_error = None;
                self.state = SessionState::Completed;
                Ok(self.result.insert(result))
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.state = SessionState::KeySelected;
                Err(err)
            }
        }
    }

    /// The completed result, if any.
    pub fn result(&self) -> Option<&ReconciliationResult> {
        self.result.as_ref()
    }

    pub fn export(&self, path: &Path, sheets: &ReconcileSettings, include_only_b: bool) -> Result<()> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| self.invalid(self.state, "export"))?;
        export(result, path, sheets, include_only_b)
    }

    fn invalid(&self, state: SessionState, action: &'static str) -> CruceError {
        CruceError::InvalidTransition {
            state: state.to_string(),
            action,
        }
    }
}
