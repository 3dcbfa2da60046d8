//! The canonical on-disk dataset.
//!
//! There is exactly one canonical file. Writes are last-write-wins and never
//! partial: the new table is serialized into a temporary file next to the
//! target and then renamed over it, so a failed write leaves the previous
//! dataset untouched. The last-updated time is the file's modification time,
//! which also reflects edits made outside this tool.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::{
    io_utils::{self, ReadOptions},
    table::Table,
    workbook::{self, SheetSpec},
};

pub const CANONICAL_SHEET: &str = "Consolidado";

#[derive(Debug, Clone)]
pub struct CanonicalStore {
    path: PathBuf,
}

impl CanonicalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the canonical table, `None` when nothing has been stored yet.
    pub fn load(&self) -> Result<Option<Table>> {
        if !self.exists() {
            return Ok(None);
        }
        let table = io_utils::read_table(&self.path, &ReadOptions::default())
            .with_context(|| format!("Loading canonical dataset {:?}", self.path))?;
        Ok(Some(table))
    }

    /// Replaces the canonical file with `table`.
    pub fn save(&self, table: &Table) -> Result<()> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&directory)
            .with_context(|| format!("Creating directory {directory:?}"))?;

        let mut staged = NamedTempFile::new_in(&directory)
            .with_context(|| format!("Creating temporary file in {directory:?}"))?;
        if io_utils::is_spreadsheet(&self.path) {
            let bytes = workbook::workbook_bytes(&[SheetSpec::new(CANONICAL_SHEET, table)])?;
            staged
                .write_all(&bytes)
                .context("Writing staged workbook")?;
        } else {
            let delimiter = io_utils::resolve_output_delimiter(
                Some(&self.path),
                None,
                io_utils::DEFAULT_CSV_DELIMITER,
            );
            let mut writer =
                io_utils::csv_writer(BufWriter::new(staged.as_file_mut()), delimiter);
            io_utils::write_csv_table(&mut writer, table)?;
        }
        staged
            .as_file()
            .sync_all()
            .context("Syncing staged canonical file")?;
        debug!("Staged canonical dataset at {:?}", staged.path());

        staged
            .persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("Replacing canonical dataset {:?}", self.path))?;
        info!(
            "Canonical dataset {:?} replaced ({} row(s), {} column(s))",
            self.path,
            table.row_count(),
            table.column_count()
        );
        Ok(())
    }

    /// Modification time of the canonical file.
    pub fn last_updated(&self) -> Result<Option<DateTime<Local>>> {
        if !self.exists() {
            return Ok(None);
        }
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Reading modification time of {:?}", self.path))?;
        Ok(Some(DateTime::<Local>::from(modified)))
    }
}
