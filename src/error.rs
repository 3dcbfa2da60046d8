use std::path::PathBuf;

use thiserror::Error;

/// Which input of a two-table operation an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// Structural failures surfaced to callers. Per-cell problems never end up
/// here; they are replaced by defaults during normalization.
#[derive(Debug, Error)]
pub enum CruceError {
    #[error("key column '{column}' not found in table {side}")]
    MissingKeyColumn { side: Side, column: String },

    #[error("reconciliation would produce {rows} matched row(s), more than can be held in memory")]
    ResourceExhausted { rows: usize },

    #[error("cannot {action} while the session is {state}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("workbook {0:?} contains no sheets")]
    EmptyWorkbook(PathBuf),
}
