//! Settings file support.
//!
//! Settings are read from YAML (`--config`, or `sheet-cruce.yaml` in the
//! working directory when present). Every field is optional; a missing file
//! yields the defaults.
//!
//! ```yaml
//! canonical_path: data/consolidado.xlsx
//! max_cell_chars: 32700
//! roles:
//!   unit_value: ["valor unitario", "tarifa"]
//! reconcile:
//!   matched_sheet: REPETIDOS
//!   only_a_sheet: NO REPETIDOS
//!   only_b_sheet: SOLO EN B
//!   max_matched_rows: 2000000
//! monthly_goals:
//!   Ana Ruiz: 1500000
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    columns::{Role, RoleKeywords},
    transform::string_ops::MAX_CELL_CHARS,
};

pub const DEFAULT_CONFIG_FILE: &str = "sheet-cruce.yaml";
pub const DEFAULT_CANONICAL_PATH: &str = "consolidado.xlsx";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub canonical_path: PathBuf,
    pub max_cell_chars: usize,
    pub roles: BTreeMap<Role, Vec<String>>,
    pub reconcile: ReconcileSettings,
    pub monthly_goals: BTreeMap<String, f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            canonical_path: PathBuf::from(DEFAULT_CANONICAL_PATH),
            max_cell_chars: MAX_CELL_CHARS,
            roles: BTreeMap::new(),
            reconcile: ReconcileSettings::default(),
            monthly_goals: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub matched_sheet: String,
    pub only_a_sheet: String,
    pub only_b_sheet: String,
    pub max_matched_rows: Option<usize>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            matched_sheet: "REPETIDOS".to_string(),
            only_a_sheet: "NO REPETIDOS".to_string(),
            only_b_sheet: "SOLO EN B".to_string(),
            max_matched_rows: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening settings file {path:?}"))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing settings from {path:?}"))
    }

    /// Loads `explicit` when given, else the default file if it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            debug!("Using settings from {fallback:?}");
            Self::load(fallback)
        } else {
            Ok(Self::default())
        }
    }

    pub fn role_keywords(&self) -> RoleKeywords {
        RoleKeywords::with_overrides(self.roles.clone())
    }

    pub fn goal_for(&self, key: &str) -> Option<f64> {
        self.monthly_goals.get(key).copied().or_else(|| {
            self.monthly_goals
                .iter()
                .find(|(name, _)| name.trim().eq_ignore_ascii_case(key.trim()))
                .map(|(_, goal)| *goal)
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "canonical_path: out/base.csv\nroles:\n  quantity: [unidades]\nmonthly_goals:\n  Ana Ruiz: 1000\n",
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.canonical_path, PathBuf::from("out/base.csv"));
        assert_eq!(settings.max_cell_chars, MAX_CELL_CHARS);
        assert_eq!(settings.reconcile.matched_sheet, "REPETIDOS");
        assert_eq!(settings.role_keywords().keywords(Role::Quantity), vec!["unidades"]);
        assert_eq!(settings.goal_for("ana ruiz"), Some(1000.0));
    }

    #[test]
    fn blank_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "\n  \n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.canonical_path, PathBuf::from(DEFAULT_CANONICAL_PATH));
        assert!(settings.monthly_goals.is_empty());
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "max_cell_chars: [1, 2\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("settings.yaml"));
    }
}
