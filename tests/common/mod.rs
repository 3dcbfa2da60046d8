#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sheet_cruce::table::Table;
use sheet_cruce::workbook::{self, SheetSpec};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes `table` as a single-sheet workbook under the workspace.
    pub fn write_xlsx(&self, name: &str, table: &Table) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        workbook::write_workbook(&[SheetSpec::new("Hoja1", table)], &path)
            .expect("write workbook");
        path
    }
}

/// Primary activity rows used across consolidation tests.
pub const PRIMARY_CSV: &str = "\
Fecha inicio,Nombre profesional,Documento profesional,Documento paciente,Nombre paciente,Codigo,Procedimiento,Cantidad,Municipio
05/03/2024,101 Ana Ruiz,52000111,1001,Carlos Pérez,A1,Consulta general,2,Cali
2024-03-18,Ana Ruiz,52000111,1002,Lucía Gómez,B2,Terapia física,,Palmira
07/04/2024,Luis Mora,80000222,1001,Carlos Pérez,Z9,Terapia respiratoria,1,Cali
";

/// Reference prices keyed by code and procedure name.
pub const REFERENCE_CSV: &str = "\
Codigo,Procedimiento,Valor Unitario
A1,Consulta general,100
B2,Terapia física,50
X7,Terapia respiratoria,80
";
