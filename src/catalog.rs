//! Distinct-value catalogs used to populate pickers and lookups.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::CatalogArgs,
    columns::{Role, RoleKeywords, RoleMap},
    config::Settings,
    io_utils::{self, ReadOptions},
    table::Table,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub professional_names: Vec<String>,
    pub professional_documents: Vec<String>,
    pub patient_names: Vec<String>,
    pub patient_documents: Vec<String>,
    pub cities: Vec<String>,
    pub procedures: Vec<String>,
    /// Professional name to document; later rows overwrite earlier ones.
    pub professional_map: BTreeMap<String, String>,
}

pub fn extract_catalog(table: &Table, keywords: &RoleKeywords) -> Catalog {
    let roles = RoleMap::resolve(table.headers(), keywords);
    let distinct = |role: Role| -> Vec<String> {
        let Some(idx) = roles.get(role) else {
            return Vec::new();
        };
        table
            .rows()
            .iter()
            .map(|row| row[idx].as_display().trim().to_string())
            .filter(|value| !value.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    let mut professional_map = BTreeMap::new();
    if let (Some(name_idx), Some(doc_idx)) = (
        roles.get(Role::ProfessionalName),
        roles.get(Role::ProfessionalDocument),
    ) {
        for row in table.rows() {
            let name = row[name_idx].as_display().trim().to_string();
            let document = row[doc_idx].as_display().trim().to_string();
            if !name.is_empty() && !document.is_empty() {
                professional_map.insert(name, document);
            }
        }
    }

    Catalog {
        professional_names: distinct(Role::ProfessionalName),
        professional_documents: distinct(Role::ProfessionalDocument),
        patient_names: distinct(Role::PatientName),
        patient_documents: distinct(Role::PatientDocument),
        cities: distinct(Role::City),
        procedures: distinct(Role::ProcedureName),
        professional_map,
    }
}

pub fn execute(args: &CatalogArgs, settings: &Settings) -> Result<()> {
    let input: PathBuf = args
        .input
        .clone()
        .unwrap_or_else(|| settings.canonical_path.clone());
    let options = ReadOptions::from_cli(args.delimiter, args.input_encoding.as_deref(), None)?;
    let table = io_utils::read_table(&input, &options)
        .with_context(|| format!("Reading {input:?}"))?;
    let catalog = extract_catalog(&table, &settings.role_keywords());

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating catalog file {path:?}"))?,
        )),
        None => Box::new(io::stdout()),
    };
    serde_json::to_writer_pretty(&mut writer, &catalog).context("Serializing catalog")?;
    writeln!(writer)?;
    writer.flush().context("Flushing catalog output")?;
    info!(
        "Catalog from {:?}: {} professional(s), {} patient(s), {} procedure(s), {} city(ies)",
        input,
        catalog.professional_names.len(),
        catalog.patient_names.len(),
        catalog.procedures.len(),
        catalog.cities.len()
    );
    Ok(())
}
