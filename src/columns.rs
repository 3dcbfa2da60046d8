//! Semantic column roles and keyword-based column resolution.
//!
//! Source files never agree on headers, so every consumer asks for a
//! [`Role`] instead of a column name. A role resolves to the first column
//! whose lowercase name contains one of the role's keywords; keywords are
//! tried most-specific first and columns left to right.

use std::{collections::BTreeMap, fmt};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::ColumnsArgs,
    config::Settings,
    io_utils::{self, ReadOptions},
    table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ProfessionalName,
    ProfessionalDocument,
    PatientName,
    PatientDocument,
    ProcedureCode,
    ProcedureName,
    UnitValue,
    Quantity,
    TotalValue,
    City,
    Date,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::ProfessionalName,
        Role::ProfessionalDocument,
        Role::PatientName,
        Role::PatientDocument,
        Role::ProcedureCode,
        Role::ProcedureName,
        Role::UnitValue,
        Role::Quantity,
        Role::TotalValue,
        Role::City,
        Role::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ProfessionalName => "professional_name",
            Role::ProfessionalDocument => "professional_document",
            Role::PatientName => "patient_name",
            Role::PatientDocument => "patient_document",
            Role::ProcedureCode => "procedure_code",
            Role::ProcedureName => "procedure_name",
            Role::UnitValue => "unit_value",
            Role::Quantity => "quantity",
            Role::TotalValue => "total_value",
            Role::City => "city",
            Role::Date => "date",
        }
    }

    /// Built-in keywords, most specific first.
    pub fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            Role::ProfessionalName => &[
                "nombre profesional",
                "nombre del profesional",
                "profesional",
                "medico",
                "médico",
                "professional",
            ],
            Role::ProfessionalDocument => &[
                "documento profesional",
                "doc profesional",
                "documento del profesional",
                "cedula profesional",
                "cédula profesional",
            ],
            Role::PatientName => &[
                "nombre paciente",
                "nombre del paciente",
                "paciente",
                "patient",
            ],
            Role::PatientDocument => &[
                "documento paciente",
                "doc paciente",
                "documento del paciente",
                "identificacion",
                "identificación",
            ],
            Role::ProcedureCode => &[
                "codigo procedimiento",
                "código procedimiento",
                "cod procedimiento",
                "cups",
                "codigo",
                "código",
                "code",
            ],
            Role::ProcedureName => &[
                "nombre procedimiento",
                "nombre del procedimiento",
                "procedimiento",
                "servicio",
                "descripcion",
                "descripción",
                "procedure",
                "nombre",
                "name",
            ],
            Role::UnitValue => &[
                "valor unitario",
                "vr unitario",
                "precio unitario",
                "unit value",
                "unit_value",
                "precio",
                "tarifa",
                "price",
                "valor",
            ],
            Role::Quantity => &["cantidad", "quantity", "qty", "cant"],
            Role::TotalValue => &[
                "valor total",
                "vr total",
                "total value",
                "total_value",
                "total",
            ],
            Role::City => &["municipio", "ciudad", "localidad", "city"],
            Role::Date => &["fecha inicio", "fecha", "date", "inicio"],
        }
    }

    /// Column name used when a consolidation has to add this role's column.
    pub fn canonical_header(&self) -> &'static str {
        match self {
            Role::ProfessionalName => "Nombre profesional",
            Role::ProfessionalDocument => "Documento profesional",
            Role::PatientName => "Nombre paciente",
            Role::PatientDocument => "Documento paciente",
            Role::ProcedureCode => "Codigo procedimiento",
            Role::ProcedureName => "Procedimiento",
            Role::UnitValue => "Valor Unitario",
            Role::Quantity => "Cantidad",
            Role::TotalValue => "Valor Total",
            Role::City => "Municipio",
            Role::Date => "Fecha inicio",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword lists per role; configuration may replace any of them.
#[derive(Debug, Clone, Default)]
pub struct RoleKeywords {
    overrides: BTreeMap<Role, Vec<String>>,
}

impl RoleKeywords {
    pub fn with_overrides(overrides: BTreeMap<Role, Vec<String>>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(role, words)| {
                let words = words
                    .into_iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect::<Vec<_>>();
                (role, words)
            })
            .filter(|(_, words)| !words.is_empty())
            .collect();
        Self { overrides }
    }

    pub fn keywords(&self, role: Role) -> Vec<&str> {
        match self.overrides.get(&role) {
            Some(words) => words.iter().map(String::as_str).collect(),
            None => role.default_keywords().to_vec(),
        }
    }
}

/// Returns the first column matching any keyword, trying keywords in order.
pub fn resolve_column<'a, S: AsRef<str>>(headers: &'a [String], keywords: &[S]) -> Option<&'a str> {
    resolve_index(headers, keywords, &[]).map(|idx| headers[idx].as_str())
}

/// Like [`resolve_column`], returning the position and skipping `excluded` columns.
pub fn resolve_index<S: AsRef<str>>(
    headers: &[String],
    keywords: &[S],
    excluded: &[usize],
) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    keywords.iter().find_map(|keyword| {
        let keyword = keyword.as_ref().trim().to_lowercase();
        if keyword.is_empty() {
            return None;
        }
        lowered
            .iter()
            .enumerate()
            .find(|(idx, header)| !excluded.contains(idx) && header.contains(&keyword))
            .map(|(idx, _)| idx)
    })
}

/// Documents before names, codes before names, totals before unit values.
pub const RESOLUTION_ORDER: [Role; 11] = [
    Role::ProfessionalDocument,
    Role::PatientDocument,
    Role::ProfessionalName,
    Role::PatientName,
    Role::ProcedureCode,
    Role::ProcedureName,
    Role::TotalValue,
    Role::UnitValue,
    Role::Quantity,
    Role::City,
    Role::Date,
];

/// Column positions resolved for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    resolved: BTreeMap<Role, usize>,
}

impl RoleMap {
    /// Resolves every role against `headers`. Roles are claimed in
    /// [`RESOLUTION_ORDER`] and a column claimed by one role is skipped by
    /// the roles after it, so "Documento paciente" never doubles as the
    /// patient name and "Valor Total" never doubles as the unit value.
    pub fn resolve(headers: &[String], keywords: &RoleKeywords) -> Self {
        let mut resolved = BTreeMap::new();
        let mut claimed: Vec<usize> = Vec::new();
        for role in RESOLUTION_ORDER {
            if let Some(idx) = resolve_index(headers, &keywords.keywords(role), &claimed) {
                resolved.insert(role, idx);
                claimed.push(idx);
            }
        }
        Self { resolved }
    }

    pub fn get(&self, role: Role) -> Option<usize> {
        self.resolved.get(&role).copied()
    }

    pub fn insert(&mut self, role: Role, index: usize) {
        self.resolved.insert(role, index);
    }

    pub fn role_of(&self, index: usize) -> Option<Role> {
        self.resolved
            .iter()
            .find(|(_, idx)| **idx == index)
            .map(|(role, _)| *role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, usize)> + '_ {
        self.resolved.iter().map(|(role, idx)| (*role, *idx))
    }
}

pub fn execute(args: &ColumnsArgs, settings: &Settings) -> Result<()> {
    let options = ReadOptions::from_cli(args.delimiter, args.input_encoding.as_deref(), args.sheet.clone())?;
    let loaded = io_utils::read_table(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let keywords = settings.role_keywords();
    let roles = RoleMap::resolve(loaded.headers(), &keywords);

    let rows = Role::ALL
        .iter()
        .map(|role| {
            let column = roles
                .get(*role)
                .map(|idx| loaded.headers()[idx].clone())
                .unwrap_or_else(|| "-".to_string());
            vec![
                role.to_string(),
                column,
                keywords.keywords(*role).iter().join(", "),
            ]
        })
        .collect::<Vec<_>>();
    let headers = vec![
        "role".to_string(),
        "column".to_string(),
        "keywords".to_string(),
    ];
    table::print_table(&headers, &rows);
    info!(
        "Resolved {} of {} role(s) in {:?}",
        roles.iter().count(),
        Role::ALL.len(),
        args.input
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn keyword_order_beats_column_order() {
        let cols = headers(&["Nombre profesional", "Nombre procedimiento"]);
        let found = resolve_column(&cols, &["nombre procedimiento", "nombre"]);
        assert_eq!(found, Some("Nombre procedimiento"));
    }

    #[test]
    fn leftmost_column_wins_for_same_keyword() {
        let cols = headers(&["Valor Neto", "Valor Unitario", "Valor Total"]);
        assert_eq!(resolve_column(&cols, &["valor"]), Some("Valor Neto"));
    }

    #[test]
    fn unresolved_role_is_none() {
        let cols = headers(&["id", "fecha"]);
        assert_eq!(resolve_column(&cols, &["cantidad"]), None);
    }

    #[test]
    fn unit_value_does_not_claim_total_column() {
        let cols = headers(&["Codigo", "Valor Total"]);
        let roles = RoleMap::resolve(&cols, &RoleKeywords::default());
        assert_eq!(roles.get(Role::TotalValue), Some(1));
        assert_eq!(roles.get(Role::UnitValue), None);
    }

    #[test]
    fn documents_are_claimed_before_names() {
        let cols = headers(&["Documento paciente", "Paciente", "Documento profesional", "Profesional"]);
        let roles = RoleMap::resolve(&cols, &RoleKeywords::default());
        assert_eq!(roles.get(Role::PatientDocument), Some(0));
        assert_eq!(roles.get(Role::PatientName), Some(1));
        assert_eq!(roles.get(Role::ProfessionalDocument), Some(2));
        assert_eq!(roles.get(Role::ProfessionalName), Some(3));
    }

    #[test]
    fn procedure_name_skips_professional_name_column() {
        let cols = headers(&["Nombre profesional", "Codigo", "Nombre"]);
        let roles = RoleMap::resolve(&cols, &RoleKeywords::default());
        assert_eq!(roles.get(Role::ProfessionalName), Some(0));
        assert_eq!(roles.get(Role::ProcedureName), Some(2));
    }

    #[test]
    fn overrides_replace_default_keywords() {
        let mut overrides = BTreeMap::new();
        overrides.insert(Role::Quantity, vec![" Unidades ".to_string()]);
        let keywords = RoleKeywords::with_overrides(overrides);
        let cols = headers(&["Cantidad", "Unidades"]);
        let roles = RoleMap::resolve(&cols, &keywords);
        assert_eq!(roles.get(Role::Quantity), Some(1));
    }
}
