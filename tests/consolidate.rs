mod common;

use chrono::NaiveDate;
use common::{PRIMARY_CSV, REFERENCE_CSV, TestWorkspace};
use sheet_cruce::{
    consolidate::{ConsolidateOptions, Strategy, consolidate, consolidate_into_store, consolidate_with_progress},
    data::Value,
    io_utils::{self, ReadOptions},
    progress::Phase,
    store::CanonicalStore,
    table::Table,
};

fn column(table: &Table, name: &str) -> Vec<Value> {
    let idx = table
        .column_index(name)
        .unwrap_or_else(|| panic!("column '{name}' missing from {:?}", table.headers()));
    table.column_values(idx)
}

fn load_fixtures(workspace: &TestWorkspace) -> (Table, Table) {
    let primary_path = workspace.write("actividad.csv", PRIMARY_CSV);
    let reference_path = workspace.write("tarifas.csv", REFERENCE_CSV);
    let primary = io_utils::read_table(&primary_path, &ReadOptions::default()).expect("primary");
    let reference =
        io_utils::read_table(&reference_path, &ReadOptions::default()).expect("reference");
    (primary, reference)
}

#[test]
fn prices_by_code_and_computes_totals() {
    let primary = Table::from_strings(&["code", "qty"], &[&["A1", "2"], &["B2", "1"]]);
    let reference = Table::from_strings(
        &["code", "name", "unit_value"],
        &[&["A1", "", "100"], &["B2", "x", "50"]],
    );

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(
        result.strategy,
        Strategy::Joined {
            by_code: true,
            by_name: false
        }
    );
    assert_eq!(
        column(&result.table, "Valor Total"),
        vec![Value::Number(200.0), Value::Number(50.0)]
    );
    assert_eq!(
        column(&result.table, "Valor Unitario"),
        vec![Value::Number(100.0), Value::Number(50.0)]
    );
    assert_eq!(result.stats.matched_by_code, 2);
    assert_eq!(result.stats.unmatched, 0);
}

#[test]
fn falls_back_to_name_then_own_value() {
    let primary = Table::from_strings(
        &["Codigo", "Procedimiento", "Valor", "Cantidad"],
        &[
            &["Z9", "Terapia respiratoria", "10", "1"],
            &["Q1", "Sin tarifa", "35", "2"],
            &["Q2", "Sin tarifa", "abc", "3"],
        ],
    );
    let reference = Table::from_strings(
        &["Codigo", "Procedimiento", "Valor Unitario"],
        &[&["X7", " TERAPIA RESPIRATORIA ", "80"]],
    );

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(
        column(&result.table, "Valor"),
        vec![Value::Number(80.0), Value::Number(35.0), Value::Number(0.0)]
    );
    assert_eq!(
        column(&result.table, "Valor Total"),
        vec![Value::Number(80.0), Value::Number(70.0), Value::Number(0.0)]
    );
    assert_eq!(result.stats.matched_by_name, 1);
    assert_eq!(result.stats.unmatched, 2);
    assert!(result.table.column_index("Valor Unitario").is_none());
}

#[test]
fn fixture_consolidation_keeps_rows_and_normalizes_columns() {
    let workspace = TestWorkspace::new();
    let (primary, reference) = load_fixtures(&workspace);

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(result.table.row_count(), primary.row_count());
    assert_eq!(result.stats.matched_by_code, 2);
    assert_eq!(result.stats.matched_by_name, 1);
    assert_eq!(
        column(&result.table, "Valor Total"),
        vec![Value::Number(200.0), Value::Number(50.0), Value::Number(80.0)]
    );
    assert_eq!(
        column(&result.table, "Cantidad"),
        vec![Value::Number(2.0), Value::Number(1.0), Value::Number(1.0)]
    );
    assert_eq!(
        column(&result.table, "Fecha inicio"),
        vec![
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 4, 7).unwrap()),
        ]
    );
    assert_eq!(
        column(&result.table, "Nombre profesional")[0],
        Value::from("Ana Ruiz")
    );
}

#[test]
fn total_equals_unit_times_quantity_for_every_row() {
    let workspace = TestWorkspace::new();
    let (primary, reference) = load_fixtures(&workspace);
    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    let units = column(&result.table, "Valor Unitario");
    let quantities = column(&result.table, "Cantidad");
    let totals = column(&result.table, "Valor Total");
    for ((unit, quantity), total) in units.iter().zip(&quantities).zip(&totals) {
        let expected = unit.as_number().unwrap() * quantity.as_number().unwrap();
        assert_eq!(total.as_number().unwrap(), expected);
    }
}

#[test]
fn concatenates_when_tables_cannot_be_joined() {
    let primary = Table::from_strings(&["Paciente", "Municipio"], &[&["Ana", "Cali"]]);
    let reference = Table::from_strings(&["Paciente", "Nota"], &[&["Luis", "=1+1"]]);

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(result.strategy, Strategy::Concatenated);
    assert_eq!(result.notices.len(), 1);
    assert_eq!(result.table.headers(), &["Paciente", "Municipio", "Nota"]);
    assert_eq!(result.table.row_count(), 2);
    assert_eq!(result.table.cell(1, 2), &Value::from("'=1+1"));
    assert_eq!(result.table.cell(1, 1), &Value::Empty);
}

#[test]
fn duplicate_and_padded_column_names_are_collapsed() {
    let primary = Table::from_strings(
        &[" Codigo ", "Cantidad", "Codigo"],
        &[&["A1", "3", "ignored"]],
    );
    let reference = Table::from_strings(&["Codigo", "Valor Unitario"], &[&["A1", "10"]]);

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(
        result.table.headers(),
        &["Codigo", "Cantidad", "Valor Unitario", "Valor Total"]
    );
    assert_eq!(result.table.cell(0, 3), &Value::Number(30.0));
}

#[test]
fn reports_phases_in_order() {
    let primary = Table::from_strings(&["code", "qty"], &[&["A1", "2"]]);
    let reference = Table::from_strings(&["code", "unit_value"], &[&["A1", "5"]]);
    let mut phases = Vec::new();
    let mut observer = |phase: Phase| phases.push(phase);

    consolidate_with_progress(&primary, &reference, &ConsolidateOptions::default(), &mut observer);

    assert_eq!(phases, vec![Phase::Parsed, Phase::LookupBuilt, Phase::Joined]);
}

#[test]
fn consolidation_replaces_canonical_store() {
    let workspace = TestWorkspace::new();
    let (primary, reference) = load_fixtures(&workspace);
    let store = CanonicalStore::new(workspace.path().join("data").join("consolidado.xlsx"));
    let mut quiet = |_: Phase| {};

    let (result, last_updated) = consolidate_into_store(
        &primary,
        &reference,
        &ConsolidateOptions::default(),
        &store,
        &mut quiet,
    )
    .expect("consolidate into store");

    assert!(last_updated.is_some());
    let stored = store.load().expect("load").expect("canonical exists");
    assert_eq!(stored.headers(), result.table.headers());
    assert_eq!(stored.row_count(), 3);
    let total_idx = stored.column_index("Valor Total").unwrap();
    assert_eq!(stored.cell(0, total_idx), &Value::Number(200.0));
    let date_idx = stored.column_index("Fecha inicio").unwrap();
    assert_eq!(
        stored.cell(2, date_idx),
        &Value::Date(NaiveDate::from_ymd_opt(2024, 4, 7).unwrap())
    );
}

#[test]
fn unit_value_header_with_date_word_stays_numeric() {
    let primary = Table::from_strings(&["Codigo", "Valor final", "Cantidad"], &[&["Z9", "40", "2"]]);
    let reference = Table::from_strings(&["Codigo", "Valor Unitario"], &[&["A1", "100"]]);

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(column(&result.table, "Valor final"), vec![Value::Number(40.0)]);
    assert_eq!(column(&result.table, "Valor Total"), vec![Value::Number(80.0)]);
    assert_eq!(result.stats.unmatched, 1);
}

#[test]
fn reference_without_rows_keeps_every_primary_row_and_price() {
    let primary = Table::from_strings(
        &["Codigo", "Valor", "Cantidad"],
        &[&["A1", "7", "2"], &["B2", "3", "1"]],
    );
    let reference = Table::from_strings(&["Codigo", "Valor Unitario"], &[]);

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(
        result.strategy,
        Strategy::Joined {
            by_code: true,
            by_name: false
        }
    );
    assert_eq!(result.table.row_count(), primary.row_count());
    assert_eq!(
        column(&result.table, "Valor"),
        vec![Value::Number(7.0), Value::Number(3.0)]
    );
    assert_eq!(
        column(&result.table, "Valor Total"),
        vec![Value::Number(14.0), Value::Number(3.0)]
    );
    assert_eq!(result.stats.unmatched, 2);
    assert!(result.notices.iter().any(|n| n.contains("no reference price")));
}

#[test]
fn reference_without_columns_falls_back_to_primary_rows() {
    let primary = Table::from_strings(
        &["Codigo", "Valor", "Cantidad"],
        &[&["A1", "7", "2"], &["B2", "3", "1"]],
    );
    let reference = Table::new(Vec::new());

    let result = consolidate(&primary, &reference, &ConsolidateOptions::default());

    assert_eq!(result.strategy, Strategy::Concatenated);
    assert_eq!(result.notices.len(), 1);
    assert_eq!(result.table.headers(), &["Codigo", "Valor", "Cantidad"]);
    assert_eq!(result.table.row_count(), primary.row_count());
    assert_eq!(
        column(&result.table, "Valor"),
        vec![Value::Number(7.0), Value::Number(3.0)]
    );
}
