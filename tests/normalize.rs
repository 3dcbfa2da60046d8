mod common;

use chrono::NaiveDate;
use common::TestWorkspace;
use proptest::prelude::*;
use sheet_cruce::{
    columns::RoleMap,
    data::Value,
    io_utils::{self, ReadOptions},
    normalize::{Normalizer, ValueKind},
    table::Table,
};

fn kind_strategy() -> impl Strategy<Value = ValueKind> {
    prop_oneof![
        Just(ValueKind::String),
        Just(ValueKind::Numeric),
        Just(ValueKind::Date),
        Just(ValueKind::PersonName),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Empty),
        any::<String>().prop_map(Value::from),
        "[0-9 ]{0,6}-? ?[=a-zA-Z\t ]{0,12}".prop_map(Value::from),
        "[$ ]{0,2}[0-9]{1,3}(,[0-9]{3})?(\\.[0-9]{1,2})?".prop_map(Value::from),
        (1i32..9999, 1u32..13, 1u32..29).prop_map(|(y, m, d)| {
            Value::Date(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
        }),
        any::<f64>().prop_map(Value::Number),
    ]
}

proptest! {
    #[test]
    fn normalization_is_idempotent(
        value in value_strategy(),
        kind in kind_strategy(),
        limit in 1usize..64,
    ) {
        let normalizer = Normalizer::new(limit);
        let once = normalizer.normalize_value(&value, kind);
        let twice = normalizer.normalize_value(&once, kind);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn text_never_starts_with_formula_or_holds_control_chars(raw in any::<String>()) {
        let normalizer = Normalizer::new(64);
        if let Value::String(text) = normalizer.normalize_value(&Value::from(raw), ValueKind::String) {
            prop_assert!(!text.starts_with('='));
            prop_assert!(text.chars().all(|c| (c as u32) >= 0x20));
            prop_assert!(text.chars().count() <= 64);
        }
    }

    #[test]
    fn numeric_output_is_always_a_finite_number(value in value_strategy()) {
        let normalized = Normalizer::default().normalize_value(&value, ValueKind::Numeric);
        match normalized {
            Value::Number(n) => prop_assert!(n.is_finite()),
            other => prop_assert!(false, "expected a number, got {:?}", other),
        }
    }
}

#[test]
fn currency_and_thousands_separators_parse() {
    let normalizer = Normalizer::default();
    let parsed = normalizer.normalize_column(
        &[
            Value::from(" $ 1,500 "),
            Value::from("$80"),
            Value::from("2.5"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        ],
        ValueKind::Numeric,
    );
    assert_eq!(
        parsed,
        vec![
            Value::Number(1500.0),
            Value::Number(80.0),
            Value::Number(2.5),
            Value::Number(0.0)
        ]
    );
}

#[test]
fn dates_drop_time_and_reject_numbers() {
    let normalizer = Normalizer::default();
    let parsed = normalizer.normalize_column(
        &[
            Value::from("2024-02-29 14:30:00"),
            Value::from("29.02.2024"),
            Value::Number(45000.0),
        ],
        ValueKind::Date,
    );
    let leap_day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(
        parsed,
        vec![Value::Date(leap_day), Value::Date(leap_day), Value::Empty]
    );
}

fn hostile_table() -> Table {
    let mut table = Table::from_strings(&["Nota", "Paciente"], &[&["=HYPERLINK(\"x\")", "Ana"]]);
    table.push_row(vec![Value::from("línea\u{1}uno\ndos"), Value::from("\tLuis")]);
    let mut normalized = table.clone();
    Normalizer::default().normalize_table(&mut normalized, &RoleMap::default());
    normalized
}

#[test]
fn exported_workbook_holds_neutralized_text() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_xlsx("hostil.xlsx", &hostile_table());

    let reread = io_utils::read_table(&path, &ReadOptions::default()).expect("read workbook");

    assert_eq!(reread.cell(0, 0), &Value::from("'=HYPERLINK(\"x\")"));
    assert_eq!(reread.cell(1, 0), &Value::from("líneaunodos"));
    assert_eq!(reread.cell(1, 1), &Value::from("Luis"));
}

#[test]
fn exported_csv_holds_neutralized_text() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("hostil.csv");
    sheet_cruce::consolidate::export_table(&hostile_table(), &path, None, encoding_rs::UTF_8).expect("export csv");

    let raw = std::fs::read_to_string(&path).expect("read csv");
    assert!(raw.contains("\"'=HYPERLINK(\"\"x\"\")\""));
    assert!(!raw.contains('\u{1}'));
    let reread = io_utils::read_table(&path, &ReadOptions::default()).expect("read csv");
    assert_eq!(reread.row_count(), 2);
    assert_eq!(reread.cell(1, 0), &Value::from("líneaunodos"));
}
