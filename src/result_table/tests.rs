use std::fs;

use super::*;

fn record(dialect: Dialect, values: &[(&str, KpiValue)]) -> KpiRecord {
    let mut record = KpiRecord::new(dialect);
    for (name, value) in values {
        record.values.insert(name.to_string(), *value);
    }
    record
}

#[test]
fn test_header_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("milp_results.csv");
    let mut table = ResultTable::create(&path, Dialect::Milp).unwrap();
    for parameter in 1..=3 {
        let key = RunKey::new("ClassicalMILP.mod", 1, parameter);
        let rec = record(
            Dialect::Milp,
            &[
                ("Objective", KpiValue::Float(700.0)),
                ("Nodes", KpiValue::Int(41 * parameter)),
            ],
        );
        table.append(&key, &rec).unwrap();
    }
    let text = fs::read_to_string(&path).unwrap();
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], table.columns().join(","));
    assert_eq!(
        text.matches("model,instance id,parameter value").count(),
        1,
        "{text}"
    );

    let df = read_table(&path).unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(
        df.column("parameter value")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        df.column("Nodes")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect::<Vec<_>>(),
        vec![41, 82, 123]
    );
}

#[test]
fn test_missing_metrics_are_empty_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp_results.csv");
    let mut table = ResultTable::create(&path, Dialect::Cp).unwrap();
    table
        .append(&RunKey::new("cp.mod", 2, 4), &KpiRecord::new(Dialect::Cp))
        .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let row = text.lines().nth(1).unwrap();
    let expected_commas = table.columns().len() - 1;
    assert_eq!(row, format!("cp.mod,2,4{}", ",".repeat(expected_commas - 2)));
}

#[test]
fn test_create_truncates_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp_results.csv");
    fs::write(&path, "stale,rows\n1,2\n").unwrap();
    let mut table = ResultTable::create(&path, Dialect::Cp).unwrap();
    assert!(!path.exists());
    table
        .append(&RunKey::new("cp.mod", 1, 1), &KpiRecord::new(Dialect::Cp))
        .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("model,instance id,parameter value,Variables"));
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn test_rejects_foreign_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp_results.csv");
    let mut table = ResultTable::create(&path, Dialect::Cp).unwrap();
    let key = RunKey::new("cp.mod", 1, 1);
    let err = table.append(&key, &KpiRecord::new(Dialect::Milp)).unwrap_err();
    assert!(matches!(err, SweepError::Persistence { .. }));
    let extra = record(Dialect::Cp, &[("Gadgets", KpiValue::Int(1))]);
    assert!(table.append(&key, &extra).is_err());
    assert!(!path.exists());
}
