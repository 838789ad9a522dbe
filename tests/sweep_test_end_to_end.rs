#![cfg(unix)]

use airland_sweep::datastructures::*;
use airland_sweep::result_table::read_table;
use airland_sweep::sweep::{CancellationToken, SweepContext};
use std::fs;
mod common;
use common::*;

#[test]
fn test_full_sweep_two_dialects() {
    let dir = tempfile::tempdir().unwrap();
    let config = default_config(
        dir.path(),
        &["ClassicalMILP.mod", "ConstraintProgramming.mod"],
    );
    let data_file = config.instance_file(1);
    let mut context = SweepContext::prepare(config).unwrap();
    let summary = context.run(&CancellationToken::new()).unwrap();
    assert_eq!(summary.runs.len(), 8);
    assert_eq!(summary.successes(), 8);

    for dialect in [Dialect::Cp, Dialect::Milp] {
        let path = context.table(dialect).unwrap().path().to_path_buf();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().filter(|l| l.starts_with("model,")).count(),
            1,
            "{text}"
        );
        let df = read_table(&path).unwrap();
        assert_eq!(df.height(), 4);
        let column = |name: &str| {
            df.column(name)
                .unwrap()
                .cast(&polars::prelude::DataType::Float64)
                .unwrap()
                .f64()
                .unwrap()
                .into_no_null_iter()
                .collect::<Vec<_>>()
        };
        assert_eq!(column("parameter value"), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(column("instance id"), vec![1.0; 4]);
        // the fake solver reports 1000 - 100 * R
        assert_eq!(column("Objective"), vec![900.0, 800.0, 700.0, 600.0]);
    }

    // the data file keeps the last value of the sweep
    let text = fs::read_to_string(data_file).unwrap();
    assert!(text.lines().any(|l| l == "R = 4;"));
}

#[test]
fn test_rerun_truncates_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = default_config(dir.path(), &["ConstraintProgramming.mod"]);
    for _ in 0..2 {
        let mut context = SweepContext::prepare(config.clone()).unwrap();
        context.run(&CancellationToken::new()).unwrap();
        let path = context.table(Dialect::Cp).unwrap().path();
        assert_eq!(read_table(path).unwrap().height(), 4);
    }
}
