use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::result_table::{read_table, KEY_COLUMNS};

const TIME_COLUMN: &str = "Time_sec";
const OBJECTIVE_COLUMN: &str = "Objective";

/// Aggregates a result table per model and parameter value.
///
/// Produces `runs`, `solved` (rows with an objective), `mean_time`,
/// `max_time` and `mean_objective`, sorted by model then parameter.
pub fn summarize(path: &Path) -> Result<DataFrame> {
    let df = read_table(path)
        .with_context(|| format!("reading result table {path:?}"))?;
    summarize_df(df)
}

pub fn summarize_df(df: DataFrame) -> Result<DataFrame> {
    let has = |name: &str| df.get_column_names().contains(&name);
    let as_f64 = |name: &str| col(name).cast(DataType::Float64);

    let mut aggs = vec![count().alias("runs")];
    if has(OBJECTIVE_COLUMN) {
        aggs.push(
            as_f64(OBJECTIVE_COLUMN)
                .is_not_null()
                .cast(DataType::UInt32)
                .sum()
                .alias("solved"),
        );
        aggs.push(as_f64(OBJECTIVE_COLUMN).mean().alias("mean_objective"));
    }
    if has(TIME_COLUMN) {
        aggs.push(as_f64(TIME_COLUMN).mean().alias("mean_time"));
        aggs.push(as_f64(TIME_COLUMN).max().alias("max_time"));
    }
    let keys = [col(KEY_COLUMNS[0]), col(KEY_COLUMNS[2])];
    Ok(df
        .lazy()
        .groupby_stable(keys.clone())
        .agg(aggs)
        .sort_by_exprs(&keys, vec![false, false], false)
        .collect()?)
}
