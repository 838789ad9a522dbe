use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::Itertools;
use polars::prelude::*;

use crate::datastructures::{Dialect, KpiRecord, KpiValue, RunKey};
use crate::error::SweepError;
use crate::kpi::{self, ValueKind};

#[cfg(test)]
mod tests;

/// Columns identifying a run, in front of every table.
pub const KEY_COLUMNS: [&str; 3] =
    ["model", "instance id", "parameter value"];

/// Append-only csv table of one dialect's results.
///
/// The schema is the run key columns followed by the dialect's full metric
/// vocabulary, so a metric missing from a record is an empty cell rather
/// than a dropped or late-added column. The header is written together with
/// the first row; every append opens and closes the file.
#[derive(Debug)]
pub struct ResultTable {
    path: PathBuf,
    dialect: Dialect,
    metrics: Vec<(&'static str, ValueKind)>,
    header_written: bool,
}

impl ResultTable {
    /// Starts a fresh table at `path`, removing any previous file.
    pub fn create(path: &Path, dialect: Dialect) -> Result<Self, SweepError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .map_err(|e| SweepError::persistence(path, e))?;
        }
        match fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                return Err(SweepError::persistence(path, e))
            }
            _ => (),
        }
        let metrics = kpi::vocabulary(dialect)
            .iter()
            .map(|p| (p.name, p.kind))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            dialect,
            metrics,
            header_written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn columns(&self) -> Vec<&str> {
        KEY_COLUMNS
            .iter()
            .copied()
            .chain(self.metrics.iter().map(|(name, _)| *name))
            .collect()
    }

    fn row(&self, key: &RunKey, record: &KpiRecord) -> PolarsResult<DataFrame> {
        let mut columns = vec![
            Series::new(KEY_COLUMNS[0], &[key.model.as_str()]),
            Series::new(KEY_COLUMNS[1], &[key.instance]),
            Series::new(KEY_COLUMNS[2], &[key.parameter]),
        ];
        for (name, kind) in &self.metrics {
            let value = record.get(name);
            let series = match kind {
                ValueKind::Integer => Series::new(
                    name,
                    &[value.map(|v| match v {
                        KpiValue::Int(i) => i,
                        KpiValue::Float(f) => f as i64,
                    })],
                ),
                ValueKind::Float => {
                    Series::new(name, &[value.map(|v| v.as_f64())])
                }
            };
            columns.push(series);
        }
        DataFrame::new(columns)
    }

    /// Appends one run's record as a row.
    pub fn append(
        &mut self,
        key: &RunKey,
        record: &KpiRecord,
    ) -> Result<(), SweepError> {
        if record.dialect != self.dialect {
            return Err(SweepError::persistence(
                &self.path,
                format!(
                    "{} record cannot go into the {} table",
                    record.dialect, self.dialect
                ),
            ));
        }
        let unknown = record
            .values
            .keys()
            .filter(|k| {
                !self.metrics.iter().any(|(name, _)| *name == k.as_str())
            })
            .collect_vec();
        if !unknown.is_empty() {
            return Err(SweepError::persistence(
                &self.path,
                format!("record has columns outside the schema: {unknown:?}"),
            ));
        }
        let mut df = self
            .row(key, record)
            .map_err(|e| SweepError::persistence(&self.path, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SweepError::persistence(&self.path, e))?;
        CsvWriter::new(&mut file)
            .has_header(!self.header_written)
            .finish(&mut df)
            .map_err(|e| SweepError::persistence(&self.path, e))?;
        self.header_written = true;
        Ok(())
    }
}

/// Reads a result table back into a data frame.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    Ok(CsvReader::from_path(path)?.has_header(true).finish()?)
}
