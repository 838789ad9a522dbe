#![warn(missing_docs)]
//! Run parameter sweeps of an external optimization solver over aircraft
//! landing instances and collect its KPIs into csv tables.
//!
//! The pipeline is one-directional: raw OR-Library style instance files are
//! converted into the solver's data file syntax, the runway count `R` is
//! patched into the converted file before every run, the solver (`oplrun` by
//! default) is started on a model and the data file, and the metrics found
//! in its console output are appended to one result table per log dialect.
//!
//! Example
//! ```rust,no_run
//! use airland_sweep::config::SweepConfig;
//! use airland_sweep::converter::{self, ConvertOptions};
//! use airland_sweep::sweep::{CancellationToken, SweepContext};
//! # use anyhow::Result;
//!
//! fn example() -> Result<()> {
//!     let config = SweepConfig::default(); // models/, raw_data/, data/, R in 1..=4
//!
//!     // raw_data/airland1.txt -> data/airland1.dat, bad files are reported
//!     let report = converter::convert_dir(
//!         &config.raw_dir,
//!         &config.data_dir,
//!         &ConvertOptions::default(),
//!     )?;
//!     assert!(report.failed.is_empty());
//!
//!     // cp_results.csv and milp_results.csv are truncated here
//!     let mut context = SweepContext::prepare(config)?;
//!     let summary = context.run(&CancellationToken::new())?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

/// Sweep configuration read from json.
pub mod config;

/// Raw instance parsing and conversion into solver data files.
pub mod converter;

/// Data structures shared by the pipeline stages.
pub mod datastructures;

/// Error kinds of the pipeline.
pub mod error;

/// KPI extraction from solver console output.
pub mod kpi;

/// In-place rewriting of the sweep parameter in converted files.
pub mod patcher;

/// Append-only csv result tables.
pub mod result_table;

/// Launching the external solver with a bounded wait.
pub mod solver;

/// Aggregation of result tables.
pub mod summary;

/// The sweep controller.
pub mod sweep;

#[cfg(test)]
mod test_utils;
