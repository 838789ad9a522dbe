use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::datastructures::{
    Dialect, PatchMode, Timeout, TokenLayout, ValueRange,
};

/// Settings of a full sweep, usually read from a json file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_solver")]
    pub solver: String,
    /// Extra arguments placed before the model and data paths.
    #[serde(default)]
    pub solver_args: Vec<String>,
    #[serde(default)]
    pub timeout: Timeout,
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,
    #[serde(default = "default_instances")]
    pub instances: ValueRange,
    #[serde(default)]
    pub parameter: ParameterConfig,
    #[serde(default)]
    pub layout: TokenLayout,
    #[serde(default = "default_dialects")]
    pub dialects: BTreeMap<String, Dialect>,
    #[serde(default = "default_tables")]
    pub tables: BTreeMap<Dialect, String>,
}

/// The scalar that is rewritten before every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    #[serde(default = "default_parameter_name")]
    pub name: String,
    #[serde(default = "default_parameter_range")]
    pub range: ValueRange,
    #[serde(default)]
    pub patch_mode: PatchMode,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            name: default_parameter_name(),
            range: default_parameter_range(),
            patch_mode: PatchMode::default(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            solver: default_solver(),
            solver_args: vec![],
            timeout: Timeout::default(),
            models_dir: default_models_dir(),
            data_dir: default_data_dir(),
            raw_dir: default_raw_dir(),
            out_dir: default_out_dir(),
            instance_prefix: default_instance_prefix(),
            instances: default_instances(),
            parameter: ParameterConfig::default(),
            layout: TokenLayout::default(),
            dialects: default_dialects(),
            tables: default_tables(),
        }
    }
}

impl SweepConfig {
    pub fn from_file(path: &Path) -> Result<SweepConfig> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("reading config {path:?}"))?;
        let config: SweepConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("parsing config {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.instances.is_empty(),
            "empty instance range {:?}",
            self.instances
        );
        anyhow::ensure!(
            !self.parameter.range.is_empty(),
            "empty parameter range {:?}",
            self.parameter.range
        );
        anyhow::ensure!(
            !self.parameter.name.trim().is_empty(),
            "parameter name must not be empty"
        );
        for dialect in self.dialects.values() {
            anyhow::ensure!(
                self.tables.contains_key(dialect),
                "no result table configured for dialect {dialect}"
            );
        }
        Ok(())
    }

    /// Converted data file of instance number `instance`.
    pub fn instance_file(&self, instance: i64) -> PathBuf {
        self.data_dir
            .join(format!("{}{}.dat", self.instance_prefix, instance))
    }
}

fn default_solver() -> String {
    "oplrun".to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("raw_data")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_instance_prefix() -> String {
    "airland".to_string()
}

fn default_instances() -> ValueRange {
    ValueRange::new(1, 8)
}

fn default_parameter_name() -> String {
    "R".to_string()
}

fn default_parameter_range() -> ValueRange {
    ValueRange::new(1, 4)
}

fn default_dialects() -> BTreeMap<String, Dialect> {
    BTreeMap::from([
        ("ConstraintProgramming.mod".to_string(), Dialect::Cp),
        ("ClassicalMILP.mod".to_string(), Dialect::Milp),
    ])
}

fn default_tables() -> BTreeMap<Dialect, String> {
    BTreeMap::from([
        (Dialect::Cp, "cp_results.csv".to_string()),
        (Dialect::Milp, "milp_results.csv".to_string()),
    ])
}
