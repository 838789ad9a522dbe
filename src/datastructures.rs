use core::fmt;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One aircraft landing instance.
///
/// All per-plane vectors have exactly `plane_count` entries and are aligned
/// by index. `separation[(i, j)]` is the minimum time that must elapse after
/// plane `i` lands before plane `j` may land.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub plane_count: usize,
    /// Kept for round-trip fidelity only.
    pub freeze_time: i64,
    pub appearance: Vec<i64>,
    pub earliest: Vec<i64>,
    pub target: Vec<i64>,
    pub latest: Vec<i64>,
    pub earliness_penalty: Vec<i64>,
    pub lateness_penalty: Vec<i64>,
    pub separation: Array2<i64>,
}

impl Instance {
    /// Number of whitespace separated tokens a raw file with `plane_count`
    /// planes must contain, or `None` on overflow.
    pub fn expected_tokens(plane_count: usize) -> Option<usize> {
        plane_count
            .checked_mul(plane_count)?
            .checked_add(plane_count.checked_mul(6)?)?
            .checked_add(2)
    }
}

/// Log vocabulary of a solver engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum Dialect {
    /// Constraint programming engine
    #[serde(rename = "CP")]
    Cp,
    /// Mixed integer programming engine
    #[serde(rename = "MILP")]
    Milp,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Cp => write!(f, "CP"),
            Dialect::Milp => write!(f, "MILP"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CP" => Ok(Dialect::Cp),
            "MILP" | "MIP" => Ok(Dialect::Milp),
            other => Err(format!("unknown dialect `{other}`")),
        }
    }
}

/// A single extracted metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KpiValue {
    Int(i64),
    Float(f64),
}

impl KpiValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            KpiValue::Int(v) => v as f64,
            KpiValue::Float(v) => v,
        }
    }
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Int(v) => write!(f, "{v}"),
            KpiValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Metrics recovered from one solver run. Keys are only present for the
/// anchors that matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiRecord {
    pub dialect: Dialect,
    pub values: BTreeMap<String, KpiValue>,
}

impl KpiRecord {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: &str) -> Option<KpiValue> {
        self.values.get(metric).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Identifies one solver invocation of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey {
    pub model: String,
    pub instance: i64,
    pub parameter: i64,
}

impl RunKey {
    pub fn new(model: impl Into<String>, instance: i64, parameter: i64) -> Self {
        Self {
            model: model.into(),
            instance,
            parameter,
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={} instance={} parameter={}",
            self.model, self.instance, self.parameter
        )
    }
}

/// Wall clock limit for one solver process, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeout {
    seconds: u64,
}

impl Timeout {
    pub fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self { seconds: 3600 }
    }
}

impl FromStr for Timeout {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            seconds: s.trim().parse()?,
        })
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds)
    }
}

/// Inclusive integer range, `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

impl ValueRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<i64> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Which lines the parameter patcher rewrites when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    #[default]
    First,
    All,
}

impl FromStr for PatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(PatchMode::First),
            "all" => Ok(PatchMode::All),
            other => Err(format!("unknown patch mode `{other}`")),
        }
    }
}

/// Position of the separation rows in a raw instance file.
///
/// The default is `Interleaved` because the published instance files are
/// laid out that way. Inputs that list every scalar field before the whole
/// separation matrix, as the format is often described, need `Blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenLayout {
    /// Each plane's separation row follows its six scalar fields
    /// (OR-Library `airland` files).
    #[default]
    Interleaved,
    /// All scalar fields first, then all separation rows.
    Blocked,
}

impl FromStr for TokenLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interleaved" => Ok(TokenLayout::Interleaved),
            "blocked" => Ok(TokenLayout::Blocked),
            other => Err(format!("unknown token layout `{other}`")),
        }
    }
}

/// Observable result of one sweep iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A row was appended, carrying this many metrics.
    Success { metrics: usize },
    Skipped(String),
    Failed(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success { metrics } => {
                write!(f, "success ({metrics} metrics)")
            }
            RunOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            RunOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcomes of a sweep in iteration order.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub runs: Vec<(RunKey, RunOutcome)>,
}

impl SweepSummary {
    pub fn successes(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Success { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RunOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&RunOutcome) -> bool) -> usize {
        self.runs.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} runs: {} succeeded, {} skipped, {} failed",
            self.runs.len(),
            self.successes(),
            self.skipped(),
            self.failed()
        )?;
        for (key, outcome) in &self.runs {
            if !matches!(outcome, RunOutcome::Success { .. }) {
                writeln!(f, "  {key}: {outcome}")?;
            }
        }
        Ok(())
    }
}
