use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::datastructures::{Dialect, KpiRecord, KpiValue};


/// Integer with optional digit grouping by spaces, non-breaking spaces,
/// commas or apostrophes.
const INT: &str = r"\d[\d,'\p{Zs}]*";
/// Decimal with optional space or comma grouping and a point or comma
/// separator.
const FLOAT: &str = r"-?\d[\d\p{Zs}]*(?:,\d{3})*(?:[.,]\d+)?";

/// Metric that falls back to the node log table when its anchor is absent.
const NODES: &str = "Nodes";

static NODE_TABLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(\d+)[ \t]+\d+").expect("valid node table pattern")
});

/// Numeric type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Stored as `i64`.
    Integer,
    /// Stored as `f64`.
    Float,
}

impl ValueKind {
    /// Normalizes and parses a matched numeric substring.
    pub fn parse(&self, raw: &str) -> Option<KpiValue> {
        match self {
            ValueKind::Integer => normalize_integer(raw).map(KpiValue::Int),
            ValueKind::Float => normalize_float(raw).map(KpiValue::Float),
        }
    }
}

/// Which match wins when an anchor occurs several times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// One-shot summary lines.
    First,
    /// Progress lines where later entries supersede earlier ones.
    Last,
}

/// One metric of a dialect and the anchors it is recovered from.
#[derive(Debug)]
pub struct KpiPattern {
    /// Column name in the result table.
    pub name: &'static str,
    /// How the captured text is parsed.
    pub kind: ValueKind,
    /// Which of several matches is kept.
    pub occurrence: Occurrence,
    alternatives: Vec<Regex>,
}

impl KpiPattern {
    fn new(
        name: &'static str,
        kind: ValueKind,
        occurrence: Occurrence,
        templates: &[&str],
    ) -> Self {
        let alternatives = templates
            .iter()
            .map(|t| {
                Regex::new(&t.replace("{int}", INT).replace("{float}", FLOAT))
                    .expect("valid KPI pattern")
            })
            .collect();
        Self {
            name,
            kind,
            occurrence,
            alternatives,
        }
    }

    /// Raw text captured by the first alternative that matches.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.alternatives
            .iter()
            .find_map(|re| match self.occurrence {
                Occurrence::First => re.captures(text).and_then(|c| c.get(1)),
                Occurrence::Last => {
                    re.captures_iter(text).last().and_then(|c| c.get(1))
                }
            })
            .map(|m| m.as_str())
    }
}

fn first(name: &'static str, kind: ValueKind, template: &str) -> KpiPattern {
    KpiPattern::new(name, kind, Occurrence::First, &[template])
}

fn last(name: &'static str, kind: ValueKind, template: &str) -> KpiPattern {
    KpiPattern::new(name, kind, Occurrence::Last, &[template])
}

static CP_PATTERNS: Lazy<Vec<KpiPattern>> = Lazy::new(|| {
    use ValueKind::*;
    vec![
        first("Variables", Integer, r"Minimization problem - ({int}) variables"),
        first(
            "Constraints",
            Integer,
            r"Minimization problem - {int} variables, ({int}) constraints",
        ),
        first("Memory_MB", Float, r"Total memory usage\s*:\s*({float})\s*MB"),
        first("Time_sec", Float, r"Time spent in solve\s*:\s*({float})s"),
        first("BestObjective", Float, r"Best objective\s*:\s*({float})"),
        first("Objective", Float, r"OBJECTIVE:\s*({float})"),
        first("BestBound", Float, r"Best bound\s*:\s*({float})"),
        first("Branches", Integer, r"Number of branches\s*:\s*({int})"),
        first("Fails", Integer, r"Number of fails\s*:\s*({int})"),
        first(
            "SolutionsFound",
            Integer,
            r"Search completed, ({int}) solutions found",
        ),
    ]
});

static MILP_PATTERNS: Lazy<Vec<KpiPattern>> = Lazy::new(|| {
    use ValueKind::*;
    vec![
        first("Rows", Integer, r"Reduced MIP has ({int}) rows"),
        first(
            "Columns",
            Integer,
            r"Reduced MIP has {int} rows, ({int}) columns",
        ),
        first(
            "Nonzeros",
            Integer,
            r"Reduced MIP has {int} rows, {int} columns, and ({int}) nonzeros",
        ),
        first("Binaries", Integer, r"Reduced MIP has ({int}) binaries"),
        first("Objective", Float, r"OBJECTIVE:\s*({float})"),
        KpiPattern::new(
            "BestBound",
            Float,
            Occurrence::First,
            &[r"Best Bound\s*:\s*({float})", r"Best bound\s*=\s*({float})"],
        ),
        last("GapPercent", Float, r"Gap\s*=\s*({float})%"),
        last("Solutions", Integer, r"solutions = ({int})"),
        last(NODES, Integer, r"Nodes\s*=\s*({int})"),
        last("Iterations", Integer, r"ItCnt\s*=\s*({int})"),
        last("Time_sec", Float, r"Elapsed time\s*=\s*({float}) sec"),
    ]
});

/// Ordered metric vocabulary of a dialect.
pub fn vocabulary(dialect: Dialect) -> &'static [KpiPattern] {
    match dialect {
        Dialect::Cp => &CP_PATTERNS,
        Dialect::Milp => &MILP_PATTERNS,
    }
}

/// Strips grouping characters and parses an integer, e.g. `1 234` or
/// `1\u{a0}234`.
pub fn normalize_integer(raw: &str) -> Option<i64> {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '\''))
        .collect::<String>()
        .parse()
        .ok()
}

/// Strips grouping whitespace and parses a decimal. Next to a decimal point
/// commas are thousands separators (`1,234.5`), otherwise a comma is the
/// decimal separator (`12,5`).
pub fn normalize_float(raw: &str) -> Option<f64> {
    let grouped = raw.contains('.');
    raw.chars()
        .filter(|c| !c.is_whitespace() && !(grouped && *c == ','))
        .map(|c| if c == ',' { '.' } else { c })
        .collect::<String>()
        .parse()
        .ok()
}

/// First component of the last line that starts with two integers, i.e. the
/// furthest node index of a MIP node log.
fn last_node_table_index(output: &str) -> Option<i64> {
    NODE_TABLE_LINE
        .captures_iter(output)
        .last()
        .and_then(|c| c[1].parse().ok())
}

/// Recovers every metric of `dialect` that is present in `output`. Missing
/// or unparsable anchors leave their key out.
pub fn extract(output: &str, dialect: Dialect) -> KpiRecord {
    let mut record = KpiRecord::new(dialect);
    for pattern in vocabulary(dialect) {
        let Some(raw) = pattern.find(output) else {
            continue;
        };
        match pattern.kind.parse(raw) {
            Some(value) => {
                record.values.insert(pattern.name.to_string(), value);
            }
            None => debug!("Unparsable {} value `{raw}`", pattern.name),
        }
    }
    if dialect == Dialect::Milp && !record.values.contains_key(NODES) {
        if let Some(node) = last_node_table_index(output) {
            record.values.insert(NODES.to_string(), KpiValue::Int(node));
        }
    }
    record
}
