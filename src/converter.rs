use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{info, warn};
use ndarray::Array2;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::datastructures::{Instance, TokenLayout};
use crate::error::SweepError;


/// Marker of the comment line that carries the freeze time in a converted
/// file.
const FREEZE_COMMENT: &str = "// freeze =";

static BRACKETED_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]").expect("valid row pattern"));

/// A raw token, typed by whether it carries a decimal point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// Token without a decimal point.
    Int(i64),
    /// Token with a decimal point.
    Float(f64),
}

impl Token {
    fn as_int(&self) -> Option<i64> {
        match *self {
            Token::Int(v) => Some(v),
            Token::Float(v) if v.fract() == 0.0 => Some(v as i64),
            Token::Float(_) => None,
        }
    }
}

/// Settings for writing converted files.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Token order of the raw files.
    pub layout: TokenLayout,
    /// Name of the patchable scalar written into every converted file.
    pub parameter: String,
    /// Value the parameter starts with.
    pub initial_value: i64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            layout: TokenLayout::default(),
            parameter: "R".to_string(),
            initial_value: 1,
        }
    }
}

/// Outcome of a batch conversion. Failed files do not stop the batch.
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Written data files.
    pub converted: Vec<PathBuf>,
    /// Rejected raw files and why.
    pub failed: Vec<(PathBuf, SweepError)>,
}

/// Splits raw file content into a flat token stream, ignoring line
/// structure.
pub fn tokenize(content: &str, path: &Path) -> Result<Vec<Token>, SweepError> {
    content
        .split_whitespace()
        .map(|t| {
            let token = if t.contains('.') {
                t.parse::<f64>().ok().map(Token::Float)
            } else {
                t.parse::<i64>().ok().map(Token::Int)
            };
            token.ok_or_else(|| {
                SweepError::malformed(path, format!("invalid token `{t}`"))
            })
        })
        .collect()
}

/// Decodes a token stream into an [`Instance`].
///
/// The stream must contain exactly `2 + 6P + P²` tokens for the declared
/// plane count `P`.
pub fn parse_instance(
    tokens: &[Token],
    layout: TokenLayout,
    path: &Path,
) -> Result<Instance, SweepError> {
    let int_at = |idx: usize| -> Result<i64, SweepError> {
        let token = tokens.get(idx).ok_or_else(|| {
            SweepError::malformed(path, format!("missing token {idx}"))
        })?;
        token.as_int().ok_or_else(|| {
            SweepError::malformed(
                path,
                format!("token {idx} ({token:?}) is not an integer"),
            )
        })
    };
    let plane_count = int_at(0)?;
    if plane_count <= 0 {
        return Err(SweepError::malformed(
            path,
            format!("plane count must be positive, got {plane_count}"),
        ));
    }
    let p = plane_count as usize;
    let freeze_time = int_at(1)?;
    let expected = Instance::expected_tokens(p).ok_or_else(|| {
        SweepError::malformed(path, format!("plane count {p} too large"))
    })?;
    if tokens.len() != expected {
        return Err(SweepError::malformed(
            path,
            format!(
                "expected {expected} tokens for {p} planes, found {}",
                tokens.len()
            ),
        ));
    }

    // offsets of the first scalar field and first separation value of
    // plane i
    let (scalar_at, row_at): (
        Box<dyn Fn(usize) -> usize>,
        Box<dyn Fn(usize) -> usize>,
    ) = match layout {
        TokenLayout::Interleaved => (
            Box::new(move |i| 2 + i * (6 + p)),
            Box::new(move |i| 2 + i * (6 + p) + 6),
        ),
        TokenLayout::Blocked => (
            Box::new(move |i| 2 + i * 6),
            Box::new(move |i| 2 + 6 * p + i * p),
        ),
    };

    let mut fields = vec![Vec::with_capacity(p); 6];
    let mut separation = Array2::<i64>::zeros((p, p));
    for i in 0..p {
        for (f, field) in fields.iter_mut().enumerate() {
            field.push(int_at(scalar_at(i) + f)?);
        }
        for j in 0..p {
            separation[(i, j)] = int_at(row_at(i) + j)?;
        }
    }
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    Ok(Instance {
        plane_count: p,
        freeze_time,
        appearance: next(),
        earliest: next(),
        target: next(),
        latest: next(),
        earliness_penalty: next(),
        lateness_penalty: next(),
        separation,
    })
}

/// Reads and decodes a raw instance file.
pub fn read_raw_instance(
    path: &Path,
    layout: TokenLayout,
) -> Result<Instance, SweepError> {
    let content =
        fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
    let tokens = tokenize(&content, path)?;
    parse_instance(&tokens, layout, path)
}

fn join_values(values: impl IntoIterator<Item = i64>) -> String {
    values.into_iter().join(",")
}

/// Renders an instance in the solver's data file syntax.
pub fn to_dat(instance: &Instance, parameter: &str, value: i64) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out, "{FREEZE_COMMENT} {};", instance.freeze_time);
    let _ = writeln!(out, "P = {};", instance.plane_count);
    let _ = writeln!(out, "{parameter} = {value};");
    for (name, values) in [
        ("Ai", &instance.appearance),
        ("Ei", &instance.earliest),
        ("Ti", &instance.target),
        ("Li", &instance.latest),
        ("gi", &instance.earliness_penalty),
        ("hi", &instance.lateness_penalty),
    ] {
        let _ = writeln!(
            out,
            "{name} = [{}];",
            join_values(values.iter().copied())
        );
    }
    out.push_str("S = [\n");
    for row in instance.separation.rows() {
        let _ = writeln!(out, "  [{}],", join_values(row.iter().copied()));
    }
    out.push_str("];\n");
    out
}

#[derive(Debug)]
enum DatValue {
    Scalar(i64),
    Vector(Vec<i64>),
    Matrix(Vec<Vec<i64>>),
}

fn parse_list(body: &str) -> Option<Vec<i64>> {
    body.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse().ok())
        .collect()
}

fn parse_dat_value(raw: &str) -> Option<DatValue> {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']'))
    else {
        return raw.parse().ok().map(DatValue::Scalar);
    };
    if inner.contains('[') {
        BRACKETED_ROW
            .captures_iter(inner)
            .map(|c| parse_list(&c[1]))
            .collect::<Option<Vec<_>>>()
            .map(DatValue::Matrix)
    } else {
        parse_list(inner).map(DatValue::Vector)
    }
}

/// Reads a converted data file back into an [`Instance`].
pub fn parse_dat(text: &str, path: &Path) -> Result<Instance, SweepError> {
    let mut freeze_time = None;
    let mut statements = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(FREEZE_COMMENT) {
            freeze_time = rest.trim().trim_end_matches(';').trim().parse().ok();
            continue;
        }
        let code = trimmed.split("//").next().unwrap_or_default();
        statements.push_str(code);
        statements.push('\n');
    }

    let mut values = HashMap::new();
    for statement in statements.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        let (name, raw) = statement.split_once('=').ok_or_else(|| {
            SweepError::malformed(path, format!("no assignment: {statement}"))
        })?;
        let value = parse_dat_value(raw).ok_or_else(|| {
            let name = name.trim();
            SweepError::malformed(path, format!("bad value for {name}"))
        })?;
        values.insert(name.trim().to_string(), value);
    }

    let plane_count = match values.get("P") {
        Some(DatValue::Scalar(p)) if *p > 0 => *p as usize,
        _ => return Err(SweepError::malformed(path, "missing plane count P")),
    };
    let mut vector = |name: &str| -> Result<Vec<i64>, SweepError> {
        match values.remove(name) {
            Some(DatValue::Vector(v)) if v.len() == plane_count => Ok(v),
            _ => Err(SweepError::malformed(
                path,
                format!("{name} must hold {plane_count} values"),
            )),
        }
    };
    let appearance = vector("Ai")?;
    let earliest = vector("Ei")?;
    let target = vector("Ti")?;
    let latest = vector("Li")?;
    let earliness_penalty = vector("gi")?;
    let lateness_penalty = vector("hi")?;
    let rows = match values.remove("S") {
        Some(DatValue::Matrix(rows))
            if rows.len() == plane_count
                && rows.iter().all(|r| r.len() == plane_count) =>
        {
            rows
        }
        _ => {
            return Err(SweepError::malformed(
                path,
                format!("S must be a {plane_count}x{plane_count} matrix"),
            ))
        }
    };
    let separation = Array2::from_shape_vec(
        (plane_count, plane_count),
        rows.into_iter().flatten().collect(),
    )
    .map_err(|e| SweepError::malformed(path, e.to_string()))?;

    Ok(Instance {
        plane_count,
        freeze_time: freeze_time.unwrap_or_default(),
        appearance,
        earliest,
        target,
        latest,
        earliness_penalty,
        lateness_penalty,
        separation,
    })
}

/// Converts one raw file into `out_dir`, returning the written path. Nothing
/// is written when the raw file is malformed.
pub fn convert_file(
    raw: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<PathBuf, SweepError> {
    let instance = read_raw_instance(raw, options.layout)?;
    let content =
        to_dat(&instance, &options.parameter, options.initial_value);
    let file_name = raw.file_stem().ok_or_else(|| {
        SweepError::malformed(raw, "input path has no file name")
    })?;
    let out = out_dir.join(format!("{}.dat", file_name.to_string_lossy()));
    fs::write(&out, content).map_err(|e| SweepError::io(&out, e))?;
    Ok(out)
}

/// Converts every `.txt` file of `raw_dir` into `out_dir`. A failing file is
/// logged and recorded; the rest of the batch still runs.
pub fn convert_dir(
    raw_dir: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport, SweepError> {
    fs::create_dir_all(out_dir).map_err(|e| SweepError::io(out_dir, e))?;
    let inputs = fs::read_dir(raw_dir)
        .map_err(|e| SweepError::io(raw_dir, e))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().map_or(false, |ext| ext == "txt")
        })
        .sorted()
        .collect_vec();

    let mut report = ConversionReport::default();
    for raw in inputs {
        match convert_file(&raw, out_dir, options) {
            Ok(out) => {
                info!("Wrote {:?} from {:?}", out, raw);
                report.converted.push(out);
            }
            Err(err) => {
                warn!("Skipping {:?}: {err}", raw);
                report.failed.push((raw, err));
            }
        }
    }
    Ok(report)
}
