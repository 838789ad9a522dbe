use std::fs;
use std::path::Path;

use log::debug;

use crate::datastructures::PatchMode;
use crate::error::SweepError;


fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Whether `line` assigns the scalar `name`, e.g. `R = 2;` or `  R=2;`.
fn assigns(line: &str, name: &str) -> bool {
    line.trim_start()
        .strip_prefix(name)
        .map_or(false, |rest| rest.trim_start().starts_with('='))
}

/// Rewrites the assignment of `name` in `text` to `value`, returning the new
/// text and the number of rewritten lines. Every other line, and the
/// indentation, anything after the `;` and the terminator of the patched
/// line, are kept verbatim.
pub fn patch_text(
    text: &str,
    name: &str,
    value: i64,
    mode: PatchMode,
) -> (String, usize) {
    let mut patched = 0;
    let mut out = String::with_capacity(text.len() + 8);
    for line in text.split_inclusive('\n') {
        let (body, terminator) = split_terminator(line);
        let wanted = patched == 0 || mode == PatchMode::All;
        if wanted && assigns(body, name) {
            let indent = &body[..body.len() - body.trim_start().len()];
            let trailer = body.split_once(';').map_or("", |(_, rest)| rest);
            out.push_str(indent);
            out.push_str(&format!("{name} = {value};"));
            out.push_str(trailer);
            out.push_str(terminator);
            patched += 1;
        } else {
            out.push_str(line);
        }
    }
    (out, patched)
}

/// Sets the scalar `name` of the converted file at `path` to `value` in
/// place.
///
/// Fails with [`SweepError::ParameterNotFound`] and leaves the file
/// untouched when no line assigns `name`.
pub fn patch_parameter(
    path: &Path,
    name: &str,
    value: i64,
    mode: PatchMode,
) -> Result<usize, SweepError> {
    let text = fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
    let (patched_text, count) = patch_text(&text, name, value, mode);
    if count == 0 {
        return Err(SweepError::ParameterNotFound {
            path: path.to_path_buf(),
            name: name.to_string(),
        });
    }
    fs::write(path, patched_text).map_err(|e| SweepError::io(path, e))?;
    debug!("Set {name} = {value} in {:?} ({count} lines)", path);
    Ok(count)
}
