//! Codec for the Fortran-style `&THISFILE_SPECIFICATIONS ... /` namelist
//! block embedded at the top of every MAGICC data file.
//!
//! This is purely a key/value/typed-scalar codec: which keys exist and what
//! they mean is the writer's and the simulation binary's business. Field
//! order is significant on the wire, so the mapping type preserves
//! insertion order.
use std::fmt::Display;

use indexmap::IndexMap;

use crate::error::{FileLocation, NamelistError};

/// The literal line that opens the specifications block.
pub const NAMELIST_START: &str = "&THISFILE_SPECIFICATIONS";

/// A scalar permitted as a namelist value.
///
/// `Placeholder` renders as its literal token and exists only for the
/// writer's two-pass protocol (see [`crate::writers`]); the parser never
/// produces it.
#[derive(Debug, Clone, PartialEq)]
pub enum NamelistValue {
    Int(i64),
    Float(f64),
    Str(String),
    Placeholder(String),
}

impl Display for NamelistValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Debug formatting keeps a trailing ".0" on whole floats so the
            // value reads back as a float, not an int.
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(v) => write!(f, "\"{v}\""),
            Self::Placeholder(token) => write!(f, "{token}"),
        }
    }
}

impl NamelistValue {
    /// The contained integer, accepting whole floats too.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if *v == v.floor() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// An ordered mapping of uppercase field names to scalar values.
pub type NamelistFields = IndexMap<String, NamelistValue>;

/// Find the start and end line indices (inclusive) of the namelist block.
///
/// The start marker is the first line beginning with `&THISFILE_SPECIFICATIONS`,
/// the end marker the first following line beginning with `/`.
pub fn locate(lines: &[String]) -> Result<(usize, usize), NamelistError> {
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with(NAMELIST_START))
        .ok_or_else(|| NamelistError::MissingStartMarker {
            location: FileLocation::default(),
        })?;
    let end = lines[start..]
        .iter()
        .position(|l| l.trim().starts_with('/'))
        .map(|offset| start + offset)
        .ok_or_else(|| NamelistError::MissingEndMarker {
            location: FileLocation::at_line(start + 1, &lines[start]),
        })?;
    Ok((start, end))
}

/// Parse a complete namelist block (start marker through end marker) from
/// raw text.
pub fn parse(text: &str) -> Result<NamelistFields, NamelistError> {
    let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    let (start, end) = locate(&lines)?;
    parse_block(&lines[start..=end], start)
}

/// Parse the lines of an already-located block. `first_line_number` is the
/// 0-based index of the start marker in the surrounding file, used only for
/// error locations.
pub fn parse_block(
    block: &[String],
    first_line_number: usize,
) -> Result<NamelistFields, NamelistError> {
    let mut fields = NamelistFields::new();
    // skip the start marker and the trailing "/"
    for (i, line) in block.iter().enumerate().skip(1) {
        let trimmed = line.trim();
        if trimmed.starts_with('/') {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }

        let location = || FileLocation::at_line(first_line_number + i + 1, line);
        let (key, value) = trimmed
            .split_once('=')
            .ok_or_else(|| NamelistError::MalformedEntry {
                location: location(),
                cause: "expected 'KEY = VALUE'".to_string(),
            })?;

        let key = key.trim().to_ascii_uppercase();
        if key.is_empty() {
            return Err(NamelistError::MalformedEntry {
                location: location(),
                cause: "empty field name".to_string(),
            });
        }

        // an inline comment may follow the value
        let value = match value.split_once('!') {
            Some((v, _comment)) => v,
            None => value,
        };
        let value = value.trim().trim_end_matches(',').trim();
        let value = parse_scalar(value).ok_or_else(|| NamelistError::MalformedEntry {
            location: location(),
            cause: format!("'{value}' is not a quoted string, integer, or float"),
        })?;

        fields.insert(key, value);
    }
    Ok(fields)
}

fn parse_scalar(s: &str) -> Option<NamelistValue> {
    if s.is_empty() {
        return None;
    }
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote) {
            let inner = inner.strip_suffix(quote)?;
            return Some(NamelistValue::Str(inner.to_string()));
        }
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(NamelistValue::Int(v));
    }
    if let Ok(v) = s.parse::<f64>() {
        if v.is_finite() {
            return Some(NamelistValue::Float(v));
        }
    }
    None
}

/// Render a block in the exact layout MAGICC expects: the start marker, one
/// ` KEY = VALUE ,` line per field with keys left-justified to the longest
/// field name, and a closing `/`.
pub fn render(fields: &NamelistFields) -> String {
    let width = fields.keys().map(|k| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    out.push_str(NAMELIST_START);
    out.push('\n');
    for (key, value) in fields {
        out.push_str(&format!(" {key:<width$} = {value} ,\n"));
    }
    out.push_str("/\n");
    out
}
