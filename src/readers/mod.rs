//! Parsers for the MAGICC file formats.
//!
//! [`read_file`] picks the dialect from the file name and dispatches to the
//! right parser; [`read_str`] does the same for in-memory text. The
//! submodules hold the per-dialect logic, this module the pieces every
//! dialect shares: locating the numeric data block, splitting tagged
//! metadata out of the free-text header, and checking labelled header rows.
use std::path::Path;

use error_stack::{Report, ResultExt};
use indexmap::IndexMap;

use crate::dataset::Dataset;
use crate::dialects::{Dialect, MagiccDefinitions};
use crate::error::{FileLocation, MagiccError, ReadError};
use crate::namelist::{self, NamelistFields};

pub mod notes;
pub(crate) mod prn;
mod scen;
mod standard;

/// "tag: value" labels recognised in the free-text header.
///
/// Anything else stays part of the general header text.
pub const HEADER_TAGS: &[&str] = &[
    "compiled by",
    "contact",
    "data",
    "date",
    "description",
    "gas",
    "magicc-version",
    "run",
    "run_id",
    "source",
    "timeseriestype",
    "unit",
    "units",
];

/// Read a MAGICC file, selecting the dialect from the file name.
pub fn read_file(path: impl AsRef<Path>) -> error_stack::Result<Dataset, MagiccError> {
    let path = path.as_ref();
    let dialect = Dialect::from_path(path).map_err(|e| Report::new(MagiccError::from(e)))?;
    read_file_as(path, dialect)
}

/// Read a MAGICC file as a specific dialect, ignoring the file name suffix.
pub fn read_file_as(path: &Path, dialect: Dialect) -> error_stack::Result<Dataset, MagiccError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Report::new(MagiccError::Read(ReadError::CouldNotRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }))
    })?;
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string());
    let mut dataset = read_str_named(&text, dialect, file_name.as_deref())
        .map_err(|e| Report::new(MagiccError::Read(e)))
        .attach_printable_lazy(|| format!("while parsing {}", path.display()))?;
    dataset.source_path = Some(path.to_path_buf());
    Ok(dataset)
}

/// Parse in-memory text as the given dialect.
///
/// Dialects that infer the variable from the file name (historical
/// emissions `.IN` files with single-row headers) need
/// [`read_str_named`] instead.
pub fn read_str(text: &str, dialect: Dialect) -> Result<Dataset, ReadError> {
    read_str_named(text, dialect, None)
}

/// Parse in-memory text, supplying the file name some dialects take
/// metadata from.
pub fn read_str_named(
    text: &str,
    dialect: Dialect,
    file_name: Option<&str>,
) -> Result<Dataset, ReadError> {
    let definitions = MagiccDefinitions::default();
    match dialect {
        Dialect::Scen => scen::read(text, &definitions),
        Dialect::Prn => prn::read(text, &definitions),
        Dialect::Scen7
        | Dialect::EmisIn
        | Dialect::ConcIn
        | Dialect::OtIn
        | Dialect::RfIn
        | Dialect::SurfaceTempIn
        | Dialect::Mag => {
            standard::read(text, dialect, file_name, &definitions)
        }
    }
}

/// Namelist and header metadata of a file, without its data block.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub dialect: Dialect,
    /// Parsed `&THISFILE_SPECIFICATIONS` fields; empty for dialects
    /// without a namelist.
    pub namelist_fields: NamelistFields,
    /// "tag: value" fields from the free-text header.
    pub descriptor_fields: IndexMap<String, String>,
}

/// Read only the metadata of a file, stopping at the end of the namelist
/// (or, for namelist-free dialects, at the first data line). Much cheaper
/// than [`read_file`] on large files.
pub fn read_metadata(path: impl AsRef<Path>) -> error_stack::Result<FileMetadata, MagiccError> {
    use std::io::BufRead;

    let path = path.as_ref();
    let dialect = Dialect::from_path(path).map_err(|e| Report::new(MagiccError::from(e)))?;
    let file = std::fs::File::open(path).map_err(|e| {
        Report::new(MagiccError::Read(ReadError::CouldNotRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }))
    })?;

    let has_namelist = dialect.descriptor().has_namelist;
    let mut lines = Vec::new();
    let mut in_namelist = false;
    for line in std::io::BufReader::new(file).lines() {
        let line = line.map_err(|e| {
            Report::new(MagiccError::Read(ReadError::CouldNotRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }))
        })?;
        if has_namelist {
            if line.trim_start().starts_with(namelist::NAMELIST_START) {
                in_namelist = true;
            }
            let stop = in_namelist && line.trim_start().starts_with('/');
            lines.push(line);
            if stop {
                break;
            }
        } else {
            if is_numeric_line(&line) {
                break;
            }
            lines.push(line);
        }
    }

    let namelist_fields = if has_namelist {
        let (start, end) = namelist::locate(&lines)
            .map_err(|e| Report::new(MagiccError::from(ReadError::from(e))))
            .attach_printable_lazy(|| format!("while reading {}", path.display()))?;
        let fields = namelist::parse_block(&lines[start..=end], start)
            .map_err(|e| Report::new(MagiccError::from(ReadError::from(e))))?;
        lines.truncate(start);
        fields
    } else {
        NamelistFields::new()
    };

    let header = parse_header(&lines);
    Ok(FileMetadata {
        dialect,
        namelist_fields,
        descriptor_fields: header.descriptor_fields,
    })
}

/// The free-text header split into recognised "tag: value" fields and the
/// remaining general lines.
#[derive(Debug, Default, Clone)]
pub struct HeaderBlock {
    pub descriptor_fields: IndexMap<String, String>,
    pub free_lines: Vec<String>,
}

/// Split tagged metadata out of the free-text header lines.
///
/// A tag repeated across several lines has its values joined with spaces.
pub fn parse_header(lines: &[String]) -> HeaderBlock {
    let mut block = HeaderBlock::default();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();
        let tag = HEADER_TAGS
            .iter()
            .find(|t| lower.starts_with(&format!("{t}:")));
        match tag {
            Some(tag) => {
                let value = trimmed[tag.len() + 1..].trim().to_string();
                block
                    .descriptor_fields
                    .entry(tag.to_string())
                    .and_modify(|existing| {
                        existing.push(' ');
                        existing.push_str(&value);
                    })
                    .or_insert(value);
            }
            None => block.free_lines.push(trimmed.to_string()),
        }
    }
    block
}

/// Whether every whitespace-separated token on the line parses as a number.
pub(crate) fn is_numeric_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return false;
    }
    tokens.all(|t| t.parse::<f64>().is_ok())
}

/// The line spans of a data block and its header rows within `lines`.
///
/// Indices are into the slice handed to [`find_data_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataBlockSpan {
    /// Non-blank lines immediately above the data, bottom-up until a blank
    /// line.
    pub header_start: usize,
    pub data_start: usize,
    /// One past the last data line.
    pub data_end: usize,
}

/// Locate the numeric data block: the first run of all-numeric lines,
/// extended to its full length, with the contiguous non-blank lines above
/// it as header rows.
pub(crate) fn find_data_block(lines: &[String]) -> Result<DataBlockSpan, ReadError> {
    let data_start = lines
        .iter()
        .position(|l| is_numeric_line(l))
        .ok_or_else(|| ReadError::NoDataBlockFound {
            location: FileLocation::default(),
        })?;
    let data_end = lines[data_start..]
        .iter()
        .position(|l| !is_numeric_line(l))
        .map(|offset| data_start + offset)
        .unwrap_or(lines.len());
    let header_start = lines[..data_start]
        .iter()
        .rposition(|l| l.trim().is_empty() || l.trim().starts_with('/'))
        .map(|i| i + 1)
        .unwrap_or(0);
    Ok(DataBlockSpan {
        header_start,
        data_start,
        data_end,
    })
}

/// Check that a header row starts with one of the expected labels and
/// return the remaining tokens.
pub(crate) fn read_labelled_row(
    line: &str,
    line_number: usize,
    expected: &[&str],
) -> Result<Vec<String>, ReadError> {
    let mut tokens = line.split_whitespace();
    let label = tokens.next().unwrap_or_default();
    if !expected
        .iter()
        .any(|e| e.eq_ignore_ascii_case(label))
    {
        return Err(ReadError::header_mismatch(
            FileLocation::at_line(line_number, line),
            format!("expected one of {expected:?} as the row label, got '{label}'"),
        ));
    }
    Ok(tokens.map(|t| t.to_string()).collect())
}

/// Parse one data line into a time value and the per-column values.
pub(crate) fn parse_data_line(
    line: &str,
    line_number: usize,
    expected_columns: usize,
) -> Result<(f64, Vec<f64>), ReadError> {
    let location = || FileLocation::at_line(line_number, line);
    let mut values = Vec::with_capacity(expected_columns + 1);
    for token in line.split_whitespace() {
        let v: f64 = token
            .parse()
            .map_err(|_| ReadError::data(location(), format!("'{token}' is not a number")))?;
        values.push(v);
    }
    if values.is_empty() {
        return Err(ReadError::data(location(), "empty data line"));
    }
    let time = values.remove(0);
    if values.len() != expected_columns {
        return Err(ReadError::InconsistentColumnCount {
            location: location(),
            in_header: expected_columns,
            in_data: values.len(),
        });
    }
    Ok((time, values))
}

pub(crate) fn to_lines(text: &str) -> Vec<String> {
    text.lines().map(|l| l.to_string()).collect()
}
