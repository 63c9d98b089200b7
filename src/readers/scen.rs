//! Parser for legacy MAGICC5/6 `.SCEN` scenario files.
//!
//! These have no namelist. The layout is a year count, the two-digit
//! special scen code, three labelled description lines, then one block per
//! region (region name, variable row, unit row, one data row per year).
//! Anything after the last region block is free-text notes.
use log::warn;

use crate::dataset::{Dataset, LogicalRow, DEFAULT_TODO};
use crate::dialects::{Dialect, MagiccDefinitions};
use crate::error::{FileLocation, ReadError};

use super::{parse_data_line, read_labelled_row};

/// Labels accepted for the variable row of a region block.
const VARIABLE_ROW_LABELS: &[&str] = &["YEARS", "YEAR"];
/// Labels accepted for the unit row of a region block.
const UNIT_ROW_LABELS: &[&str] = &["YRS", "YEARS"];

/// The labelled header lines at the top of the file, in order.
const DESCRIPTION_LINES: &[&str] = &["name", "description", "notes"];

pub(crate) fn read(text: &str, definitions: &MagiccDefinitions) -> Result<Dataset, ReadError> {
    // blank lines carry no meaning in this dialect
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ReadError::NoDataBlockFound {
            location: FileLocation::default(),
        });
    }

    let nyears = parse_int(lines[0], "the year count")?;
    if nyears < 1 {
        return Err(ReadError::data(
            FileLocation::at_line(lines[0].0, lines[0].1),
            format!("a scenario needs at least one year, got {nyears}"),
        ));
    }
    let special_code = parse_int(lines[1], "the special scen code")?;
    if !(10..=41).contains(&special_code) {
        warn!("special scen code {special_code} is outside the known 11..41 range");
    }

    let mut dataset = Dataset::new(Dialect::Scen);

    // the description lines are positional; their labels are conventional
    // and some files omit them
    let mut cursor = 2;
    for label in DESCRIPTION_LINES {
        if cursor >= lines.len() || block_starts_at(&lines, cursor) {
            break;
        }
        let (_, line) = lines[cursor];
        let value = line
            .strip_prefix(&format!("{label}:"))
            .map(|v| v.trim())
            .unwrap_or(line);
        dataset
            .descriptor_fields
            .insert(label.to_string(), value.to_string());
        cursor += 1;
    }
    // remaining free header lines before the first region block
    let mut free_lines = Vec::new();
    while cursor < lines.len() && !block_starts_at(&lines, cursor) {
        free_lines.push(lines[cursor].1.to_string());
        cursor += 1;
    }
    if !free_lines.is_empty() {
        dataset
            .descriptor_fields
            .insert("header".to_string(), free_lines.join("\n"));
    }

    let mut read_any_block = false;
    while cursor < lines.len() && block_starts_at(&lines, cursor) {
        cursor = read_region_block(&lines, cursor, nyears, definitions, &mut dataset)?;
        read_any_block = true;
    }
    if !read_any_block {
        return Err(ReadError::NoDataBlockFound {
            location: FileLocation::default(),
        });
    }

    dataset.general_notes = lines[cursor..].iter().map(|(_, l)| l.to_string()).collect();

    Ok(dataset)
}

fn parse_int((line_number, line): (usize, &str), what: &str) -> Result<i64, ReadError> {
    line.parse().map_err(|_| {
        ReadError::data(
            FileLocation::at_line(line_number, line),
            format!("expected {what} as a bare integer, got '{line}'"),
        )
    })
}

/// A region block starts with a single bare token followed by a variable
/// header row.
fn block_starts_at(lines: &[(usize, &str)], i: usize) -> bool {
    let Some((_, candidate)) = lines.get(i) else {
        return false;
    };
    if candidate.split_whitespace().count() != 1 || candidate.contains(':') {
        return false;
    }
    lines.get(i + 1).is_some_and(|(_, next)| {
        next.split_whitespace()
            .next()
            .is_some_and(|label| VARIABLE_ROW_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label)))
    })
}

/// Parse one region block starting at `lines[start]`, append its rows, and
/// return the index just past the block.
fn read_region_block(
    lines: &[(usize, &str)],
    start: usize,
    nyears: i64,
    definitions: &MagiccDefinitions,
    dataset: &mut Dataset,
) -> Result<usize, ReadError> {
    let (region_line_number, region_token) = lines[start];
    let region = definitions.normalise_region(region_token);

    let (vl, variable_line) = lines[start + 1];
    let variables = read_labelled_row(variable_line, vl, VARIABLE_ROW_LABELS)?;

    let Some(&(ul, unit_line)) = lines.get(start + 2) else {
        return Err(ReadError::data(
            FileLocation::at_line(region_line_number, region_token),
            "region block ends before its unit row",
        ));
    };
    let units = read_labelled_row(unit_line, ul, UNIT_ROW_LABELS)?;
    if units.len() != variables.len() {
        return Err(ReadError::header_mismatch(
            FileLocation::at_line(ul, unit_line),
            format!(
                "the unit row names {} column(s) but the variable row names {}",
                units.len(),
                variables.len()
            ),
        ));
    }

    let data_start = start + 3;
    let data_end = data_start + nyears as usize;
    if data_end > lines.len() {
        return Err(ReadError::data(
            FileLocation::at_line(region_line_number, region_token),
            format!(
                "region block declares {nyears} year(s) but only {} line(s) remain",
                lines.len() - data_start
            ),
        ));
    }

    let mut times = Vec::with_capacity(nyears as usize);
    let mut grid: Vec<Vec<f64>> = vec![Vec::new(); variables.len()];
    for &(line_number, line) in &lines[data_start..data_end] {
        let (time, values) = parse_data_line(line, line_number, variables.len())?;
        times.push(time);
        for (col, v) in values.into_iter().enumerate() {
            grid[col].push(v);
        }
    }

    for (col, variable) in variables.iter().enumerate() {
        for (row, time) in times.iter().enumerate() {
            dataset.rows.push(LogicalRow {
                region: region.clone(),
                variable: variable.clone(),
                unit: units[col].clone(),
                todo: DEFAULT_TODO.to_string(),
                time: *time,
                value: grid[col][row],
                notes: Vec::new(),
            });
        }
    }

    Ok(data_end)
}
