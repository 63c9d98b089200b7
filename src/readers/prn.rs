//! Parser for legacy `.prn` files of halogenated-gas timeseries.
//!
//! These are global-only, fixed-width files with no namelist. The first
//! line is an indicator line the model skips, free header text follows,
//! then a single header row of 10-character gas columns and data rows
//! starting with a 4-digit year. A "unit" header tag decides whether the
//! file holds concentrations ("ppt") or emissions ("metric tons").
use std::sync::OnceLock;

use regex::Regex;

use crate::dataset::{Dataset, LogicalRow, DEFAULT_TODO};
use crate::dialects::{Dialect, MagiccDefinitions};
use crate::error::{FileLocation, ReadError};

use super::{parse_header, to_lines};

/// Width of every gas column, including padding.
pub(crate) const GAS_COLUMN_WIDTH: usize = 10;
/// Width of the year column.
pub(crate) const YEAR_COLUMN_WIDTH: usize = 4;

/// Tokens that end the free header text and start the data header row.
const DATA_HEADER_STARTS: &[&str] = &["CFC11", "CFC-11", "Years"];

fn data_row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}\s").expect("hardcoded pattern must compile"))
}

pub(crate) fn read(text: &str, _definitions: &MagiccDefinitions) -> Result<Dataset, ReadError> {
    let lines = to_lines(text);
    if lines.is_empty() {
        return Err(ReadError::NoDataBlockFound {
            location: FileLocation::default(),
        });
    }

    // the first line is a fixed indicator line, ignored on read
    let header_end = lines
        .iter()
        .skip(1)
        .position(|l| DATA_HEADER_STARTS.iter().any(|k| l.trim_start().starts_with(k)))
        .map(|i| i + 1)
        .ok_or_else(|| ReadError::NoDataBlockFound {
            location: FileLocation::default(),
        })?;
    let header = parse_header(&lines[1..header_end]);

    let variables = parse_gas_columns(&lines[header_end]);
    if variables.is_empty() {
        return Err(ReadError::header_mismatch(
            FileLocation::at_line(header_end + 1, &lines[header_end]),
            "data header row names no gas columns",
        ));
    }

    // "ppt" means concentrations, "metric tons" (or nothing) emissions
    let unit_tag = header
        .descriptor_fields
        .get("unit")
        .or_else(|| header.descriptor_fields.get("units"))
        .map(|u| u.trim().to_ascii_lowercase());
    let (suffix, unit) = match unit_tag.as_deref() {
        Some("ppt") => ("_CONC", "ppt"),
        Some("metric tons") | None => ("_EMIS", "t"),
        Some(other) => {
            return Err(ReadError::header_mismatch(
                FileLocation::default(),
                format!("prn unit must be 'ppt' or 'metric tons', got '{other}'"),
            ))
        }
    };

    let mut data_end = header_end + 1;
    let mut times = Vec::new();
    let mut grid: Vec<Vec<f64>> = vec![Vec::new(); variables.len()];
    for (i, line) in lines[header_end + 1..].iter().enumerate() {
        if !data_row_regex().is_match(line) {
            break;
        }
        let line_number = header_end + 1 + i + 1;
        let (time, values) = parse_fixed_width_row(line, line_number, variables.len())?;
        times.push(time);
        for (col, v) in values.into_iter().enumerate() {
            grid[col].push(v);
        }
        data_end = line_number;
    }
    if times.is_empty() {
        return Err(ReadError::NoDataBlockFound {
            location: FileLocation::at_line(header_end + 1, &lines[header_end]),
        });
    }

    let mut dataset = Dataset::new(Dialect::Prn);
    dataset.descriptor_fields = header.descriptor_fields;
    dataset.descriptor_fields.shift_remove("unit");
    dataset.descriptor_fields.shift_remove("units");
    if !header.free_lines.is_empty() {
        dataset
            .descriptor_fields
            .insert("header".to_string(), header.free_lines.join("\n"));
    }
    dataset.general_notes = lines[data_end..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .collect();

    for (col, gas) in variables.iter().enumerate() {
        for (row, time) in times.iter().enumerate() {
            dataset.rows.push(LogicalRow {
                region: "WORLD".to_string(),
                variable: format!("{gas}{suffix}"),
                unit: unit.to_string(),
                todo: DEFAULT_TODO.to_string(),
                time: *time,
                value: grid[col][row],
                notes: Vec::new(),
            });
        }
    }

    Ok(dataset)
}

/// Split the data header row into 10-character gas names, dropping the
/// "Years" label some files carry.
fn parse_gas_columns(line: &str) -> Vec<String> {
    let cleaned = line.replace("Years", "");
    let cleaned = cleaned.trim();
    let chars: Vec<char> = cleaned.chars().collect();
    chars
        .chunks(GAS_COLUMN_WIDTH)
        .map(|chunk| {
            chunk
                .iter()
                .collect::<String>()
                .trim()
                .replace('-', "")
                .to_ascii_uppercase()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse one fixed-width data row: a 4-character year then 10-character
/// value fields. Blank or missing fields read as NaN.
fn parse_fixed_width_row(
    line: &str,
    line_number: usize,
    ncols: usize,
) -> Result<(f64, Vec<f64>), ReadError> {
    let location = || FileLocation::at_line(line_number, line);
    let chars: Vec<char> = line.chars().collect();
    let year_field: String = chars[..YEAR_COLUMN_WIDTH.min(chars.len())].iter().collect();
    let time: f64 = year_field
        .trim()
        .parse()
        .map_err(|_| ReadError::data(location(), format!("'{year_field}' is not a year")))?;

    let mut values = Vec::with_capacity(ncols);
    for col in 0..ncols {
        let start = YEAR_COLUMN_WIDTH + col * GAS_COLUMN_WIDTH;
        let end = (start + GAS_COLUMN_WIDTH).min(chars.len());
        if start >= chars.len() {
            values.push(f64::NAN);
            continue;
        }
        let field: String = chars[start..end].iter().collect();
        let field = field.trim();
        if field.is_empty() {
            values.push(f64::NAN);
        } else {
            let v: f64 = field.parse().map_err(|_| {
                ReadError::data(location(), format!("'{field}' is not a number"))
            })?;
            values.push(v);
        }
    }
    Ok((time, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::fixture;
    use rstest::rstest;

    #[fixture]
    fn prn_conc_text() -> String {
        let mut text = String::new();
        text.push_str(" 2 2000 2001\n");
        text.push_str("Halogenated gas concentrations\n");
        text.push_str("Unit: ppt\n");
        // year column (4 wide) then two 10-wide gas columns
        text.push_str("     CFC-11    CFC-12\n");
        text.push_str("2000 2.620e+02 5.400e+02\n");
        text.push_str("2001 2.610e+02 5.410e+02\n");
        text.push_str("\nprepared from WMO scenarios\n");
        text
    }

    #[rstest]
    fn test_read_concentrations(prn_conc_text: String) {
        let defs = MagiccDefinitions::default();
        let ds = read(&prn_conc_text, &defs).unwrap();
        assert_eq!(ds.variables(), vec!["CFC11_CONC", "CFC12_CONC"]);
        assert_eq!(ds.regions(), vec!["WORLD"]);
        assert!(ds.rows.iter().all(|r| r.unit == "ppt"));
        approx::assert_abs_diff_eq!(ds.rows[0].value, 262.0);
        approx::assert_abs_diff_eq!(ds.rows[3].value, 541.0);
        assert_eq!(ds.general_notes, vec!["prepared from WMO scenarios"]);
    }

    #[test]
    fn test_read_emissions_without_unit_tag() {
        let text = " 1 2000 2000\n\
                    some header\n\
                    Years CFC-11\n\
                    2000    123456\n";
        let defs = MagiccDefinitions::default();
        let ds = read(text, &defs).unwrap();
        assert_eq!(ds.variables(), vec!["CFC11_EMIS"]);
        assert!(ds.rows.iter().all(|r| r.unit == "t"));
        approx::assert_abs_diff_eq!(ds.rows[0].value, 123456.0);
    }

    #[test]
    fn test_blank_field_is_nan() {
        let text = " 1 2000 2001\n\
                    Unit: ppt\n\
                    Years CFC-11    CFC-12\n\
                    2000 2.620e+02\n\
                    2001 2.610e+02 5.410e+02\n";
        let defs = MagiccDefinitions::default();
        let ds = read(text, &defs).unwrap();
        let cfc12_2000 = ds
            .rows
            .iter()
            .find(|r| r.variable == "CFC12_CONC" && r.year() == 2000)
            .unwrap();
        assert!(cfc12_2000.value.is_nan());
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let text = " 1 2000 2000\n\
                    Unit: ppm\n\
                    Years CFC-11\n\
                    2000 1.000e+00\n";
        let defs = MagiccDefinitions::default();
        assert!(matches!(
            read(text, &defs),
            Err(ReadError::HeaderMismatch { .. })
        ));
    }
}
