//! Serializers for the MAGICC file formats.
//!
//! [`write_file`] renders a [`Dataset`] fully in memory and then writes the
//! destination in one call, so a failed validation never leaves a partial
//! file behind. Layout fields whose values depend on the rendered text
//! (row counts, first data row) are emitted as placeholder tokens and
//! substituted just before the buffer is written; see
//! [`LayoutPlaceholders`].
use std::path::Path;

use error_stack::{Report, ResultExt};

use crate::dataset::{Dataset, TimeKey};
use crate::dialects::Dialect;
use crate::dialects::MagiccDefinitions;
use crate::error::{MagiccError, WriteError};
use crate::namelist::{NamelistFields, NamelistValue};

pub mod notes;
mod prn;
mod scen;
mod standard;

/// Write a dataset to `path` in its own dialect.
pub fn write_file(
    dataset: &Dataset,
    path: impl AsRef<Path>,
    definitions: &MagiccDefinitions,
) -> error_stack::Result<(), MagiccError> {
    let path = path.as_ref();
    check_filename_variable_consistency(dataset, path)
        .map_err(|e| Report::new(MagiccError::Write(e)))?;
    let text = write_str(dataset, definitions)
        .map_err(|e| Report::new(MagiccError::Write(e)))
        .attach_printable_lazy(|| format!("while writing {}", path.display()))?;
    std::fs::write(path, text).map_err(|e| {
        Report::new(MagiccError::Write(WriteError::CouldNotWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }))
    })
}

/// Render a dataset to text in its own dialect.
pub fn write_str(dataset: &Dataset, definitions: &MagiccDefinitions) -> Result<String, WriteError> {
    match dataset.dialect {
        Dialect::Scen => scen::render(dataset, definitions),
        Dialect::Prn => prn::render(dataset, definitions),
        Dialect::Scen7
        | Dialect::EmisIn
        | Dialect::ConcIn
        | Dialect::OtIn
        | Dialect::RfIn
        | Dialect::SurfaceTempIn
        | Dialect::Mag => standard::render(dataset, definitions),
    }
}

/// For dialects that encode the variable in the file name, refuse to write
/// a single-variable dataset under a name that claims a different variable.
fn check_filename_variable_consistency(dataset: &Dataset, path: &Path) -> Result<(), WriteError> {
    let Some(re) = dataset.dialect.filename_variable_regex() else {
        return Ok(());
    };
    let variables = dataset.variables();
    let [data_var] = variables.as_slice() else {
        return Ok(());
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_uppercase())
        .unwrap_or_default();
    if let Some(caps) = re.captures(&name) {
        let filename_var = &caps[1];
        if !filename_var.eq_ignore_ascii_case(data_var) {
            return Err(WriteError::Validation(format!(
                "the file name claims variable {filename_var} but the data holds {data_var}"
            )));
        }
    }
    Ok(())
}

/// One column of the wide data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnMeta {
    pub region: String,
    pub variable: String,
    pub unit: String,
    pub todo: String,
}

/// The dataset pivoted to the wide layout the files use: one row per
/// timestep, one column per (variable, region).
#[derive(Debug, Clone)]
pub(crate) struct WideBlock {
    pub times: Vec<f64>,
    pub columns: Vec<ColumnMeta>,
    /// Indexed `[column][row]`.
    pub values: Vec<Vec<f64>>,
}

impl WideBlock {
    pub fn first_year(&self) -> i64 {
        self.times.first().map(|t| t.floor() as i64).unwrap_or(0)
    }

    pub fn last_year(&self) -> i64 {
        self.times.last().map(|t| t.floor() as i64).unwrap_or(0)
    }

    /// The ANNUALSTEPS namelist value: timesteps per year, or 0 for
    /// irregular or multi-year stepping.
    pub fn annual_steps(&self) -> i64 {
        let diffs: Vec<f64> = self.times.windows(2).map(|w| w[1] - w[0]).collect();
        let Some(&first) = diffs.first() else {
            return 1;
        };
        if first <= 0.0 || diffs.iter().any(|d| (d - first).abs() > 0.02 * first) {
            return 0;
        }
        let steps = (1.0 / first).round();
        if steps < 1.0 {
            0
        } else {
            steps as i64
        }
    }
}

/// Pivot the dataset into a wide block with columns ordered variable-major
/// (variables in first-encountered order, regions in `region_order` within
/// each variable).
///
/// Rows of NaN at either end of the time axis are dropped; a NaN that
/// survives that trim means a gap inside the series, which MAGICC cannot
/// represent, so it fails validation.
pub(crate) fn build_wide(
    dataset: &Dataset,
    region_order: &[String],
) -> Result<WideBlock, WriteError> {
    if dataset.is_empty() {
        return Err(WriteError::Validation(
            "cannot write an empty dataset".to_string(),
        ));
    }

    let mut columns = Vec::new();
    for variable in dataset.variables() {
        for region in region_order {
            let mut cells = dataset
                .rows
                .iter()
                .filter(|r| r.variable == variable && &r.region == region)
                .peekable();
            let Some(first) = cells.peek() else {
                continue;
            };
            let unit = dataset
                .unit_for(region, variable)
                .ok_or_else(|| {
                    WriteError::Validation(format!(
                        "rows for ({region}, {variable}) disagree on their unit"
                    ))
                })?
                .to_string();
            columns.push(ColumnMeta {
                region: region.clone(),
                variable: variable.to_string(),
                unit,
                todo: first.todo.clone(),
            });
        }
    }

    let times = dataset.times();
    let index_of: indexmap::IndexMap<TimeKey, usize> = times
        .iter()
        .enumerate()
        .map(|(i, t)| (TimeKey::of(*t), i))
        .collect();

    let mut values = vec![vec![f64::NAN; times.len()]; columns.len()];
    for row in &dataset.rows {
        let col = columns
            .iter()
            .position(|c| c.region == row.region && c.variable == row.variable);
        let Some(col) = col else {
            continue;
        };
        let row_index = index_of[&TimeKey::of(row.time)];
        if !values[col][row_index].is_nan() {
            return Err(WriteError::Validation(format!(
                "duplicate value for ({}, {}) at {}",
                row.region,
                row.variable,
                TimeKey::of(row.time)
            )));
        }
        values[col][row_index] = row.value;
    }

    let all_nan = |row: usize| values.iter().all(|col| col[row].is_nan());
    let mut start = 0;
    while start < times.len() && all_nan(start) {
        start += 1;
    }
    let mut end = times.len();
    while end > start && all_nan(end - 1) {
        end -= 1;
    }
    if start == end {
        return Err(WriteError::Validation(
            "every value in the dataset is missing".to_string(),
        ));
    }

    let times: Vec<f64> = times[start..end].to_vec();
    let values: Vec<Vec<f64>> = values
        .into_iter()
        .map(|col| col[start..end].to_vec())
        .collect();

    if values.iter().any(|col| col.iter().any(|v| v.is_nan())) {
        return Err(WriteError::Validation(
            "the data contains timesteps where some values are missing whilst others are not"
                .to_string(),
        ));
    }

    Ok(WideBlock {
        times,
        columns,
        values,
    })
}

/// Format a float the way C's `%.*e` does: fixed decimal places and an
/// exponent of at least two digits with an explicit sign.
pub(crate) fn format_exponential(v: f64, precision: usize) -> String {
    let formatted = format!("{v:.precision$e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exp: i32 = exponent.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => formatted,
    }
}

/// Format a timestep: whole years as integers, sub-annual times with three
/// decimal places.
pub(crate) fn format_time(t: f64) -> String {
    TimeKey::of(t).to_string()
}

/// Right-justify every cell of every line to one shared column width and
/// join. The width is the longest cell plus one space of padding, bounded
/// below by `min_width`.
pub(crate) fn layout_lines(lines: &[Vec<String>], min_width: usize) -> String {
    let width = lines
        .iter()
        .flatten()
        .map(|cell| cell.len() + 1)
        .max()
        .unwrap_or(0)
        .max(min_width);
    let mut out = String::new();
    for cells in lines {
        for cell in cells {
            out.push_str(&format!("{cell:>width$}"));
        }
        out.push('\n');
    }
    out
}

/// Placeholder tokens for namelist fields only known once the data block
/// has been rendered. They are substituted in the in-memory buffer before
/// anything reaches the file system.
pub(crate) struct LayoutPlaceholders;

impl LayoutPlaceholders {
    pub const DATAROWS: &'static str = "<THISFILE_DATAROWS>";
    pub const FIRSTYEAR: &'static str = "<THISFILE_FIRSTYEAR>";
    pub const LASTYEAR: &'static str = "<THISFILE_LASTYEAR>";
    pub const FIRSTDATAROW: &'static str = "<THISFILE_FIRSTDATAROW>";

    /// Substitute every placeholder with its final value.
    pub fn resolve(buffer: String, block: &WideBlock, first_data_row: usize) -> String {
        buffer
            .replace(Self::DATAROWS, &block.times.len().to_string())
            .replace(Self::FIRSTYEAR, &block.first_year().to_string())
            .replace(Self::LASTYEAR, &block.last_year().to_string())
            .replace(Self::FIRSTDATAROW, &first_data_row.to_string())
    }
}

/// The namelist fields shared by every namelist-carrying dialect, with
/// placeholders for the layout-dependent ones.
pub(crate) fn base_namelist(dataset: &Dataset, block: &WideBlock) -> NamelistFields {
    let mut fields = NamelistFields::new();
    fields.insert(
        "THISFILE_DATACOLUMNS".to_string(),
        NamelistValue::Int(block.columns.len() as i64),
    );
    fields.insert(
        "THISFILE_DATAROWS".to_string(),
        NamelistValue::Placeholder(LayoutPlaceholders::DATAROWS.to_string()),
    );
    fields.insert(
        "THISFILE_FIRSTYEAR".to_string(),
        NamelistValue::Placeholder(LayoutPlaceholders::FIRSTYEAR.to_string()),
    );
    fields.insert(
        "THISFILE_LASTYEAR".to_string(),
        NamelistValue::Placeholder(LayoutPlaceholders::LASTYEAR.to_string()),
    );
    fields.insert(
        "THISFILE_ANNUALSTEPS".to_string(),
        NamelistValue::Int(block.annual_steps()),
    );
    fields.insert(
        "THISFILE_FIRSTDATAROW".to_string(),
        NamelistValue::Placeholder(LayoutPlaceholders::FIRSTDATAROW.to_string()),
    );
    fields.insert(
        "THISFILE_UNITS".to_string(),
        NamelistValue::Str(dataset.units_field()),
    );
    fields
}

/// Descriptor fields that never render as "tag: value" header lines.
const INTERNAL_FIELDS: &[&str] = &["header", "timeseriestype", "name", "description", "notes"];

/// Render the free-text header: the stored general header lines, then the
/// tagged fields. A Date field is added when the dataset carries none.
pub(crate) fn render_header(dataset: &Dataset) -> String {
    let mut out = String::new();
    if let Some(free) = dataset.descriptor_fields.get("header") {
        for line in free.lines() {
            out.push_str(line);
            out.push('\n');
        }
    }
    if !dataset.descriptor_fields.contains_key("date") {
        let now = chrono::Local::now();
        out.push_str(&format!("Date: {}\n", now.format("%Y-%m-%d %H:%M:%S")));
    }
    for (key, value) in &dataset.descriptor_fields {
        if INTERNAL_FIELDS.contains(&key.as_str()) {
            continue;
        }
        out.push_str(&format!("{}: {value}\n", capitalize(key)));
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LogicalRow;
    use rstest::{fixture, rstest};

    #[fixture]
    fn dataset() -> Dataset {
        let mut ds = Dataset::new(Dialect::Scen7);
        for (year, value) in [(2010.0, 8.0), (2011.0, 10.0), (2012.0, 9.0)] {
            ds.rows
                .push(LogicalRow::new("WORLD", "CO2I", "GtC", year, value));
        }
        for (year, value) in [(2010.0, 300.0), (2011.0, 250.0), (2012.0, 200.0)] {
            ds.rows
                .push(LogicalRow::new("WORLD", "CH4", "MtCH4", year, value));
        }
        ds
    }

    #[rstest]
    fn test_build_wide_layout(dataset: Dataset) {
        let block = build_wide(&dataset, &["WORLD".to_string()]).unwrap();
        assert_eq!(block.times, vec![2010.0, 2011.0, 2012.0]);
        assert_eq!(block.columns.len(), 2);
        assert_eq!(block.columns[0].variable, "CO2I");
        assert_eq!(block.columns[1].variable, "CH4");
        approx::assert_abs_diff_eq!(block.values[1][2], 200.0);
        assert_eq!(block.annual_steps(), 1);
    }

    #[rstest]
    fn test_edge_nan_rows_dropped(mut dataset: Dataset) {
        dataset
            .rows
            .push(LogicalRow::new("WORLD", "CO2I", "GtC", 2013.0, f64::NAN));
        dataset
            .rows
            .push(LogicalRow::new("WORLD", "CH4", "MtCH4", 2013.0, f64::NAN));
        let block = build_wide(&dataset, &["WORLD".to_string()]).unwrap();
        assert_eq!(block.times, vec![2010.0, 2011.0, 2012.0]);
    }

    #[rstest]
    fn test_interior_gap_rejected(mut dataset: Dataset) {
        for row in dataset.rows.iter_mut() {
            if row.variable == "CH4" && row.time == 2011.0 {
                row.value = f64::NAN;
            }
        }
        let err = build_wide(&dataset, &["WORLD".to_string()]).unwrap_err();
        assert!(matches!(err, WriteError::Validation(_)));
    }

    #[rstest]
    fn test_duplicate_observation_rejected(mut dataset: Dataset) {
        dataset
            .rows
            .push(LogicalRow::new("WORLD", "CO2I", "GtC", 2010.0, 8.5));
        let err = build_wide(&dataset, &["WORLD".to_string()]).unwrap_err();
        assert!(matches!(err, WriteError::Validation(_)));
    }

    #[rstest]
    #[case(1.0, "1.00000000e+00")]
    #[case(-0.5, "-5.00000000e-01")]
    #[case(123456.0, "1.23456000e+05")]
    #[case(0.0, "0.00000000e+00")]
    #[case(3.2e-12, "3.20000000e-12")]
    fn test_format_exponential(#[case] v: f64, #[case] expected: &str) {
        assert_eq!(format_exponential(v, 8), expected);
    }

    #[test]
    fn test_annual_steps() {
        let block = |times: Vec<f64>| WideBlock {
            times,
            columns: Vec::new(),
            values: Vec::new(),
        };
        assert_eq!(block(vec![2000.0, 2001.0, 2002.0]).annual_steps(), 1);
        assert_eq!(block(vec![2000.0, 2010.0, 2020.0]).annual_steps(), 0);
        let monthly: Vec<f64> = (0..24).map(|m| 2000.0 + m as f64 / 12.0).collect();
        assert_eq!(block(monthly).annual_steps(), 12);
        assert_eq!(block(vec![2000.0, 2001.0, 2005.0]).annual_steps(), 0);
    }

    #[test]
    fn test_layout_lines() {
        let lines = vec![
            vec!["YEARS".to_string(), "WORLD".to_string()],
            vec!["2010".to_string(), "8.0000".to_string()],
        ];
        let text = layout_lines(&lines, 8);
        assert_eq!(text, "   YEARS   WORLD\n    2010  8.0000\n");
    }

    #[test]
    fn test_placeholder_resolution() {
        let block = WideBlock {
            times: vec![2010.0, 2011.0],
            columns: Vec::new(),
            values: Vec::new(),
        };
        let buffer = format!(
            "rows={} first={} last={} firstdata={}",
            LayoutPlaceholders::DATAROWS,
            LayoutPlaceholders::FIRSTYEAR,
            LayoutPlaceholders::LASTYEAR,
            LayoutPlaceholders::FIRSTDATAROW,
        );
        assert_eq!(
            LayoutPlaceholders::resolve(buffer, &block, 13),
            "rows=2 first=2010 last=2011 firstdata=13"
        );
    }

    #[test]
    fn test_filename_variable_consistency() {
        let mut ds = Dataset::new(Dialect::EmisIn);
        ds.rows
            .push(LogicalRow::new("WORLD", "SOX_EMIS", "MtS", 2000.0, 60.0));
        assert!(
            check_filename_variable_consistency(&ds, Path::new("HIST_SOX_EMIS.IN")).is_ok()
        );
        let err =
            check_filename_variable_consistency(&ds, Path::new("HIST_CO2I_EMIS.IN")).unwrap_err();
        assert!(matches!(err, WriteError::Validation(_)));
    }
}
