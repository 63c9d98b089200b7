//! The canonical in-memory representation of a MAGICC-style dataset.
//!
//! Every file format this crate understands is parsed into a [`Dataset`]:
//! an ordered sequence of long-format [`LogicalRow`]s (one observation per
//! region, variable and timestep) plus the free-text metadata that MAGICC
//! files carry around their data blocks. Writers consume a `Dataset`
//! without modifying it; nothing is shared between two read or write calls.
use std::path::PathBuf;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{dialects::Dialect, error::ReadError};

/// The per-row operation tag MAGICC expects when none was specified.
///
/// The other accepted tags ("ADD", "SUBTRACT") are opaque to this crate:
/// they are preserved on round-trip but their arithmetic is the simulation
/// binary's concern.
pub const DEFAULT_TODO: &str = "SET";

/// The value of `THISFILE_UNITS` when a file mixes units across columns.
pub const MIXED_UNITS: &str = "MISC";

/// One observation: a single (region, variable, timestep) value together
/// with any free-text notes attached to it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LogicalRow {
    pub region: String,
    pub variable: String,
    pub unit: String,
    /// Opaque MAGICC operation tag, usually "SET".
    pub todo: String,
    /// Year, or fractional year for sub-annual data.
    pub time: f64,
    /// `NAN` marks a declared-but-missing value.
    pub value: f64,
    pub notes: Vec<String>,
}

impl LogicalRow {
    pub fn new(region: &str, variable: &str, unit: &str, time: f64, value: f64) -> Self {
        Self {
            region: region.to_string(),
            variable: variable.to_string(),
            unit: unit.to_string(),
            todo: DEFAULT_TODO.to_string(),
            time,
            value,
            notes: Vec::new(),
        }
    }

    /// The integer year this row falls in.
    pub fn year(&self) -> i64 {
        self.time.floor() as i64
    }
}

impl approx::AbsDiffEq for LogicalRow {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        if self.region != other.region
            || self.variable != other.variable
            || self.unit != other.unit
            || self.todo != other.todo
            || self.notes != other.notes
        {
            return false;
        }
        if !f64::abs_diff_eq(&self.time, &other.time, epsilon) {
            return false;
        }
        // both-missing counts as equal
        if self.value.is_nan() && other.value.is_nan() {
            return true;
        }
        f64::abs_diff_eq(&self.value, &other.value, epsilon)
    }
}

/// An `f64` timestep usable as an ordered map key.
///
/// Times inside one file come from (or are written with) the same fixed
/// decimal format, so bit-identity is the right equality here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeKey(u64);

impl TimeKey {
    pub fn of(time: f64) -> Self {
        Self(time.to_bits())
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl std::fmt::Display for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.value();
        if t == t.floor() {
            write!(f, "{}", t as i64)
        } else {
            write!(f, "{t:.3}")
        }
    }
}

/// A named, ordered collection of [`LogicalRow`]s plus file-level metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dataset {
    pub rows: Vec<LogicalRow>,
    /// The file this dataset was read from, if any.
    pub source_path: Option<PathBuf>,
    /// Free-text annotations applying to the file as a whole.
    pub general_notes: Vec<String>,
    /// "Label: value" header fields ("Data description", "Gas", "Date", ...)
    /// in the order they appeared or should be written.
    pub descriptor_fields: IndexMap<String, String>,
    pub dialect: Dialect,
}

impl Dataset {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            rows: Vec::new(),
            source_path: None,
            general_notes: Vec::new(),
            descriptor_fields: IndexMap::new(),
            dialect,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogicalRow> {
        self.rows.iter()
    }

    /// Unique regions in first-encountered order.
    pub fn regions(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.region.as_str())
            .unique()
            .collect()
    }

    /// Unique variables in first-encountered order.
    pub fn variables(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.variable.as_str())
            .unique()
            .collect()
    }

    /// Unique timesteps in ascending order.
    pub fn times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .rows
            .iter()
            .map(|r| r.time)
            .unique_by(|t| t.to_bits())
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }

    /// Rows matching every given criterion; `None` matches everything.
    pub fn filter_rows(
        &self,
        region: Option<&str>,
        variable: Option<&str>,
        year: Option<i64>,
    ) -> impl Iterator<Item = &LogicalRow> {
        let region = region.map(|s| s.to_string());
        let variable = variable.map(|s| s.to_string());
        self.rows.iter().filter(move |r| {
            region.as_deref().is_none_or(|v| r.region == v)
                && variable.as_deref().is_none_or(|v| r.variable == v)
                && year.is_none_or(|y| r.year() == y)
        })
    }

    /// The unit shared by every row for `(region, variable)`, if those rows
    /// agree on one.
    pub fn unit_for(&self, region: &str, variable: &str) -> Option<&str> {
        let units: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| r.region == region && r.variable == variable)
            .map(|r| r.unit.as_str())
            .unique()
            .collect();
        match units.as_slice() {
            [u] => Some(u),
            _ => None,
        }
    }

    /// The value for the namelist units field: the single unit used across
    /// the whole dataset, or the [`MIXED_UNITS`] sentinel.
    pub fn units_field(&self) -> String {
        let units: Vec<&str> = self.rows.iter().map(|r| r.unit.as_str()).unique().collect();
        match units.as_slice() {
            [u] => u.to_string(),
            _ => MIXED_UNITS.to_string(),
        }
    }

    /// Convert to a generic rows-by-columns structure for downstream
    /// analysis tools that do not know about MAGICC formats.
    pub fn to_table(&self) -> Table {
        let columns = Table::LONG_COLUMNS.iter().map(|s| s.to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    TableCell::Text(r.region.clone()),
                    TableCell::Text(r.variable.clone()),
                    TableCell::Text(r.unit.clone()),
                    TableCell::Text(r.todo.clone()),
                    TableCell::Number(r.time),
                    TableCell::Number(r.value),
                ]
            })
            .collect();
        Table { columns, rows }
    }

    /// Inverse of [`Dataset::to_table`]. The table must have exactly the
    /// long-format columns, in order.
    pub fn from_table(table: &Table, dialect: Dialect) -> Result<Self, ReadError> {
        if table.columns != Table::LONG_COLUMNS {
            return Err(ReadError::data(
                crate::error::FileLocation::default(),
                format!(
                    "expected long-format columns {:?}, got {:?}",
                    Table::LONG_COLUMNS,
                    table.columns
                ),
            ));
        }

        let mut out = Self::new(dialect);
        for (i, row) in table.rows.iter().enumerate() {
            match row.as_slice() {
                [TableCell::Text(region), TableCell::Text(variable), TableCell::Text(unit), TableCell::Text(todo), TableCell::Number(time), TableCell::Number(value)] =>
                {
                    let mut lrow = LogicalRow::new(region, variable, unit, *time, *value);
                    lrow.todo = todo.clone();
                    out.rows.push(lrow);
                }
                _ => {
                    return Err(ReadError::data(
                        crate::error::FileLocation::default(),
                        format!("table row {i} does not match the long-format column types"),
                    ))
                }
            }
        }
        Ok(out)
    }
}

/// A generic tabular structure: named columns over rows of text or numbers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<TableCell>>,
}

impl Table {
    pub const LONG_COLUMNS: [&'static str; 6] =
        ["region", "variable", "unit", "todo", "time", "value"];
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TableCell {
    Text(String),
    Number(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn two_gas_dataset() -> Dataset {
        let mut ds = Dataset::new(Dialect::Scen7);
        for (year, value) in [(2010.0, 8.0), (2011.0, 10.0), (2012.0, 9.0)] {
            ds.rows
                .push(LogicalRow::new("WORLD", "CO2", "GtC", year, value));
        }
        for (year, value) in [(2010.0, 300.0), (2011.0, 250.0), (2012.0, 200.0)] {
            ds.rows
                .push(LogicalRow::new("WORLD", "CH4", "MtCH4", year, value));
        }
        ds
    }

    #[rstest]
    fn test_axes(two_gas_dataset: Dataset) {
        assert_eq!(two_gas_dataset.regions(), vec!["WORLD"]);
        assert_eq!(two_gas_dataset.variables(), vec!["CO2", "CH4"]);
        assert_eq!(two_gas_dataset.times(), vec![2010.0, 2011.0, 2012.0]);
    }

    #[rstest]
    fn test_filtering(two_gas_dataset: Dataset) {
        let co2: Vec<_> = two_gas_dataset
            .filter_rows(None, Some("CO2"), None)
            .collect();
        assert_eq!(co2.len(), 3);
        let one: Vec<_> = two_gas_dataset
            .filter_rows(Some("WORLD"), Some("CH4"), Some(2011))
            .collect();
        assert_eq!(one.len(), 1);
        approx::assert_abs_diff_eq!(one[0].value, 250.0);
    }

    #[rstest]
    fn test_units_field(two_gas_dataset: Dataset) {
        assert_eq!(two_gas_dataset.units_field(), "MISC");
        assert_eq!(two_gas_dataset.unit_for("WORLD", "CO2"), Some("GtC"));
        assert_eq!(two_gas_dataset.unit_for("WORLD", "N2O"), None);
    }

    #[rstest]
    fn test_table_round_trip(two_gas_dataset: Dataset) {
        let table = two_gas_dataset.to_table();
        assert_eq!(table.rows.len(), 6);
        let back = Dataset::from_table(&table, Dialect::Scen7).unwrap();
        assert_eq!(back.rows, two_gas_dataset.rows);
    }

    #[test]
    fn test_time_key_display() {
        assert_eq!(TimeKey::of(2015.0).to_string(), "2015");
        assert_eq!(TimeKey::of(2015.5).to_string(), "2015.500");
    }
}
