//! Serializer for legacy `.prn` halogenated-gas files.
//!
//! The format is global-only and fixed-width, and every column must be one
//! of the halogenated species MAGICC's ozone routines know. The kind of
//! file (concentrations or emissions) follows from the units of the data.
use crate::dataset::Dataset;
use crate::dialects::MagiccDefinitions;
use crate::error::WriteError;

use crate::readers::prn::{GAS_COLUMN_WIDTH, YEAR_COLUMN_WIDTH};

use super::{build_wide, format_exponential, format_time};

pub(crate) fn render(
    dataset: &Dataset,
    definitions: &MagiccDefinitions,
) -> Result<String, WriteError> {
    if dataset.regions() != ["WORLD"] {
        return Err(WriteError::Validation(format!(
            "a .prn file is global-only, got regions {:?}",
            dataset.regions()
        )));
    }

    let units = dataset
        .rows
        .iter()
        .map(|r| r.unit.as_str())
        .collect::<std::collections::BTreeSet<_>>();
    let concentrations = match Vec::from_iter(units).as_slice() {
        ["ppt"] => true,
        ["t"] => false,
        other => {
            return Err(WriteError::Validation(format!(
                "a .prn file holds either 'ppt' or 't' data, got units {other:?}"
            )))
        }
    };
    let suffix = if concentrations { "_CONC" } else { "_EMIS" };

    // a .prn file carries the full species table, nothing more and nothing
    // less; column order follows the table, not the dataset
    let mut species_present = std::collections::BTreeSet::new();
    for variable in dataset.variables() {
        let gas = variable.strip_suffix(suffix).ok_or_else(|| {
            WriteError::Validation(format!(
                "variable {variable} does not carry the {suffix} suffix its units imply"
            ))
        })?;
        species_present.insert(gas.to_string());
    }
    let full_table: std::collections::BTreeSet<String> =
        definitions.prn_species.iter().cloned().collect();
    if species_present != full_table {
        return Err(WriteError::Validation(format!(
            "a .prn file must carry exactly the species {:?}, got {:?}",
            definitions.prn_species, species_present
        )));
    }
    let ordered_gases: Vec<String> = definitions.prn_species.clone();

    let block = build_wide(dataset, &["WORLD".to_string()])?;
    // the year column is four characters wide, fractional years cannot fit
    if block.times.iter().any(|t| t.fract() != 0.0) {
        return Err(WriteError::Validation(
            "a .prn file carries whole years only".to_string(),
        ));
    }
    let column_for: Vec<usize> = ordered_gases
        .iter()
        .map(|gas| {
            let variable = format!("{gas}{suffix}");
            block
                .columns
                .iter()
                .position(|c| c.variable == variable)
                .ok_or_else(|| WriteError::Validation(format!("no column for {variable}")))
        })
        .collect::<Result<_, _>>()?;

    let mut preamble = super::render_header(dataset);
    preamble.push_str(if concentrations {
        "Unit: ppt\n"
    } else {
        "Unit: metric tons\n"
    });

    preamble.push_str("Years");
    for gas in &ordered_gases {
        preamble.push_str(&format!("{gas:>GAS_COLUMN_WIDTH$}"));
    }
    preamble.push('\n');

    // the indicator line names the line number the data starts on,
    // counting itself
    let first_data_row = preamble.matches('\n').count() + 2;
    let mut buffer = format!(
        "{first_data_row:>10}{first_year:>10}{last_year:>10}\n",
        first_year = block.first_year(),
        last_year = block.last_year()
    );
    buffer.push_str(&preamble);

    for (row, time) in block.times.iter().enumerate() {
        let year = format_time(*time);
        buffer.push_str(&format!("{year:>YEAR_COLUMN_WIDTH$}"));
        for &col in &column_for {
            let v = block.values[col][row];
            let cell = if concentrations {
                format_exponential(v, 3)
            } else {
                format!("{v:.0}")
            };
            buffer.push_str(&format!("{cell:>GAS_COLUMN_WIDTH$}"));
        }
        buffer.push('\n');
    }

    if !dataset.general_notes.is_empty() {
        buffer.push('\n');
        for note in &dataset.general_notes {
            buffer.push_str(note);
            buffer.push('\n');
        }
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LogicalRow;
    use crate::dialects::Dialect;
    use crate::readers;
    use rstest::{fixture, rstest};

    /// Concentrations for the full species table, two years each.
    #[fixture]
    fn conc_dataset() -> Dataset {
        let defs = MagiccDefinitions::default();
        let mut ds = Dataset::new(Dialect::Prn);
        for (i, gas) in defs.prn_species.iter().enumerate() {
            for (j, year) in [2000.0, 2001.0].into_iter().enumerate() {
                ds.rows.push(LogicalRow::new(
                    "WORLD",
                    &format!("{gas}_CONC"),
                    "ppt",
                    year,
                    100.0 + 10.0 * i as f64 + j as f64,
                ));
            }
        }
        ds.descriptor_fields
            .insert("date".to_string(), "2024-01-31".to_string());
        ds
    }

    #[rstest]
    fn test_round_trip_concentrations(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let text = render(&conc_dataset, &defs).unwrap();
        // indicator line: the line number the data starts on, then the
        // year range, all in ten-character columns
        assert!(text.starts_with("         5      2000      2001\n"));
        assert!(text.contains("Unit: ppt\n"));
        assert_eq!(text.lines().nth(4).unwrap().len(), 4 + 16 * 10);

        let back = readers::read_str(&text, Dialect::Prn).unwrap();
        assert_eq!(back.variables().len(), 16);
        for (a, b) in back.rows.iter().zip(conc_dataset.rows.iter()) {
            assert_eq!(a.variable, b.variable);
            approx::assert_abs_diff_eq!(a.value, b.value, epsilon = 1e-6);
        }
    }

    #[rstest]
    fn test_columns_follow_species_order(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        // feed the gases in reverse and expect the canonical column order
        let mut ds = conc_dataset;
        ds.rows.reverse();
        let text = render(&ds, &defs).unwrap();
        let header = text
            .lines()
            .find(|l| l.starts_with("Years"))
            .unwrap()
            .to_string();
        assert!(header.find("CFC11").unwrap() < header.find("CFC12").unwrap());
    }

    #[test]
    fn test_emissions_written_as_whole_numbers() {
        let defs = MagiccDefinitions::default();
        let mut ds = Dataset::new(Dialect::Prn);
        for gas in &defs.prn_species {
            let value = if gas == "CFC11" { 123456.0 } else { 10.0 };
            ds.rows.push(LogicalRow::new(
                "WORLD",
                &format!("{gas}_EMIS"),
                "t",
                2000.0,
                value,
            ));
        }
        ds.descriptor_fields
            .insert("date".to_string(), "2024-01-31".to_string());
        let text = render(&ds, &defs).unwrap();
        assert!(text.contains("Unit: metric tons\n"));
        assert!(text.contains("2000    123456"));

        let back = readers::read_str(&text, Dialect::Prn).unwrap();
        assert_eq!(back.variables().len(), 16);
        approx::assert_abs_diff_eq!(back.rows[0].value, 123456.0);
    }

    #[rstest]
    fn test_non_world_region_rejected(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let mut ds = conc_dataset;
        ds.rows[0].region = "NHOCEAN".to_string();
        assert!(matches!(
            render(&ds, &defs),
            Err(WriteError::Validation(_))
        ));
    }

    #[rstest]
    fn test_unknown_species_rejected(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let mut ds = conc_dataset;
        for row in ds.rows.iter_mut() {
            row.variable = "CO2_CONC".to_string();
        }
        assert!(matches!(
            render(&ds, &defs),
            Err(WriteError::Validation(_))
        ));
    }

    #[rstest]
    fn test_incomplete_species_set_rejected(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let mut ds = conc_dataset;
        ds.rows.retain(|r| r.variable != "CH3CL_CONC");
        assert!(matches!(
            render(&ds, &defs),
            Err(WriteError::Validation(_))
        ));
    }

    #[rstest]
    fn test_fractional_years_rejected(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let mut ds = conc_dataset;
        for row in ds.rows.iter_mut() {
            row.time += 0.5;
        }
        assert!(matches!(
            render(&ds, &defs),
            Err(WriteError::Validation(_))
        ));
    }

    #[rstest]
    fn test_mixed_units_rejected(conc_dataset: Dataset) {
        let defs = MagiccDefinitions::default();
        let mut ds = conc_dataset;
        ds.rows[0].unit = "t".to_string();
        assert!(matches!(
            render(&ds, &defs),
            Err(WriteError::Validation(_))
        ));
    }
}
