//! Serializer for legacy MAGICC5/6 `.SCEN` scenario files.
//!
//! Unlike the namelist dialects these are block-major: one wide table per
//! region, all regions carrying the same fixed gas set. Which gas set (and
//! so the file's two-digit code) is inferred from the data.
use log::warn;

use crate::dataset::Dataset;
use crate::dialects::{Dialect, MagiccDefinitions};
use crate::error::WriteError;

use super::{build_wide, format_time, layout_lines};

/// The labelled description lines accepted below the code line.
const DESCRIPTION_LINES: &[&str] = &["name", "description", "notes"];

pub(crate) fn render(
    dataset: &Dataset,
    definitions: &MagiccDefinitions,
) -> Result<String, WriteError> {
    let prepared = prepare(dataset, definitions);
    let gas_order = scen_gas_order(&prepared, definitions)?;

    // reorder to the gas set's file order so the wide columns come out right
    let mut ordered = Dataset::new(Dialect::Scen);
    ordered.descriptor_fields = prepared.descriptor_fields.clone();
    ordered.general_notes = prepared.general_notes.clone();
    for gas in &gas_order {
        ordered
            .rows
            .extend(prepared.rows.iter().filter(|r| &r.variable == gas).cloned());
    }

    let regions = ordered.regions();
    let variables = ordered.variables();
    let special_code = definitions.special_scen_code(&regions, &variables)?;
    let region_order = definitions.scen_region_order(&regions)?;
    let block = build_wide(&ordered, &region_order)?;
    let min_width = Dialect::Scen.descriptor().min_column_width;

    let mut buffer = String::new();
    buffer.push_str(&format!("{}\n", block.times.len()));
    buffer.push_str(&format!("{special_code}\n"));
    for label in DESCRIPTION_LINES {
        let value = ordered
            .descriptor_fields
            .get(*label)
            .map(|v| v.as_str())
            .unwrap_or("");
        buffer.push_str(&format!("{label}: {value}\n"));
    }
    if let Some(free) = ordered.descriptor_fields.get("header") {
        for line in free.lines() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }

    for region in &region_order {
        buffer.push('\n');
        buffer.push_str(region);
        buffer.push('\n');

        let column_for: Vec<usize> = gas_order
            .iter()
            .map(|gas| {
                block
                    .columns
                    .iter()
                    .position(|c| &c.variable == gas && &c.region == region)
                    .ok_or_else(|| {
                        WriteError::Validation(format!("region {region} has no data for {gas}"))
                    })
            })
            .collect::<Result<_, _>>()?;

        let mut table: Vec<Vec<String>> = Vec::new();
        table.push(
            std::iter::once("YEARS".to_string())
                .chain(gas_order.iter().cloned())
                .collect(),
        );
        table.push(
            std::iter::once("Yrs".to_string())
                .chain(column_for.iter().map(|&c| block.columns[c].unit.clone()))
                .collect(),
        );
        for (row, time) in block.times.iter().enumerate() {
            table.push(
                std::iter::once(format_time(*time))
                    .chain(
                        column_for
                            .iter()
                            .map(|&c| format!("{:.4}", block.values[c][row])),
                    )
                    .collect(),
            );
        }
        buffer.push_str(&layout_lines(&table, min_width));
    }

    if !ordered.general_notes.is_empty() {
        buffer.push('\n');
        for note in &ordered.general_notes {
            buffer.push_str(note);
            buffer.push('\n');
        }
    }

    Ok(buffer)
}

/// Normalise region names to what a `.SCEN` file may carry. SCEN7-style
/// `R5.2*` names are mapped onto their MAGICC6 `R5*` counterparts.
fn prepare(dataset: &Dataset, definitions: &MagiccDefinitions) -> Dataset {
    let mut prepared = dataset.clone();
    let mut renamed = false;
    for row in prepared.rows.iter_mut() {
        row.region = definitions.normalise_region(&row.region);
        if let Some(rest) = row.region.strip_prefix("R5.2") {
            row.region = format!("R5{rest}");
            renamed = true;
        }
    }
    if renamed {
        warn!("renamed R5.2* regions to their R5* names for the scen region set");
    }
    prepared
}

/// Pick the gas set the file will carry. Data beyond the matched set is
/// dropped with a warning; an incomplete set fails later when the special
/// code is derived.
fn scen_gas_order(
    dataset: &Dataset,
    definitions: &MagiccDefinitions,
) -> Result<Vec<String>, WriteError> {
    let present: Vec<String> = dataset
        .variables()
        .iter()
        .map(|v| v.to_ascii_uppercase())
        .collect();
    for gas_set in [&definitions.scen_gases_code_1, &definitions.scen_gases_code_0] {
        if gas_set.iter().all(|g| present.contains(g)) {
            let extra: Vec<&String> = present.iter().filter(|g| !gas_set.contains(g)).collect();
            if !extra.is_empty() {
                warn!("ignoring input data which is not required: {extra:?}");
            }
            return Ok(gas_set.clone());
        }
    }
    Err(WriteError::Validation(format!(
        "the gases {present:?} match neither scen gas set"
    )))
}
