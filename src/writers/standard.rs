//! Serializer for the namelist-prefixed dialects: the `.IN` input family,
//! `.SCEN7` and `.MAG`.
use log::warn;

use crate::dataset::Dataset;
use crate::dialects::{Dialect, HeaderStyle, MagiccDefinitions, NumberFormat};
use crate::error::WriteError;
use crate::namelist::{self, NamelistValue};

use super::notes;
use super::{
    base_namelist, build_wide, format_exponential, format_time, layout_lines, render_header,
    ColumnMeta, LayoutPlaceholders, WideBlock,
};

/// TIMESERIESTYPE values MAGICC recognises.
const TIMESERIES_TYPES: &[&str] = &[
    "AVERAGE_YEAR_START_YEAR",
    "AVERAGE_YEAR_MID_YEAR",
    "AVERAGE_YEAR_END_YEAR",
    "POINT_START_YEAR",
    "POINT_MID_YEAR",
    "POINT_END_YEAR",
    "MONTHLY",
];

pub(crate) fn render(
    dataset: &Dataset,
    definitions: &MagiccDefinitions,
) -> Result<String, WriteError> {
    let dialect = dataset.dialect;
    let descriptor = dialect.descriptor();

    let renamed;
    let dataset = if dialect == Dialect::Scen7 {
        renamed = with_scen7_regions(dataset);
        &renamed
    } else {
        dataset
    };
    let regions = dataset.regions();

    // .MAG files accept any region set; everything else must classify
    let (region_order, dattype, regionmode) = match dialect {
        Dialect::Mag => match definitions.classify(&regions, false) {
            Ok(row) => (
                row.regions.clone(),
                "MAG".to_string(),
                row.regionmode.clone(),
            ),
            Err(_) => {
                warn!(
                    "region set {:?} is not a recognised MAGICC grouping, keeping file order",
                    regions
                );
                let order = regions.iter().map(|r| r.to_string()).collect();
                (order, "MAG".to_string(), "NONE".to_string())
            }
        },
        _ => {
            let row = definitions.classify(&regions, dialect == Dialect::Scen7)?;
            (
                row.regions.clone(),
                row.dattype.clone(),
                row.regionmode.clone(),
            )
        }
    };

    if descriptor.header_style == HeaderStyle::SingleRow && dataset.variables().len() != 1 {
        return Err(WriteError::Validation(format!(
            "a single-row-header file carries exactly one variable, got {:?}",
            dataset.variables()
        )));
    }

    let block = build_wide(dataset, &region_order)?;

    let mut nml = base_namelist(dataset, &block);
    match dialect {
        Dialect::Mag => {
            // the per-column units live in the header rows instead
            nml.shift_remove("THISFILE_UNITS");
            nml.insert(
                "THISFILE_DATTYPE".to_string(),
                NamelistValue::Str(dattype),
            );
            nml.insert(
                "THISFILE_REGIONMODE".to_string(),
                NamelistValue::Str(regionmode),
            );
            let ttype = timeseries_type(dataset, &block)?;
            nml.insert(
                "THISFILE_TIMESERIESTYPE".to_string(),
                NamelistValue::Str(ttype),
            );
        }
        Dialect::Scen | Dialect::Prn => {
            unreachable!("non-namelist dialects have their own writers")
        }
        _ => {
            nml.insert(
                "THISFILE_DATTYPE".to_string(),
                NamelistValue::Str(dattype),
            );
            nml.insert(
                "THISFILE_REGIONMODE".to_string(),
                NamelistValue::Str(regionmode),
            );
        }
    }

    let mut table: Vec<Vec<String>> = Vec::new();
    match descriptor.header_style {
        HeaderStyle::FourRow => {
            let labelled: [(&str, fn(&ColumnMeta) -> String); 4] = [
                (descriptor.variable_label, |c| c.variable.clone()),
                ("TODO", |c| c.todo.clone()),
                ("UNITS", |c| c.unit.clone()),
                (descriptor.time_label, |c| c.region.clone()),
            ];
            for (label, cell) in labelled {
                table.push(
                    std::iter::once(label.to_string())
                        .chain(block.columns.iter().map(cell))
                        .collect(),
                );
            }
        }
        HeaderStyle::SingleRow => {
            table.push(
                std::iter::once("COLCODE".to_string())
                    .chain(block.columns.iter().map(|c| c.region.clone()))
                    .collect(),
            );
        }
    }
    let header_row_count = table.len();

    for (row, time) in block.times.iter().enumerate() {
        let mut cells = vec![format_time(*time)];
        for col in &block.values {
            cells.push(format_value(col[row], descriptor.number_format));
        }
        table.push(cells);
    }

    let mut buffer = render_header(dataset);
    buffer.push('\n');
    buffer.push_str(&namelist::render(&nml));
    buffer.push('\n');
    let first_data_row = buffer.matches('\n').count() + header_row_count + 1;
    buffer.push_str(&layout_lines(&table, descriptor.min_column_width));

    if descriptor.has_notes_section {
        let section = notes::render_section(dataset)?;
        if !section.is_empty() {
            buffer.push('\n');
            buffer.push_str(&section);
        }
    }

    Ok(LayoutPlaceholders::resolve(buffer, &block, first_data_row))
}

/// A `.SCEN7` file carries the `R5.2*` region names; MAGICC6-style `R5*`
/// input is renamed on the way out.
fn with_scen7_regions(dataset: &Dataset) -> Dataset {
    let mut renamed = dataset.clone();
    let mut changed = false;
    for row in renamed.rows.iter_mut() {
        if row.region.starts_with("R5") && !row.region.starts_with("R5.2") {
            row.region = format!("R5.2{}", &row.region[2..]);
            changed = true;
        }
    }
    if changed {
        warn!("renamed R5* regions to their R5.2* names for the scen7 region set");
    }
    renamed
}

fn format_value(v: f64, format: NumberFormat) -> String {
    match format {
        NumberFormat::Exponential => format_exponential(v, 8),
        NumberFormat::Fixed4 => format!("{v:.4}"),
        NumberFormat::Prn => format_exponential(v, 3),
    }
}

/// The validated TIMESERIESTYPE for a `.MAG` file.
fn timeseries_type(dataset: &Dataset, block: &WideBlock) -> Result<String, WriteError> {
    let ttype = dataset
        .descriptor_fields
        .get("timeseriestype")
        .ok_or_else(|| WriteError::MissingMetadata("timeseriestype".to_string()))?
        .to_ascii_uppercase();
    if !TIMESERIES_TYPES.contains(&ttype.as_str()) {
        return Err(WriteError::Validation(format!(
            "unrecognised timeseriestype '{ttype}'"
        )));
    }

    let fraction_is = |want: f64| {
        block
            .times
            .iter()
            .all(|t| ((t - t.floor()) - want).abs() < 1e-6)
    };
    let matches_data = match ttype.as_str() {
        "POINT_START_YEAR" | "AVERAGE_YEAR_START_YEAR" => fraction_is(0.0),
        "POINT_MID_YEAR" | "AVERAGE_YEAR_MID_YEAR" => fraction_is(0.5),
        "MONTHLY" => matches!(block.annual_steps(), 0 | 12),
        _ => true,
    };
    if !matches_data {
        return Err(WriteError::Validation(format!(
            "timeseriestype {ttype} doesn't match the data's timesteps"
        )));
    }
    Ok(ttype)
}
