//! Parser for the namelist-prefixed dialects: the `.IN` input family,
//! `.SCEN7` and `.MAG`.
//!
//! These share a layout of free-text header, `&THISFILE_SPECIFICATIONS`
//! namelist, labelled header rows, then one data row per timestep. They
//! differ in how the header rows name the columns and, for `.MAG`, in the
//! structured notes section that may follow the data.
use std::sync::OnceLock;

use log::warn;
use regex::Regex;

use crate::dataset::{Dataset, LogicalRow, DEFAULT_TODO};
use crate::dialects::{Dialect, HeaderStyle, MagiccDefinitions};
use crate::error::{FileLocation, ReadError};
use crate::namelist::{self, NamelistValue};

use super::notes;
use super::{find_data_block, parse_data_line, parse_header, read_labelled_row, to_lines};

/// Labels accepted for the variable header row.
const VARIABLE_LABELS: &[&str] = &["VARIABLE", "GAS"];
/// Labels accepted for the region header row.
const REGION_LABELS: &[&str] = &["REGION", "REGIONS", "COLCODE", "YEARS"];

pub(crate) fn read(
    text: &str,
    dialect: Dialect,
    file_name: Option<&str>,
    definitions: &MagiccDefinitions,
) -> Result<Dataset, ReadError> {
    let lines = to_lines(text);
    let (nml_start, nml_end) = namelist::locate(&lines)?;
    let nml_fields = namelist::parse_block(&lines[nml_start..=nml_end], nml_start)?;
    let header = parse_header(&lines[..nml_start]);

    let body = &lines[nml_end + 1..];
    let span = find_data_block(body)?;
    let header_rows: Vec<(usize, &String)> = body[span.header_start..span.data_start]
        .iter()
        .enumerate()
        .map(|(i, l)| (nml_end + 1 + span.header_start + i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let mut columns = parse_column_headers(
        &header_rows,
        dialect,
        file_name,
        &nml_fields,
        &header,
        definitions,
    )?;
    match dialect {
        Dialect::EmisIn => {
            for (unit, variable) in columns.units.iter_mut().zip(&columns.variables) {
                *unit = normalise_emissions_unit(unit, variable);
            }
        }
        Dialect::RfIn => {
            for unit in columns.units.iter_mut() {
                if unit == "W/m2" || unit == "W/m^2" {
                    *unit = "W / m^2".to_string();
                }
            }
        }
        _ => {}
    }

    let mut dataset = Dataset::new(dialect);
    dataset.descriptor_fields = header.descriptor_fields;
    // optical thickness files are normalised series, the scaling unit is
    // kept as metadata rather than on the rows
    if dialect == Dialect::OtIn {
        if let Some(first) = columns.units.first().cloned() {
            dataset
                .descriptor_fields
                .entry("unit normalisation".to_string())
                .or_insert(first);
            for unit in columns.units.iter_mut() {
                *unit = "dimensionless".to_string();
            }
        }
    }
    if !header.free_lines.is_empty() {
        dataset
            .descriptor_fields
            .insert("header".to_string(), header.free_lines.join("\n"));
    }
    if let Some(tst) = nml_fields
        .get("THISFILE_TIMESERIESTYPE")
        .and_then(|v| v.as_str())
    {
        dataset
            .descriptor_fields
            .entry("timeseriestype".to_string())
            .or_insert_with(|| tst.to_string());
    }

    let ncols = columns.regions.len();
    let mut times = Vec::new();
    let mut grid: Vec<Vec<f64>> = vec![Vec::new(); ncols];
    for (i, line) in body[span.data_start..span.data_end].iter().enumerate() {
        let line_number = nml_end + 1 + span.data_start + i + 1;
        let (time, values) = parse_data_line(line, line_number, ncols)?;
        times.push(time);
        for (col, v) in values.into_iter().enumerate() {
            grid[col].push(v);
        }
    }

    check_against_namelist(&nml_fields, ncols, &times);

    for col in 0..ncols {
        for (row, time) in times.iter().enumerate() {
            dataset.rows.push(LogicalRow {
                region: columns.regions[col].clone(),
                variable: columns.variables[col].clone(),
                unit: columns.units[col].clone(),
                todo: columns.todos[col].clone(),
                time: *time,
                value: grid[col][row],
                notes: Vec::new(),
            });
        }
    }

    if dialect.descriptor().has_notes_section {
        let trailing = &body[span.data_end..];
        if let Some(request) = notes::parse_section(trailing, nml_end + 1 + span.data_end)? {
            notes::attach(&mut dataset, request)?;
        }
    }

    Ok(dataset)
}

struct ColumnHeaders {
    regions: Vec<String>,
    variables: Vec<String>,
    units: Vec<String>,
    todos: Vec<String>,
}

fn parse_column_headers(
    header_rows: &[(usize, &String)],
    dialect: Dialect,
    file_name: Option<&str>,
    nml_fields: &namelist::NamelistFields,
    header: &super::HeaderBlock,
    definitions: &MagiccDefinitions,
) -> Result<ColumnHeaders, ReadError> {
    let style = detect_header_style(header_rows)?;
    match style {
        HeaderStyle::FourRow => {
            let n = header_rows.len();
            let (vl, variable_line) = header_rows[n - 4];
            let (tl, todo_line) = header_rows[n - 3];
            let (ul, unit_line) = header_rows[n - 2];
            let (rl, region_line) = header_rows[n - 1];

            // some dialects decorate their gas tokens with a prefix or
            // suffix that is not part of the variable name
            let variables: Vec<String> = read_labelled_row(variable_line, vl, VARIABLE_LABELS)?
                .into_iter()
                .map(|v| clean_variable_token(dialect, v))
                .collect();
            let todos = read_labelled_row(todo_line, tl, &["TODO"])?;
            let units = read_labelled_row(unit_line, ul, &["UNITS"])?;
            let regions: Vec<String> = read_labelled_row(region_line, rl, REGION_LABELS)?
                .into_iter()
                .map(|r| definitions.normalise_region(&r))
                .collect();

            for (name, row) in [
                ("variable", &variables),
                ("todo", &todos),
                ("unit", &units),
            ] {
                if row.len() != regions.len() {
                    return Err(ReadError::header_mismatch(
                        FileLocation::at_line(rl, region_line),
                        format!(
                            "the {} row names {} column(s) but the region row names {}",
                            name,
                            row.len(),
                            regions.len()
                        ),
                    ));
                }
            }
            Ok(ColumnHeaders {
                regions,
                variables,
                units,
                todos,
            })
        }
        HeaderStyle::SingleRow => {
            let (rl, region_line) = header_rows[header_rows.len() - 1];
            let regions: Vec<String> = read_labelled_row(region_line, rl, REGION_LABELS)?
                .into_iter()
                .map(|r| definitions.normalise_region(&r))
                .collect();

            let variable = variable_from_filename(dialect, file_name).ok_or_else(|| {
                ReadError::header_mismatch(
                    FileLocation::at_line(rl, region_line),
                    "single-row header and no file name to infer the variable from",
                )
            })?;
            let unit = single_header_unit(nml_fields, header).ok_or_else(|| {
                ReadError::header_mismatch(
                    FileLocation::at_line(rl, region_line),
                    "single-row header but no unit declared in the namelist or header",
                )
            })?;

            let n = regions.len();
            Ok(ColumnHeaders {
                regions,
                variables: vec![variable; n],
                units: vec![unit; n],
                todos: vec![DEFAULT_TODO.to_string(); n],
            })
        }
    }
}

fn detect_header_style(header_rows: &[(usize, &String)]) -> Result<HeaderStyle, ReadError> {
    if header_rows.is_empty() {
        return Err(ReadError::header_mismatch(
            FileLocation::default(),
            "no header rows above the data block",
        ));
    }
    if header_rows.len() >= 4 {
        let (_, candidate) = header_rows[header_rows.len() - 4];
        let first = candidate.split_whitespace().next().unwrap_or_default();
        if VARIABLE_LABELS.iter().any(|l| l.eq_ignore_ascii_case(first)) {
            return Ok(HeaderStyle::FourRow);
        }
    }
    Ok(HeaderStyle::SingleRow)
}

fn clean_variable_token(dialect: Dialect, token: String) -> String {
    match dialect {
        Dialect::EmisIn | Dialect::Scen7 => token
            .strip_prefix("EMIS-")
            .map(|s| s.to_string())
            .unwrap_or(token),
        Dialect::ConcIn => token.replace("_MIXINGRATIO", ""),
        Dialect::OtIn => token
            .strip_prefix("OT-")
            .map(|s| s.to_string())
            .unwrap_or(token),
        Dialect::RfIn => token
            .strip_prefix("FORC-")
            .map(|s| s.to_string())
            .unwrap_or(token),
        _ => token,
    }
}

fn variable_from_filename(dialect: Dialect, file_name: Option<&str>) -> Option<String> {
    let re = dialect.filename_variable_regex()?;
    let name = file_name?.to_ascii_uppercase();
    re.captures(&name).map(|caps| caps[1].to_string())
}

/// The single unit a one-row-header file declares, from the namelist or a
/// header tag. A parenthesised suffix like "Gg (N)" means the inner token.
fn single_header_unit(
    nml_fields: &namelist::NamelistFields,
    header: &super::HeaderBlock,
) -> Option<String> {
    let raw = nml_fields
        .get("THISFILE_UNITS")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .or_else(|| header.descriptor_fields.get("unit").cloned())
        .or_else(|| header.descriptor_fields.get("units").cloned())?;
    if let (Some(open), Some(close)) = (raw.find('('), raw.rfind(')')) {
        if open < close {
            return Some(raw[open + 1..close].trim().to_string());
        }
    }
    Some(raw.trim().to_string())
}

/// Mass prefixes an emissions unit can start with, two-letter prefixes
/// first so "Gt" wins over "t".
const MASS_PREFIXES: &[&str] = &["Gt", "Mt", "kt", "Pg", "Gg", "Mg", "kg", "t", "g"];

fn per_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\S)\s?/\s?yr").expect("hardcoded pattern must compile"))
}

/// Normalise an emissions unit to "<mass> <species> / yr" form, e.g.
/// "MtS" to "Mt S / yr". A bare mass takes its species from the variable
/// name; a unit with no known mass prefix passes through with a warning.
fn normalise_emissions_unit(unit: &str, variable: &str) -> String {
    let cleaned = unit.replace('-', "");
    let Some(mass) = MASS_PREFIXES.iter().find(|m| cleaned.starts_with(**m)) else {
        warn!("no mass prefix in emissions unit '{unit}', keeping it unchanged");
        return unit.to_string();
    };
    let mut species = cleaned[mass.len()..].trim().to_string();
    if species.is_empty() {
        species = variable
            .strip_suffix("_EMIS")
            .unwrap_or(variable)
            .to_string();
    }
    let species = if species.contains('/') {
        per_year_regex().replace_all(&species, "$1 / yr").to_string()
    } else {
        format!("{species} / yr")
    };
    format!("{mass} {species}")
}

/// Compare what the namelist claims about the layout against what the data
/// block actually holds. Disagreement is tolerated but logged; real-world
/// files are not always self-consistent.
fn check_against_namelist(nml_fields: &namelist::NamelistFields, ncols: usize, times: &[f64]) {
    let claimed = |key: &str| nml_fields.get(key).and_then(NamelistValue::as_int);

    if let Some(c) = claimed("THISFILE_DATACOLUMNS") {
        if c != ncols as i64 {
            warn!("THISFILE_DATACOLUMNS = {c} but the data block has {ncols} column(s)");
        }
    }
    if let Some(r) = claimed("THISFILE_DATAROWS") {
        if r != times.len() as i64 {
            warn!(
                "THISFILE_DATAROWS = {r} but the data block has {} row(s)",
                times.len()
            );
        }
    }
    if let (Some(first), Some(t)) = (claimed("THISFILE_FIRSTYEAR"), times.first()) {
        if first != t.floor() as i64 {
            warn!("THISFILE_FIRSTYEAR = {first} but the first data row is at {t}");
        }
    }
    if let (Some(last), Some(t)) = (claimed("THISFILE_LASTYEAR"), times.last()) {
        if last != t.floor() as i64 {
            warn!("THISFILE_LASTYEAR = {last} but the last data row is at {t}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn scen7_text() -> String {
        "Date: 2024-01-31\n\
         Description: a minimal scenario\n\
         \n\
         &THISFILE_SPECIFICATIONS\n \
         THISFILE_DATACOLUMNS = 2 ,\n \
         THISFILE_DATAROWS    = 3 ,\n \
         THISFILE_FIRSTYEAR   = 2010 ,\n \
         THISFILE_LASTYEAR    = 2012 ,\n \
         THISFILE_ANNUALSTEPS = 1 ,\n \
         THISFILE_FIRSTDATAROW = 12 ,\n \
         THISFILE_UNITS       = \"MISC\" ,\n \
         THISFILE_DATTYPE     = \"SCEN7\" ,\n \
         THISFILE_REGIONMODE  = \"WORLD\" ,\n\
         /\n\
         \n    \
         VARIABLE        CO2I         CH4\n        \
         TODO         SET         SET\n       \
         UNITS         GtC      MtCH4\n       \
         YEARS       WORLD       WORLD\n        \
         2010   8.0000000e+00   3.0000000e+02\n        \
         2011   1.0000000e+01   2.5000000e+02\n        \
         2012   9.0000000e+00   2.0000000e+02\n"
            .to_string()
    }

    #[rstest]
    fn test_read_scen7(scen7_text: String) {
        let defs = MagiccDefinitions::default();
        let ds = read(&scen7_text, Dialect::Scen7, None, &defs).unwrap();
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.variables(), vec!["CO2I", "CH4"]);
        assert_eq!(ds.regions(), vec!["WORLD"]);
        // variable-major row order
        assert_eq!(ds.rows[0].variable, "CO2I");
        approx::assert_abs_diff_eq!(ds.rows[0].time, 2010.0);
        approx::assert_abs_diff_eq!(ds.rows[0].value, 8.0);
        assert_eq!(ds.rows[3].variable, "CH4");
        approx::assert_abs_diff_eq!(ds.rows[5].value, 200.0);
        assert_eq!(ds.descriptor_fields["date"], "2024-01-31");
    }

    #[rstest]
    fn test_mismatched_header_row_lengths(scen7_text: String) {
        let defs = MagiccDefinitions::default();
        let broken = scen7_text.replace("TODO         SET         SET", "TODO         SET");
        let err = read(&broken, Dialect::Scen7, None, &defs).unwrap_err();
        assert!(matches!(err, ReadError::HeaderMismatch { .. }));
    }

    #[rstest]
    fn test_short_data_line(scen7_text: String) {
        let defs = MagiccDefinitions::default();
        let broken = scen7_text.replace(
            "2011   1.0000000e+01   2.5000000e+02\n",
            "2011   1.0000000e+01\n",
        );
        let err = read(&broken, Dialect::Scen7, None, &defs).unwrap_err();
        assert!(matches!(
            err,
            ReadError::InconsistentColumnCount {
                in_header: 2,
                in_data: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_read_emis_in_single_row_header() {
        let text = "Data: historical SOx emissions\n\
                    \n\
                    &THISFILE_SPECIFICATIONS\n \
                    THISFILE_DATACOLUMNS = 5 ,\n \
                    THISFILE_DATAROWS    = 2 ,\n \
                    THISFILE_FIRSTYEAR   = 2000 ,\n \
                    THISFILE_LASTYEAR    = 2001 ,\n \
                    THISFILE_ANNUALSTEPS = 1 ,\n \
                    THISFILE_FIRSTDATAROW = 10 ,\n \
                    THISFILE_UNITS       = \"MtS\" ,\n\
                    /\n\
                    COLCODE GLOBAL NH-OCEAN NH-LAND SH-OCEAN SH-LAND\n\
                    2000 60.0 10.0 30.0 5.0 15.0\n\
                    2001 61.0 10.1 30.2 5.1 15.6\n";
        let defs = MagiccDefinitions::default();
        let ds = read(text, Dialect::EmisIn, Some("HIST_SOX_EMIS.IN"), &defs).unwrap();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.variables(), vec!["SOX_EMIS"]);
        assert_eq!(
            ds.regions(),
            vec!["WORLD", "NHOCEAN", "NHLAND", "SHOCEAN", "SHLAND"]
        );
        assert!(ds.rows.iter().all(|r| r.unit == "Mt S / yr" && r.todo == "SET"));
    }

    #[rstest]
    #[case("MtS", "SOX_EMIS", "Mt S / yr")]
    #[case("kt", "CF4_EMIS", "kt CF4 / yr")]
    #[case("Mt N2O-N / yr", "N2ON_EMIS", "Mt N2ON / yr")]
    #[case("GtC/yr", "CO2I_EMIS", "Gt C / yr")]
    #[case("ppt", "SOX_EMIS", "ppt")]
    fn test_normalise_emissions_unit(
        #[case] unit: &str,
        #[case] variable: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(normalise_emissions_unit(unit, variable), expected);
    }

    #[test]
    fn test_read_conc_in_single_row_header() {
        let text = "Data: historical CO2 concentrations\n\
                    \n\
                    &THISFILE_SPECIFICATIONS\n \
                    THISFILE_DATACOLUMNS = 5 ,\n \
                    THISFILE_FIRSTYEAR   = 2000 ,\n \
                    THISFILE_LASTYEAR    = 2001 ,\n \
                    THISFILE_ANNUALSTEPS = 1 ,\n \
                    THISFILE_FIRSTDATAROW = 10 ,\n \
                    THISFILE_UNITS       = \"ppm\" ,\n\
                    /\n\
                    COLCODE GLOBAL NH-OCEAN NH-LAND SH-OCEAN SH-LAND\n\
                    2000 368.0 367.1 369.0 367.5 368.2\n\
                    2001 369.5 368.6 370.4 369.0 369.8\n";
        let defs = MagiccDefinitions::default();
        let ds = read(text, Dialect::ConcIn, Some("HISTRCP_CO2_CONC.IN"), &defs).unwrap();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.variables(), vec!["CO2_CONC"]);
        assert_eq!(
            ds.regions(),
            vec!["WORLD", "NHOCEAN", "NHLAND", "SHOCEAN", "SHLAND"]
        );
        assert!(ds.rows.iter().all(|r| r.unit == "ppm"));
    }

    #[rstest]
    fn test_conc_in_strips_mixingratio_tokens(scen7_text: String) {
        let text = scen7_text.replace("CO2I", "CO2I_MIXINGRATIO");
        let defs = MagiccDefinitions::default();
        let ds = read(&text, Dialect::ConcIn, None, &defs).unwrap();
        assert_eq!(ds.variables(), vec!["CO2I", "CH4"]);
    }

    #[rstest]
    fn test_rf_in_normalises_forcing_units(scen7_text: String) {
        let text = scen7_text
            .replace("CO2I", "FORC-CO2I")
            .replace("GtC", "W/m2")
            .replace("MtCH4", "W/m^2");
        let defs = MagiccDefinitions::default();
        let ds = read(&text, Dialect::RfIn, None, &defs).unwrap();
        assert_eq!(ds.variables(), vec!["CO2I", "CH4"]);
        assert!(ds.rows.iter().all(|r| r.unit == "W / m^2"));
    }

    #[rstest]
    fn test_ot_in_unit_becomes_normalisation_metadata(scen7_text: String) {
        let text = scen7_text.replace("CO2I", "OT-CO2I");
        let defs = MagiccDefinitions::default();
        let ds = read(&text, Dialect::OtIn, None, &defs).unwrap();
        assert_eq!(ds.variables(), vec!["CO2I", "CH4"]);
        assert!(ds.rows.iter().all(|r| r.unit == "dimensionless"));
        assert_eq!(ds.descriptor_fields["unit normalisation"], "GtC");
    }

    #[test]
    fn test_single_row_header_needs_file_name() {
        let text = "&THISFILE_SPECIFICATIONS\n \
                    THISFILE_UNITS = \"MtS\" ,\n\
                    /\n\
                    COLCODE WORLD\n\
                    2000 60.0\n";
        let defs = MagiccDefinitions::default();
        let err = read(text, Dialect::EmisIn, None, &defs).unwrap_err();
        assert!(matches!(err, ReadError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_parenthesised_unit() {
        let mut nml = namelist::NamelistFields::new();
        nml.insert(
            "THISFILE_UNITS".to_string(),
            NamelistValue::Str("Gg (N)".to_string()),
        );
        let header = crate::readers::HeaderBlock::default();
        assert_eq!(single_header_unit(&nml, &header).unwrap(), "N");
    }
}
