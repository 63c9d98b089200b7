//! Rendering of the structured notes section a `.MAG` file carries after
//! its data block.
//!
//! On write the per-row notes have to be folded back into scope headers.
//! For each note text the sorter peels off the coarsest scopes whose rows
//! the note exactly covers: every row (emitted without a header, so it
//! reattaches to every row), then whole years, whole regions, region-years,
//! whole variables, and the nested variable scopes.
//! A note whose rows survive all of those cannot be expressed in the
//! format; with scopes down to (variable, region, year), which is as fine
//! as a row key gets, that does not happen for notes produced by reading a
//! file back.
use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::dataset::Dataset;
use crate::error::WriteError;
use crate::readers::notes::{
    general_separator, END_MARKER, NOTES_MARKER, REGION_UNDERLINE, VARIABLE_UNDERLINE,
    YEAR_UNDERLINE,
};

/// One note assigned to a single scope.
#[derive(Debug, Clone, PartialEq)]
struct ScopeAssignment {
    year: Option<i64>,
    region: Option<String>,
    variable: Option<String>,
    text: String,
}

/// Render the full notes section, or an empty string when the dataset
/// carries no notes at all.
pub(crate) fn render_section(dataset: &Dataset) -> Result<String, WriteError> {
    let has_row_notes = dataset.rows.iter().any(|r| !r.notes.is_empty());
    if dataset.general_notes.is_empty() && !has_row_notes {
        return Ok(String::new());
    }

    let scoped = sort_notes(dataset)?;

    let mut out = String::new();
    out.push_str(NOTES_MARKER);
    out.push('\n');
    out.push_str(&YEAR_UNDERLINE.to_string().repeat(NOTES_MARKER.len()));
    out.push('\n');

    for note in &dataset.general_notes {
        out.push_str(note);
        out.push('\n');
    }

    if !scoped.is_empty() {
        out.push_str(&general_separator());
        out.push('\n');
        render_scoped(&mut out, dataset, &scoped);
    }

    out.push_str(END_MARKER);
    out.push('\n');
    Ok(out)
}

fn header(out: &mut String, token: &str, underline: char) {
    out.push_str(token);
    out.push('\n');
    out.push_str(&underline.to_string().repeat(token.len()));
    out.push('\n');
}

/// Emit the scoped notes in an order the cumulative scope rules can read
/// back: plain year scopes first, then region scopes with their nested
/// years, then variable scopes with their nested years and regions.
fn render_scoped(out: &mut String, dataset: &Dataset, scoped: &[ScopeAssignment]) {
    // notes covering every row come first, before any header narrows the
    // scope, so reattachment hits the whole file
    for a in scoped
        .iter()
        .filter(|a| a.year.is_none() && a.region.is_none() && a.variable.is_none())
    {
        out.push_str(&a.text);
        out.push('\n');
    }

    let years_of = |matching: &dyn Fn(&ScopeAssignment) -> bool| -> Vec<i64> {
        let years: BTreeSet<i64> = scoped
            .iter()
            .filter(|a| matching(a))
            .filter_map(|a| a.year)
            .collect();
        years.into_iter().collect()
    };
    let emit = |out: &mut String, matching: &dyn Fn(&ScopeAssignment) -> bool| {
        for a in scoped.iter().filter(|a| matching(a)) {
            out.push_str(&a.text);
            out.push('\n');
        }
    };

    for year in years_of(&|a| a.region.is_none() && a.variable.is_none()) {
        header(out, &year.to_string(), YEAR_UNDERLINE);
        emit(out, &|a| {
            a.year == Some(year) && a.region.is_none() && a.variable.is_none()
        });
    }

    for region in dataset.regions() {
        let in_region =
            |a: &ScopeAssignment| a.region.as_deref() == Some(region) && a.variable.is_none();
        if !scoped.iter().any(|a| in_region(a)) {
            continue;
        }
        header(out, region, REGION_UNDERLINE);
        emit(out, &|a| in_region(a) && a.year.is_none());
        for year in years_of(&in_region) {
            header(out, &year.to_string(), YEAR_UNDERLINE);
            emit(out, &|a| in_region(a) && a.year == Some(year));
        }
    }

    for variable in dataset.variables() {
        let in_variable = |a: &ScopeAssignment| a.variable.as_deref() == Some(variable);
        if !scoped.iter().any(|a| in_variable(a)) {
            continue;
        }
        header(out, variable, VARIABLE_UNDERLINE);
        emit(out, &|a| in_variable(a) && a.region.is_none() && a.year.is_none());
        for year in years_of(&|a: &ScopeAssignment| in_variable(a) && a.region.is_none()) {
            header(out, &year.to_string(), YEAR_UNDERLINE);
            emit(out, &|a| {
                in_variable(a) && a.region.is_none() && a.year == Some(year)
            });
        }
        for region in dataset.regions() {
            let in_both =
                |a: &ScopeAssignment| in_variable(a) && a.region.as_deref() == Some(region);
            if !scoped.iter().any(|a| in_both(a)) {
                continue;
            }
            header(out, region, REGION_UNDERLINE);
            emit(out, &|a| in_both(a) && a.year.is_none());
            for year in years_of(&in_both) {
                header(out, &year.to_string(), YEAR_UNDERLINE);
                emit(out, &|a| in_both(a) && a.year == Some(year));
            }
        }
    }
}

/// Fold the per-row notes into scope assignments. A note covering every
/// row becomes a single assignment with no scope at all; it reattaches to
/// every row when read back, unlike an entry in the general section.
fn sort_notes(dataset: &Dataset) -> Result<Vec<ScopeAssignment>, WriteError> {
    // distinct note texts in first-encountered order, with the rows they sit on
    let mut coverage: IndexMap<&str, BTreeSet<usize>> = IndexMap::new();
    for (i, row) in dataset.rows.iter().enumerate() {
        for note in &row.notes {
            coverage.entry(note.as_str()).or_default().insert(i);
        }
    }

    let mut scoped = Vec::new();
    for (text, rows) in coverage {
        if rows.len() == dataset.rows.len() {
            scoped.push(ScopeAssignment {
                year: None,
                region: None,
                variable: None,
                text: text.to_string(),
            });
            continue;
        }
        scoped.extend(assign_scopes(dataset, text, rows)?);
    }
    Ok(scoped)
}

/// The scopes a note can sit under, coarsest first.
#[derive(Debug, Clone, Copy)]
enum ScopeShape {
    Year,
    Region,
    RegionYear,
    Variable,
    VariableYear,
    VariableRegion,
    VariableRegionYear,
}

const SCOPE_SHAPES: &[ScopeShape] = &[
    ScopeShape::Year,
    ScopeShape::Region,
    ScopeShape::RegionYear,
    ScopeShape::Variable,
    ScopeShape::VariableYear,
    ScopeShape::VariableRegion,
    ScopeShape::VariableRegionYear,
];

/// Peel coarsest-first scopes off the note's row set until it is empty.
fn assign_scopes(
    dataset: &Dataset,
    text: &str,
    mut remaining: BTreeSet<usize>,
) -> Result<Vec<ScopeAssignment>, WriteError> {
    let mut assignments = Vec::new();

    for shape in SCOPE_SHAPES {
        // candidate scope keys realized by the rows still uncovered
        let candidates: Vec<(Option<i64>, Option<String>, Option<String>)> = {
            let mut seen = Vec::new();
            for &i in &remaining {
                let row = &dataset.rows[i];
                let key = match shape {
                    ScopeShape::Year => (Some(row.year()), None, None),
                    ScopeShape::Region => (None, Some(row.region.clone()), None),
                    ScopeShape::RegionYear => (Some(row.year()), Some(row.region.clone()), None),
                    ScopeShape::Variable => (None, None, Some(row.variable.clone())),
                    ScopeShape::VariableYear => (Some(row.year()), None, Some(row.variable.clone())),
                    ScopeShape::VariableRegion => {
                        (None, Some(row.region.clone()), Some(row.variable.clone()))
                    }
                    ScopeShape::VariableRegionYear => (
                        Some(row.year()),
                        Some(row.region.clone()),
                        Some(row.variable.clone()),
                    ),
                };
                if !seen.contains(&key) {
                    seen.push(key);
                }
            }
            seen
        };

        for (year, region, variable) in candidates {
            let scope_rows: BTreeSet<usize> = dataset
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    year.is_none_or(|y| row.year() == y)
                        && region.as_deref().is_none_or(|r| row.region == r)
                        && variable.as_deref().is_none_or(|v| row.variable == v)
                })
                .map(|(i, _)| i)
                .collect();
            if scope_rows.is_subset(&remaining) {
                remaining = remaining.difference(&scope_rows).copied().collect();
                assignments.push(ScopeAssignment {
                    year,
                    region,
                    variable,
                    text: text.to_string(),
                });
            }
        }
        if remaining.is_empty() {
            return Ok(assignments);
        }
    }

    Err(WriteError::UnsortableNote(format!(
        "the note '{text}' covers a row set no scope header can express"
    )))
}
