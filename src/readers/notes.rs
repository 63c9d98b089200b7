//! Parsing of the structured notes section `.MAG` files carry after their
//! data block, and reattachment of each note to the rows it covers.
//!
//! The section looks like
//!
//! ```text
//! NOTES
//! ~~~~~
//! a note that applies to the whole file
//! =================================
//! 2015
//! ~~~~
//! a note on every 2015 row
//! NHOCEAN
//! -------
//! a note on every NHOCEAN row
//! ~~~endnotes~~~
//! ```
//!
//! A scope header is a token line whose next line repeats one underline
//! character to exactly the token's length: `~` for a year, `-` for a
//! region, `=` for a variable. The underline character is authoritative; a
//! region that happens to look like a year is still a region when
//! underlined with `-`. A year header must parse as an integer, and
//! region and variable headers must name a region or variable actually
//! present in the data; otherwise both lines are ordinary note text. Scopes accumulate: a year header narrows the
//! current region or variable scope, a region header resets the year but
//! keeps the variable, a variable header resets both.
use log::warn;

use crate::dataset::Dataset;
use crate::error::{FileLocation, ReadError};

pub(crate) const NOTES_MARKER: &str = "NOTES";
pub(crate) const END_MARKER: &str = "~~~endnotes~~~";
/// The line dividing general notes from per-row notes.
pub(crate) const GENERAL_SEPARATOR_LEN: usize = 33;
pub(crate) const YEAR_UNDERLINE: char = '~';
pub(crate) const REGION_UNDERLINE: char = '-';
pub(crate) const VARIABLE_UNDERLINE: char = '=';

pub(crate) fn general_separator() -> String {
    std::iter::repeat(VARIABLE_UNDERLINE)
        .take(GENERAL_SEPARATOR_LEN)
        .collect()
}

/// One note with the scope it was read under.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedNote {
    pub text: String,
    pub year: Option<i64>,
    pub region: Option<String>,
    pub variable: Option<String>,
}

/// The parsed notes section before reattachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesSection {
    pub general: Vec<String>,
    pub scoped: Vec<ScopedNote>,
}

/// Whether `underline` is `ch` repeated to exactly the length of `token`.
fn underline_matches(token: &str, underline: &str, ch: char) -> bool {
    let token = token.trim();
    let underline = underline.trim();
    !token.is_empty()
        && underline.len() == token.len()
        && underline.chars().all(|c| c == ch)
}

/// Parse a notes section out of the lines trailing the data block.
///
/// Returns `None` when no `NOTES` marker is present. `regions` and
/// `variables` are the names realized in the data, used to validate scope
/// headers.
pub(crate) fn parse_section_in(
    lines: &[String],
    first_line_number: usize,
    regions: &[&str],
    variables: &[&str],
) -> Result<Option<NotesSection>, ReadError> {
    let start = lines.iter().enumerate().position(|(i, l)| {
        l.trim() == NOTES_MARKER
            && lines
                .get(i + 1)
                .is_some_and(|u| underline_matches(NOTES_MARKER, u, YEAR_UNDERLINE))
    });
    let start = match start {
        Some(i) => i,
        None => {
            if lines.iter().any(|l| !l.trim().is_empty()) {
                warn!("ignoring unstructured text after the data block");
            }
            return Ok(None);
        }
    };

    let body = &lines[start + 2..];
    let end = body
        .iter()
        .position(|l| l.trim() == END_MARKER)
        .ok_or_else(|| {
            ReadError::data(
                FileLocation::at_line(first_line_number + start + 1, &lines[start]),
                format!("notes section has no closing '{END_MARKER}' marker"),
            )
        })?;
    let body = &body[..end];

    let separator = general_separator();
    let split = body.iter().position(|l| l.trim() == separator);

    let mut section = NotesSection::default();
    let (general_lines, scoped_lines) = match split {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (body, &body[body.len()..]),
    };
    section.general = general_lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .collect();

    let mut year: Option<i64> = None;
    let mut region: Option<String> = None;
    let mut variable: Option<String> = None;
    let mut i = 0;
    while i < scoped_lines.len() {
        let line = scoped_lines[i].trim();
        if line.is_empty() {
            i += 1;
            continue;
        }
        if let Some(next) = scoped_lines.get(i + 1) {
            if underline_matches(line, next, YEAR_UNDERLINE) {
                if let Ok(parsed) = line.parse::<i64>() {
                    year = Some(parsed);
                    i += 2;
                    continue;
                }
            }
            if underline_matches(line, next, REGION_UNDERLINE) && regions.contains(&line) {
                region = Some(line.to_string());
                year = None;
                i += 2;
                continue;
            }
            if underline_matches(line, next, VARIABLE_UNDERLINE) && variables.contains(&line) {
                variable = Some(line.to_string());
                region = None;
                year = None;
                i += 2;
                continue;
            }
        }
        section.scoped.push(ScopedNote {
            text: line.to_string(),
            year,
            region: region.clone(),
            variable: variable.clone(),
        });
        i += 1;
    }

    Ok(Some(section))
}

/// Convenience wrapper taking the scope names from a dataset.
pub(crate) fn parse_section(
    lines: &[String],
    first_line_number: usize,
) -> Result<Option<NotesSectionRequest>, ReadError> {
    // header detection needs the realized region/variable sets, so the
    // actual parse is deferred until the caller has built the rows
    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(NotesSectionRequest {
        lines: lines.to_vec(),
        first_line_number,
    }))
}

/// The trailing lines of a file, held until the dataset they annotate has
/// been built.
#[derive(Debug, Clone)]
pub(crate) struct NotesSectionRequest {
    lines: Vec<String>,
    first_line_number: usize,
}

/// Parse the held lines against the dataset and attach each note to every
/// row in its scope.
pub(crate) fn attach(dataset: &mut Dataset, request: NotesSectionRequest) -> Result<(), ReadError> {
    let regions: Vec<String> = dataset.regions().iter().map(|r| r.to_string()).collect();
    let variables: Vec<String> = dataset.variables().iter().map(|v| v.to_string()).collect();
    let region_refs: Vec<&str> = regions.iter().map(|r| r.as_str()).collect();
    let variable_refs: Vec<&str> = variables.iter().map(|v| v.as_str()).collect();

    let section = match parse_section_in(
        &request.lines,
        request.first_line_number,
        &region_refs,
        &variable_refs,
    )? {
        Some(section) => section,
        None => return Ok(()),
    };

    dataset.general_notes.extend(section.general);
    for note in section.scoped {
        let mut hits = 0;
        for row in dataset.rows.iter_mut() {
            let in_scope = note.year.is_none_or(|y| row.year() == y)
                && note.region.as_deref().is_none_or(|r| row.region == r)
                && note.variable.as_deref().is_none_or(|v| row.variable == v);
            if in_scope {
                row.notes.push(note.text.clone());
                hits += 1;
            }
        }
        if hits == 0 {
            warn!("note '{}' matched no rows and was dropped", note.text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LogicalRow;
    use crate::dialects::Dialect;
    use rstest::{fixture, rstest};

    fn to_lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[fixture]
    fn dataset() -> Dataset {
        let mut ds = Dataset::new(Dialect::Mag);
        for region in ["WORLD", "NHOCEAN"] {
            for variable in ["CO2I", "CH4"] {
                for year in [2014, 2015] {
                    ds.rows
                        .push(LogicalRow::new(region, variable, "GtC", year as f64, 1.0));
                }
            }
        }
        ds
    }

    #[rstest]
    fn test_scope_accumulation(mut dataset: Dataset) {
        let text = "\
NOTES
~~~~~
general remark
=================================
unscoped data note
2015
~~~~
note for 2015
NHOCEAN
-------
note for NHOCEAN
2014
~~~~
note for NHOCEAN 2014
CH4
===
note for CH4
~~~endnotes~~~
";
        let request = parse_section(&to_lines(text), 0).unwrap().unwrap();
        attach(&mut dataset, request).unwrap();

        assert_eq!(dataset.general_notes, vec!["general remark"]);
        let notes_of = |region: &str, variable: &str, year: i64| -> Vec<String> {
            dataset
                .rows
                .iter()
                .find(|r| r.region == region && r.variable == variable && r.year() == year)
                .unwrap()
                .notes
                .clone()
        };
        // the unscoped note lands everywhere
        assert!(notes_of("WORLD", "CO2I", 2014).contains(&"unscoped data note".to_string()));
        assert!(notes_of("WORLD", "CO2I", 2015).contains(&"note for 2015".to_string()));
        assert!(!notes_of("WORLD", "CO2I", 2014).contains(&"note for 2015".to_string()));
        // region scope cleared the year scope
        assert!(notes_of("NHOCEAN", "CH4", 2014).contains(&"note for NHOCEAN".to_string()));
        // nested region + year scope
        let nested = notes_of("NHOCEAN", "CO2I", 2014);
        assert!(nested.contains(&"note for NHOCEAN 2014".to_string()));
        assert!(!notes_of("NHOCEAN", "CO2I", 2015).contains(&"note for NHOCEAN 2014".to_string()));
        // variable scope cleared region and year
        assert!(notes_of("WORLD", "CH4", 2015).contains(&"note for CH4".to_string()));
        assert!(!notes_of("WORLD", "CO2I", 2015).contains(&"note for CH4".to_string()));
    }

    #[test]
    fn test_underline_character_is_authoritative() {
        // a region named like a year stays a region under '-', and a year
        // token under '~' is a year even though no region matches it
        let lines = to_lines(
            "\
NOTES
~~~~~
=================================
2020
----
region note
2019
~~~~
year note
~~~endnotes~~~
",
        );
        let section = parse_section_in(&lines, 0, &["2020", "WORLD"], &["CO2I"])
            .unwrap()
            .unwrap();
        assert_eq!(section.scoped.len(), 2);
        assert_eq!(section.scoped[0].region.as_deref(), Some("2020"));
        assert_eq!(section.scoped[0].year, None);
        assert_eq!(section.scoped[1].region.as_deref(), Some("2020"));
        assert_eq!(section.scoped[1].year, Some(2019));
    }

    #[test]
    fn test_unknown_region_header_is_plain_text() {
        let lines = to_lines(
            "\
NOTES
~~~~~
=================================
ATLANTIS
--------
still just text
~~~endnotes~~~
",
        );
        let section = parse_section_in(&lines, 0, &["WORLD"], &["CO2I"])
            .unwrap()
            .unwrap();
        let texts: Vec<&str> = section.scoped.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["ATLANTIS", "--------", "still just text"]);
        assert!(section.scoped.iter().all(|n| n.region.is_none()));
    }

    #[test]
    fn test_missing_end_marker() {
        let lines = to_lines("NOTES\n~~~~~\nsome note\n");
        let err = parse_section_in(&lines, 10, &[], &[]).unwrap_err();
        assert!(matches!(err, ReadError::DataError { .. }));
    }

    #[test]
    fn test_no_marker_returns_none() {
        let lines = to_lines("\nsome stray line\n");
        assert!(parse_section_in(&lines, 0, &[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_year_underline_on_non_year_is_plain_text() {
        let lines = to_lines(
            "\
NOTES
~~~~~
=================================
WORLD
~~~~~
note
~~~endnotes~~~
",
        );
        let section = parse_section_in(&lines, 0, &["WORLD"], &[])
            .unwrap()
            .unwrap();
        let texts: Vec<&str> = section.scoped.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["WORLD", "~~~~~", "note"]);
        assert!(section
            .scoped
            .iter()
            .all(|n| n.year.is_none() && n.region.is_none()));
    }
}
