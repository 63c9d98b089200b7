//! The registry of MAGICC file-format dialects and the region/gas
//! classification tables shared by the readers and writers.
//!
//! A [`DialectDescriptor`] captures how one format variant differs from the
//! others (header labels, namelist presence, data block orientation,
//! numeric layout). [`MagiccDefinitions`] carries the data-side knowledge:
//! which region sets MAGICC recognises, which gases belong in a `.SCEN` or
//! `.prn` file, and the region name synonyms older files use. The
//! definitions are plain data passed into the writers so callers can swap
//! in their own tables for a customised MAGICC build.
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{DialectError, WriteError};

/// The file-format family a MAGICC file belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Dialect {
    /// Legacy MAGICC5/6 scenario files (`.SCEN`), no namelist, data grouped
    /// by region.
    #[strum(serialize = "SCEN")]
    Scen,
    /// MAGICC7 scenario files (`.SCEN7`).
    #[strum(serialize = "SCEN7")]
    Scen7,
    /// Historical emissions input files (`*_EMIS*.IN`).
    #[strum(serialize = "EMIS_IN")]
    EmisIn,
    /// Concentration input files (`*_CONC*.IN`).
    #[strum(serialize = "CONC_IN")]
    ConcIn,
    /// Optical thickness input files (`*_OT.IN`).
    #[strum(serialize = "OT_IN")]
    OtIn,
    /// Radiative forcing input files (`*_RF.IN` and `*_RF.MON`).
    #[strum(serialize = "RF_IN")]
    RfIn,
    /// Surface temperature input files (`*SURFACE_TEMP.IN`).
    #[strum(serialize = "SURFACE_TEMP_IN")]
    SurfaceTempIn,
    /// Legacy halogenated-gas files (`.prn`), fixed-width with no namelist.
    #[strum(serialize = "PRN")]
    Prn,
    /// Self-describing output files (`.MAG`) with a notes section.
    #[strum(serialize = "MAG")]
    Mag,
}

impl Dialect {
    /// Select the dialect implied by a file name.
    pub fn from_path(path: &Path) -> Result<Self, DialectError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_uppercase())
            .unwrap_or_default();
        if name.ends_with(".SCEN7") {
            Ok(Self::Scen7)
        } else if name.ends_with(".SCEN") {
            Ok(Self::Scen)
        } else if name.ends_with(".MAG") {
            Ok(Self::Mag)
        } else if name.ends_with(".PRN") {
            Ok(Self::Prn)
        } else if name.ends_with(".IN") && name.contains("_EMIS") {
            Ok(Self::EmisIn)
        } else if name.ends_with(".IN") && name.contains("_CONC") {
            Ok(Self::ConcIn)
        } else if name.ends_with("_OT.IN") {
            Ok(Self::OtIn)
        } else if name.ends_with("_RF.IN") || name.ends_with("_RF.MON") {
            Ok(Self::RfIn)
        } else if name.ends_with("SURFACE_TEMP.IN") || name.ends_with("SURFACE_TEMP.MON") {
            Ok(Self::SurfaceTempIn)
        } else {
            Err(DialectError::UnknownExtension(name))
        }
    }

    /// Look a dialect up by its tag, e.g. from configuration.
    pub fn resolve(tag: &str) -> Result<&'static DialectDescriptor, DialectError> {
        let dialect =
            Self::from_str(tag).map_err(|_| DialectError::UnknownDialect(tag.to_string()))?;
        Ok(dialect.descriptor())
    }

    pub fn descriptor(&self) -> &'static DialectDescriptor {
        match self {
            Self::Scen => &SCEN_DESCRIPTOR,
            Self::Scen7 => &SCEN7_DESCRIPTOR,
            Self::EmisIn => &EMIS_IN_DESCRIPTOR,
            Self::ConcIn => &CONC_IN_DESCRIPTOR,
            Self::OtIn => &OT_IN_DESCRIPTOR,
            Self::RfIn => &RF_IN_DESCRIPTOR,
            Self::SurfaceTempIn => &SURFACE_TEMP_IN_DESCRIPTOR,
            Self::Prn => &PRN_DESCRIPTOR,
            Self::Mag => &MAG_DESCRIPTOR,
        }
    }

    /// The pattern that extracts a variable name from a file name, for
    /// dialects whose files do not label the variable in their headers.
    pub fn filename_variable_regex(&self) -> Option<&'static Regex> {
        match self {
            Self::EmisIn => {
                static RE: OnceLock<Regex> = OnceLock::new();
                Some(RE.get_or_init(|| {
                    Regex::new(r"_(\w*_EMIS)\.IN$").expect("hardcoded pattern must compile")
                }))
            }
            Self::ConcIn => {
                static RE: OnceLock<Regex> = OnceLock::new();
                Some(RE.get_or_init(|| {
                    Regex::new(r"_(\w*-?\w*_CONC)\.IN$").expect("hardcoded pattern must compile")
                }))
            }
            Self::OtIn => {
                static RE: OnceLock<Regex> = OnceLock::new();
                Some(RE.get_or_init(|| {
                    Regex::new(r"_(\w*_OT)\.IN$").expect("hardcoded pattern must compile")
                }))
            }
            Self::RfIn => {
                static RE: OnceLock<Regex> = OnceLock::new();
                Some(RE.get_or_init(|| {
                    Regex::new(r"_(\w*_RF)\.(?:IN|MON)$").expect("hardcoded pattern must compile")
                }))
            }
            Self::SurfaceTempIn => {
                static RE: OnceLock<Regex> = OnceLock::new();
                Some(RE.get_or_init(|| {
                    Regex::new(r"_(SURFACE_TEMP)\.(?:IN|MON)$")
                        .expect("hardcoded pattern must compile")
                }))
            }
            _ => None,
        }
    }
}

/// How the data block header rows are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// MAGICC7 style: VARIABLE (or GAS), TODO, UNITS and YEARS rows.
    FourRow,
    /// MAGICC6 style: one COLCODE row naming the columns, with variable and
    /// unit taken from the file name and the namelist.
    SingleRow,
}

/// Numeric layout of the data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// 19-character scientific notation with 8 decimal places.
    Exponential,
    /// Fixed-point with 4 decimal places, as legacy scenario files use.
    Fixed4,
    /// The `.prn` mix: whole numbers for emissions, 3-decimal scientific
    /// notation for concentrations.
    Prn,
}

/// Immutable description of one format variant's rules.
#[derive(Debug, Clone)]
pub struct DialectDescriptor {
    pub dialect: Dialect,
    /// Label of the variable header row when writing.
    pub variable_label: &'static str,
    /// Labels accepted for the region header row when reading.
    pub region_labels: &'static [&'static str],
    /// Label of the time column.
    pub time_label: &'static str,
    pub header_style: HeaderStyle,
    pub has_namelist: bool,
    /// Whether the data block is grouped into one sub-block per region
    /// rather than one row per timestep.
    pub block_major: bool,
    /// Whether free text after the data block is parsed as a structured
    /// notes section.
    pub has_notes_section: bool,
    pub number_format: NumberFormat,
    /// Narrowest column the dialect permits, padding included.
    pub min_column_width: usize,
}

/// Labels any dialect accepts for the region header row.
const REGION_LABELS: &[&str] = &["REGION", "REGIONS", "COLCODE", "YEARS"];

static SCEN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::Scen,
    variable_label: "YEARS",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: false,
    block_major: true,
    has_notes_section: false,
    number_format: NumberFormat::Fixed4,
    min_column_width: 11,
};

static SCEN7_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::Scen7,
    variable_label: "GAS",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Fixed4,
    min_column_width: 11,
};

static EMIS_IN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::EmisIn,
    variable_label: "GAS",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::SingleRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

static CONC_IN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::ConcIn,
    variable_label: "VARIABLE",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

static OT_IN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::OtIn,
    variable_label: "VARIABLE",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

static RF_IN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::RfIn,
    variable_label: "VARIABLE",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

static SURFACE_TEMP_IN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::SurfaceTempIn,
    variable_label: "VARIABLE",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

static PRN_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::Prn,
    variable_label: "YEARS",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::SingleRow,
    has_namelist: false,
    block_major: false,
    has_notes_section: false,
    number_format: NumberFormat::Prn,
    min_column_width: 10,
};

static MAG_DESCRIPTOR: DialectDescriptor = DialectDescriptor {
    dialect: Dialect::Mag,
    variable_label: "VARIABLE",
    region_labels: REGION_LABELS,
    time_label: "YEARS",
    header_style: HeaderStyle::FourRow,
    has_namelist: true,
    block_major: false,
    has_notes_section: true,
    number_format: NumberFormat::Exponential,
    min_column_width: 20,
};

/// One recognised region set with its MAGICC flags.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionClassification {
    /// Value of THISFILE_DATTYPE for this region set.
    pub dattype: String,
    /// Value of THISFILE_REGIONMODE for this region set.
    pub regionmode: String,
    /// The regions, in the column order MAGICC expects on write.
    pub regions: Vec<String>,
    /// Whether this row applies to SCEN7-family files.
    pub scen7: bool,
}

impl RegionClassification {
    fn new(dattype: &str, regionmode: &str, regions: &[&str], scen7: bool) -> Self {
        Self {
            dattype: dattype.to_string(),
            regionmode: regionmode.to_string(),
            regions: regions.iter().map(|r| r.to_string()).collect(),
            scen7,
        }
    }
}

/// The data-side definitions MAGICC builds bake in.
///
/// `Default` matches the standard MAGICC6/MAGICC7 distribution; pass a
/// modified copy for builds with extra regions or gases.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MagiccDefinitions {
    /// Recognised region sets, checked by exact set equality.
    pub region_classifications: Vec<RegionClassification>,
    /// Gases present in a `.SCEN` file whose emissions code is 0.
    pub scen_gases_code_0: Vec<String>,
    /// Gases present in a `.SCEN` file whose emissions code is 1.
    pub scen_gases_code_1: Vec<String>,
    /// Gas column order of a `.prn` file.
    pub prn_species: Vec<String>,
    /// Region name synonyms found in older files, mapped to canonical names.
    pub region_synonyms: Vec<(String, String)>,
}

/// Gases in a code-1 `.SCEN` file, in file column order.
const SCEN_GASES_CODE_1: &[&str] = &[
    "CO2I", "CO2B", "CH4", "N2O", "SOX", "CO", "NMVOC", "NOX", "BC", "OC", "NH3", "CF4", "C2F6",
    "C6F14", "HFC23", "HFC32", "HFC4310", "HFC125", "HFC134A", "HFC143A", "HFC227EA", "HFC245FA",
    "SF6",
];

/// Gas columns of a `.prn` file, in file column order.
const PRN_SPECIES: &[&str] = &[
    "CFC11", "CFC12", "CFC113", "CFC114", "CFC115", "CCL4", "CH3CCL3", "HCFC22", "HCFC141B",
    "HCFC142B", "HALON1211", "HALON1202", "HALON1301", "HALON2402", "CH3BR", "CH3CL",
];

const FOURBOX: &[&str] = &["WORLD", "NHOCEAN", "NHLAND", "SHOCEAN", "SHLAND"];
const RCP_REGIONS: &[&str] = &["WORLD", "R5OECD", "R5REF", "R5ASIA", "R5MAF", "R5LAM"];
const RCP_BUNKERS: &[&str] = &[
    "WORLD", "R5OECD", "R5REF", "R5ASIA", "R5MAF", "R5LAM", "BUNKERS",
];
const RCP_SCEN7: &[&str] = &[
    "WORLD", "R5.2OECD", "R5.2REF", "R5.2ASIA", "R5.2MAF", "R5.2LAM",
];
const RCP_SCEN7_BUNKERS: &[&str] = &[
    "WORLD", "R5.2OECD", "R5.2REF", "R5.2ASIA", "R5.2MAF", "R5.2LAM", "BUNKERS",
];
const SRES_REGIONS: &[&str] = &["WORLD", "OECD90", "REF", "ASIA", "ALM"];

impl Default for MagiccDefinitions {
    fn default() -> Self {
        let region_classifications = vec![
            RegionClassification::new("REGIONDATA", "NONE", &["WORLD"], false),
            RegionClassification::new("REGIONDATA", "FOURBOX", FOURBOX, false),
            RegionClassification::new("REGIONDATA", "RCP", RCP_REGIONS, false),
            RegionClassification::new("REGIONDATA", "RCPPLUSBUNKERS", RCP_BUNKERS, false),
            RegionClassification::new("SCEN7", "WORLD", &["WORLD"], true),
            RegionClassification::new("SCEN7", "FOURBOX", FOURBOX, true),
            RegionClassification::new("SCEN7", "RCP", RCP_SCEN7, true),
            RegionClassification::new("SCEN7", "RCPPLUSBUNKERS", RCP_SCEN7_BUNKERS, true),
        ];

        let scen_gases_code_1: Vec<String> =
            SCEN_GASES_CODE_1.iter().map(|g| g.to_string()).collect();
        let scen_gases_code_0 = scen_gases_code_1
            .iter()
            .filter(|g| !matches!(g.as_str(), "BC" | "OC" | "NH3"))
            .cloned()
            .collect();

        let region_synonyms = [
            ("GLOBAL", "WORLD"),
            ("NH-OCEAN", "NHOCEAN"),
            ("NH-LAND", "NHLAND"),
            ("SH-OCEAN", "SHOCEAN"),
            ("SH-LAND", "SHLAND"),
            ("NO", "NHOCEAN"),
            ("NL", "NHLAND"),
            ("SO", "SHOCEAN"),
            ("SL", "SHLAND"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        Self {
            region_classifications,
            scen_gases_code_0,
            scen_gases_code_1,
            prn_species: PRN_SPECIES.iter().map(|g| g.to_string()).collect(),
            region_synonyms,
        }
    }
}

impl MagiccDefinitions {
    /// Map a raw region token to its canonical name.
    pub fn normalise_region(&self, raw: &str) -> String {
        let token = raw.trim().to_ascii_uppercase();
        self.region_synonyms
            .iter()
            .find(|(from, _)| *from == token)
            .map(|(_, to)| to.clone())
            .unwrap_or(token)
    }

    /// Find the classification row whose region set exactly matches the
    /// given regions. `scen7` selects between the MAGICC6 and SCEN7 halves
    /// of the table.
    pub fn classify(
        &self,
        regions: &[&str],
        scen7: bool,
    ) -> Result<&RegionClassification, WriteError> {
        let wanted: BTreeSet<String> = regions.iter().map(|r| self.normalise_region(r)).collect();
        self.region_classifications
            .iter()
            .filter(|c| c.scen7 == scen7)
            .find(|c| {
                let have: BTreeSet<String> = c.regions.iter().cloned().collect();
                have == wanted
            })
            .ok_or_else(|| WriteError::UnrecognisedRegions {
                regions: wanted.into_iter().collect(),
            })
    }

    /// The two-digit code at the top of a `.SCEN` file.
    ///
    /// The tens digit encodes the region set, the units digit which gas set
    /// the file carries.
    pub fn special_scen_code(
        &self,
        regions: &[&str],
        variables: &[&str],
    ) -> Result<i64, WriteError> {
        let gases: BTreeSet<String> = variables
            .iter()
            .map(|v| v.trim().to_ascii_uppercase())
            .collect();
        let code_0: BTreeSet<String> = self.scen_gases_code_0.iter().cloned().collect();
        let code_1: BTreeSet<String> = self.scen_gases_code_1.iter().cloned().collect();
        let emissions_code = if gases == code_0 {
            0
        } else if gases == code_1 {
            1
        } else {
            return Err(WriteError::Validation(format!(
                "could not determine the scen emissions code for gases {gases:?}"
            )));
        };

        let region_set: BTreeSet<String> =
            regions.iter().map(|r| self.normalise_region(r)).collect();
        let region_sets: [&[&str]; 4] = [&["WORLD"], SRES_REGIONS, RCP_REGIONS, RCP_BUNKERS];
        let region_code = region_sets
            .iter()
            .position(|set| {
                let candidate: BTreeSet<String> = set.iter().map(|r| r.to_string()).collect();
                candidate == region_set
            })
            .map(|i| i as i64 + 1)
            .ok_or_else(|| WriteError::UnrecognisedRegions {
                regions: region_set.into_iter().collect(),
            })?;

        Ok(region_code * 10 + emissions_code)
    }

    /// Canonical block order for the region sets a `.SCEN` file accepts.
    /// These include the SRES five-region set, which no other dialect uses.
    pub fn scen_region_order(&self, regions: &[&str]) -> Result<Vec<String>, WriteError> {
        let region_set: BTreeSet<String> =
            regions.iter().map(|r| self.normalise_region(r)).collect();
        let region_sets: [&[&str]; 4] = [&["WORLD"], SRES_REGIONS, RCP_REGIONS, RCP_BUNKERS];
        region_sets
            .iter()
            .find(|set| {
                let candidate: BTreeSet<String> = set.iter().map(|r| r.to_string()).collect();
                candidate == region_set
            })
            .map(|set| set.iter().map(|r| r.to_string()).collect())
            .ok_or_else(|| WriteError::UnrecognisedRegions {
                regions: region_set.into_iter().collect(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("RCP26.SCEN", Dialect::Scen)]
    #[case("ssp245_something.SCEN7", Dialect::Scen7)]
    #[case("HIST_EMIS_CO2I_EMIS.IN", Dialect::EmisIn)]
    #[case("HISTRCP_CO2_CONC.IN", Dialect::ConcIn)]
    #[case("HISTRCP_VOLCANIC_OT.IN", Dialect::OtIn)]
    #[case("HISTRCP_SOLAR_RF.IN", Dialect::RfIn)]
    #[case("HISTRCP_SOLAR_RF.MON", Dialect::RfIn)]
    #[case("HISTSSP_SURFACE_TEMP.IN", Dialect::SurfaceTempIn)]
    #[case("RCPODS_WMO2006_Emissions_A1.prn", Dialect::Prn)]
    #[case("DAT_SURFACE_TEMP.MAG", Dialect::Mag)]
    fn test_dialect_from_path(#[case] name: &str, #[case] expected: Dialect) {
        assert_eq!(Dialect::from_path(Path::new(name)).unwrap(), expected);
    }

    #[rstest]
    #[case("HISTRCP_CO2.DAT")]
    #[case("notes.txt")]
    fn test_unknown_extension(#[case] name: &str) {
        let err = Dialect::from_path(Path::new(name)).unwrap_err();
        assert!(matches!(err, DialectError::UnknownExtension(_)));
    }

    #[test]
    fn test_resolve_tag() {
        assert_eq!(Dialect::resolve("scen7").unwrap().dialect, Dialect::Scen7);
        assert!(matches!(
            Dialect::resolve("CSV"),
            Err(DialectError::UnknownDialect(_))
        ));
    }

    #[rstest]
    #[case(Dialect::EmisIn, "HIST_SOX_EMIS.IN", "SOX_EMIS")]
    #[case(Dialect::ConcIn, "HISTRCP_CO2EQ-EFF_CONC.IN", "CO2EQ-EFF_CONC")]
    #[case(Dialect::OtIn, "HISTRCP_VOLCANIC_OT.IN", "VOLCANIC_OT")]
    #[case(Dialect::RfIn, "HISTRCP_SOLAR_RF.MON", "SOLAR_RF")]
    #[case(Dialect::SurfaceTempIn, "HISTSSP_SURFACE_TEMP.IN", "SURFACE_TEMP")]
    fn test_filename_variable_regex(
        #[case] dialect: Dialect,
        #[case] name: &str,
        #[case] variable: &str,
    ) {
        let re = dialect.filename_variable_regex().unwrap();
        let caps = re.captures(name).unwrap();
        assert_eq!(&caps[1], variable);
    }

    #[test]
    fn test_no_filename_variable_regex_for_labelled_dialects() {
        assert!(Dialect::Mag.filename_variable_regex().is_none());
        assert!(Dialect::Scen7.filename_variable_regex().is_none());
    }

    #[test]
    fn test_classify_fourbox_with_synonyms() {
        let defs = MagiccDefinitions::default();
        let row = defs
            .classify(&["GLOBAL", "NH-OCEAN", "NH-LAND", "SH-OCEAN", "SH-LAND"], false)
            .unwrap();
        assert_eq!(row.dattype, "REGIONDATA");
        assert_eq!(row.regionmode, "FOURBOX");
        assert_eq!(row.regions[0], "WORLD");
    }

    #[test]
    fn test_classify_scen7_split() {
        let defs = MagiccDefinitions::default();
        let world = defs.classify(&["WORLD"], true).unwrap();
        assert_eq!(world.dattype, "SCEN7");
        assert_eq!(world.regionmode, "WORLD");
        let err = defs
            .classify(&["WORLD", "R5OECD"], false)
            .unwrap_err();
        assert!(matches!(err, WriteError::UnrecognisedRegions { .. }));
    }

    #[test]
    fn test_special_scen_code() {
        let defs = MagiccDefinitions::default();
        let code_1_gases: Vec<&str> = defs.scen_gases_code_1.iter().map(|g| g.as_str()).collect();
        let code_0_gases: Vec<&str> = defs.scen_gases_code_0.iter().map(|g| g.as_str()).collect();

        assert_eq!(
            defs.special_scen_code(&["WORLD"], &code_1_gases).unwrap(),
            11
        );
        assert_eq!(
            defs.special_scen_code(
                &["WORLD", "OECD90", "REF", "ASIA", "ALM"],
                &code_0_gases
            )
            .unwrap(),
            20
        );
        assert_eq!(
            defs.special_scen_code(
                &["WORLD", "R5OECD", "R5REF", "R5ASIA", "R5MAF", "R5LAM", "BUNKERS"],
                &code_1_gases
            )
            .unwrap(),
            41
        );

        assert!(matches!(
            defs.special_scen_code(&["WORLD"], &["CO2I", "CH4"]),
            Err(WriteError::Validation(_))
        ));
        assert!(matches!(
            defs.special_scen_code(&["WORLD", "EUROPE"], &code_1_gases),
            Err(WriteError::UnrecognisedRegions { .. })
        ));
    }

    #[test]
    fn test_code_0_drops_aerosol_precursors() {
        let defs = MagiccDefinitions::default();
        assert_eq!(defs.scen_gases_code_1.len(), 23);
        assert_eq!(defs.scen_gases_code_0.len(), 20);
        for gone in ["BC", "OC", "NH3"] {
            assert!(!defs.scen_gases_code_0.iter().any(|g| g == gone));
        }
    }
}
