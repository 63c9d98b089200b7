//! Common errors across the magicc-io crate.
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Identifies the part of a file that caused an error.
///
/// All fields are optional because the same error types are used when
/// parsing in-memory text (e.g. in tests) where no path exists, and at
/// points where the offending line is not known.
#[derive(Debug, Default, Clone)]
pub struct FileLocation {
    path: Option<PathBuf>,
    line_number: Option<usize>,
    line: Option<String>,
}

impl FileLocation {
    pub fn new(path: Option<PathBuf>, line_number: Option<usize>, line: Option<String>) -> Self {
        Self {
            path,
            line_number,
            line,
        }
    }

    /// Location pointing at a 1-based line number with its text.
    pub fn at_line(line_number: usize, line: &str) -> Self {
        Self {
            path: None,
            line_number: Some(line_number),
            line: Some(line.to_string()),
        }
    }

    /// Return a copy of this location with the path filled in.
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

impl Display for FileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}", p.display())?,
            None => write!(f, "<text input>")?,
        }
        if let Some(n) = self.line_number {
            write!(f, ", line {n}")?;
        }
        if let Some(l) = &self.line {
            write!(f, " ('{}')", l.trim_end())?;
        }
        Ok(())
    }
}

impl From<&Path> for FileLocation {
    fn from(value: &Path) -> Self {
        Self {
            path: Some(value.to_path_buf()),
            line_number: None,
            line: None,
        }
    }
}

impl From<PathBuf> for FileLocation {
    fn from(value: PathBuf) -> Self {
        Self {
            path: Some(value),
            line_number: None,
            line: None,
        }
    }
}

/// Errors from the `&THISFILE_SPECIFICATIONS` namelist codec.
#[derive(Debug, thiserror::Error)]
pub enum NamelistError {
    #[error("No '&THISFILE_SPECIFICATIONS' start marker found in {location}")]
    MissingStartMarker { location: FileLocation },
    #[error("Namelist started but no '/' end marker found in {location}")]
    MissingEndMarker { location: FileLocation },
    #[error("Malformed namelist entry at {location}: {cause}")]
    MalformedEntry { location: FileLocation, cause: String },
}

/// Errors raised while parsing a MAGICC file into a [`Dataset`](crate::dataset::Dataset).
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not read {}: {reason}", path.display())]
    CouldNotRead { path: PathBuf, reason: String },
    #[error(transparent)]
    MalformedNamelist(#[from] NamelistError),
    #[error("No numeric data block found in {location}")]
    NoDataBlockFound { location: FileLocation },
    #[error("Header problem at {location}: {cause}")]
    HeaderMismatch { location: FileLocation, cause: String },
    #[error(
        "Header describes {in_header} data column(s) but the data block has {in_data} at {location}"
    )]
    InconsistentColumnCount {
        location: FileLocation,
        in_header: usize,
        in_data: usize,
    },
    #[error("Problem in the data block at {location}: {cause}")]
    DataError { location: FileLocation, cause: String },
}

impl ReadError {
    pub fn header_mismatch<L: Into<FileLocation>, C: ToString>(location: L, cause: C) -> Self {
        Self::HeaderMismatch {
            location: location.into(),
            cause: cause.to_string(),
        }
    }

    pub fn data<L: Into<FileLocation>, C: ToString>(location: L, cause: C) -> Self {
        Self::DataError {
            location: location.into(),
            cause: cause.to_string(),
        }
    }
}

/// Errors raised while serializing a [`Dataset`](crate::dataset::Dataset).
///
/// Every variant is raised before any byte reaches the destination; a failed
/// write never leaves a partial file behind.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Could not write {}: {reason}", path.display())]
    CouldNotWrite { path: PathBuf, reason: String },
    #[error("Invalid dataset: {0}")]
    Validation(String),
    #[error("Could not assign note to a scope narrower than the whole dataset: '{0}'")]
    UnsortableNote(String),
    #[error("Unrecognised region set {regions:?}: not a known dattype/regionmode combination")]
    UnrecognisedRegions { regions: Vec<String> },
    #[error("Missing required metadata: {0}")]
    MissingMetadata(String),
}

/// Errors selecting a file-format dialect.
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    #[error("'{0}' is not a recognised MAGICC file format tag")]
    UnknownDialect(String),
    #[error("Could not determine the MAGICC file format from the filename '{0}'")]
    UnknownExtension(String),
}

/// Standard error type covering all magicc-io operations.
#[derive(Debug, thiserror::Error)]
pub enum MagiccError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Namelist(#[from] NamelistError),
    #[error(transparent)]
    Dialect(#[from] DialectError),
}
