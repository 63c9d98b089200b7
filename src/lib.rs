//! Readers and writers for the MAGICC simple climate model's text file
//! formats.
//!
//! MAGICC's input and output files are fixed-width text tables carrying
//! emissions, concentration, or forcing timeseries, usually preceded by
//! free-form header lines and a Fortran namelist describing the data layout.
//! This crate parses the five dialects of that family (`.SCEN`, `.SCEN7`,
//! `*_EMIS*.IN`, `.prn`, and `.MAG`) into a common long-form [`Dataset`]
//! and writes datasets back out byte-compatibly.
//!
//! The usual entry points are [`readers::read_file`] and
//! [`writers::write_file`]; dialect selection follows the file name unless
//! overridden.

pub mod dataset;
pub mod dialects;
pub mod error;
pub mod namelist;
pub mod readers;
pub mod writers;

pub use dataset::{Dataset, LogicalRow, Table};
pub use dialects::{Dialect, MagiccDefinitions};
pub use error::{MagiccError, ReadError, WriteError};
