//! Quick summary of the differences among a set of NIfTI files.
//!
//! `niidiff` loads each input file's header and voxel data, compares a
//! chosen set of header fields across all files, and separately reports
//! whether voxel content differs. The comparison rules stay compatible
//! with earlier tooling, quirks included; see the [`diff`] module for
//! details.
//!
//! Everything runs single-threaded and in memory: every file is loaded
//! once, nothing is mutated after loading, and nothing persists between
//! runs.

pub mod diff;
pub mod error;
pub mod nifti;
pub mod report;

pub use error::{Error, Result};
