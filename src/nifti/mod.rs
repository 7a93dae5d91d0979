//! `NIfTI` file format support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) is a standard
//! format for neuroimaging data. This module reads `.nii` and `.nii.gz`
//! files into a raw header field mapping and a typed voxel array, which is
//! all the comparison logic needs.

pub(crate) mod header;
pub(crate) mod io;
pub(crate) mod volume;

pub use header::{DataType, FieldValue, Header, NiftiVersion};
pub use io::{load, load_header, NiftiImage};
pub use volume::VoxelArray;
