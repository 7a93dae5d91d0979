//! Header field and voxel data comparison.
//!
//! The comparison rules are compatibility-faithful, including two
//! long-standing quirks that are kept on purpose:
//!
//! - the per-file dtype scan keeps only the last computed pairwise flag when
//!   no difference is found, and a NaN-skipped file inherits the flag from
//!   the previous iteration;
//! - data comparison only ever inspects the first unordered pair of files,
//!   so a third file that differs from the first two goes unnoticed.

use crate::error::{Error, Result};
use crate::nifti::{FieldValue, Header, NiftiImage};
use std::path::Path;

/// A value the three-step differencer of [`diff_values`] can compare.
pub trait DiffValue {
    /// Element-wise numeric inequality, where a numeric reading exists.
    fn elementwise_ne(&self, other: &Self) -> bool;
    /// Runtime-kind mismatch.
    fn kind_ne(&self, other: &Self) -> bool;
    /// Plain value inequality.
    fn value_ne(&self, other: &Self) -> bool;
}

/// Generically compares two values; returns true if different.
///
/// Different if (element-wise numeric inequality) OR (kind mismatch) OR
/// (value inequality). The three checks overlap; any one firing is
/// sufficient.
pub fn diff_values<T: DiffValue + ?Sized>(left: &T, right: &T) -> bool {
    left.elementwise_ne(right) || left.kind_ne(right) || left.value_ne(right)
}

impl DiffValue for FieldValue {
    fn elementwise_ne(&self, other: &Self) -> bool {
        match (self.numeric_view(), other.numeric_view()) {
            // IEEE semantics: NaN != NaN fires here, as it does in numpy.
            (Some(a), Some(b)) => a.len() != b.len() || a.iter().zip(&b).any(|(x, y)| x != y),
            (None, None) => {
                // String against string compares values element-wise.
                self != other
            }
            // A string never equals a number.
            _ => true,
        }
    }

    fn kind_ne(&self, other: &Self) -> bool {
        std::mem::discriminant(self) != std::mem::discriminant(other)
    }

    fn value_ne(&self, other: &Self) -> bool {
        self != other
    }
}

impl DiffValue for str {
    fn elementwise_ne(&self, other: &Self) -> bool {
        self != other
    }

    fn kind_ne(&self, _other: &Self) -> bool {
        false
    }

    fn value_ne(&self, other: &Self) -> bool {
        self != other
    }
}

/// Which header fields to compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every field present in the first file's header, in header order.
    All,
    /// An explicit caller-supplied field list, unvalidated.
    Explicit(Vec<String>),
}

impl FieldSelection {
    /// Parse a `--header-fields` argument: the literal `all`, or a
    /// comma-separated field name list.
    pub fn parse(spec: &str) -> Self {
        if spec == "all" {
            Self::All
        } else {
            Self::Explicit(spec.split(',').map(str::to_owned).collect())
        }
    }

    fn field_names<'a>(&'a self, first: &'a Header) -> Vec<&'a str> {
        match self {
            Self::All => first.keys().collect(),
            Self::Explicit(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Compare a single header field across all files.
///
/// Returns one display string per contributing file when the field is
/// judged different, `None` when it is not. A field missing from any file
/// is a hard error.
pub fn field_diff(field: &str, headers: &[(&Path, &Header)]) -> Result<Option<Vec<String>>> {
    let mut entries: Vec<String> = Vec::new();
    // Carried across files: a NaN-skipped file leaves the flag at the value
    // the previous file computed (historical behaviour, kept).
    let mut dtype_differs = false;

    for &(path, header) in headers {
        let value = lookup(field, path, header)?;

        // Entirely-NaN values contribute nothing, not even a column entry.
        if value.all_nan() {
            continue;
        }

        // Scan later files' dtypes against this file's, stopping at the
        // first difference. When none fires the flag ends up as the last
        // comparison computed.
        for &(other_path, other_header) in &headers[1..] {
            let other_value = lookup(field, other_path, other_header)?;
            dtype_differs = diff_values(other_value.dtype().as_str(), value.dtype().as_str());
            if dtype_differs {
                break;
            }
        }

        // Scalars and 1-D values get an entry; anything higher-dimensional
        // is silently dropped, shifting later columns.
        if value.ndim() <= 1 {
            entries.push(if dtype_differs {
                value.display_annotated()
            } else {
                value.display()
            });
        }
    }

    // Confirmatory re-check on the formatted strings: report only if the
    // first entry differs from at least one later entry.
    if let Some((first, rest)) = entries.split_first() {
        if rest.iter().any(|entry| diff_values(first.as_str(), entry.as_str())) {
            return Ok(Some(entries));
        }
    }
    Ok(None)
}

/// Compare the selected header fields across all files.
///
/// Returns differing fields in discovery order, each with its per-file
/// display strings.
pub fn headers_diff(
    images: &[NiftiImage],
    selection: &FieldSelection,
) -> Result<Vec<(String, Vec<String>)>> {
    let headers: Vec<(&Path, &Header)> = images
        .iter()
        .map(|image| (image.path.as_path(), &image.header))
        .collect();

    let Some(&(_, first)) = headers.first() else {
        return Ok(Vec::new());
    };

    let mut output = Vec::new();
    for field in selection.field_names(first) {
        if let Some(entries) = field_diff(field, &headers)? {
            output.push((field.to_owned(), entries));
        }
    }
    Ok(output)
}

/// Decide whether any two files' voxel contents differ.
///
/// Only the first unordered pair is ever inspected; with three or more
/// files the remaining pairs do not contribute (historical behaviour,
/// kept). Fewer than two files compare as identical.
pub fn data_diff(images: &[NiftiImage]) -> bool {
    for (i, left) in images.iter().enumerate() {
        if let Some(right) = images.get(i + 1) {
            return diff_values(
                left.data.fingerprint().as_str(),
                right.data.fingerprint().as_str(),
            );
        }
    }
    false
}

fn lookup<'a>(field: &str, path: &Path, header: &'a Header) -> Result<&'a FieldValue> {
    header.get(field).ok_or_else(|| Error::MissingField {
        field: field.to_owned(),
        file: path.display().to_string(),
    })
}
