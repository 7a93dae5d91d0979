//! Error types for NIfTI loading and comparison.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while loading or comparing NIfTI files.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not carry a recognizable NIfTI magic string.
    #[error("invalid NIfTI magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// The header declares a datatype code this crate cannot decode.
    #[error("unsupported data type code {0}")]
    UnsupportedDataType(i16),

    /// Dimension or size information in the header is unusable.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Gzip stream could not be decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// A requested header field does not exist in one of the files.
    #[error("header field '{field}' missing from {file}")]
    MissingField {
        /// Name of the field that was requested.
        field: String,
        /// File whose header lacks the field.
        file: String,
    },
}
