//! NIfTI file loading.
//!
//! Uncompressed `.nii` files are memory-mapped; `.nii.gz` files are
//! decompressed in full with a streaming multi-member gzip decoder. Every
//! file is read once and held in memory for the duration of the run.

use crate::error::{Error, Result};
use crate::nifti::header::Header;
use crate::nifti::volume::VoxelArray;
use flate2::bufread::{GzDecoder, MultiGzDecoder};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// A loaded NIfTI file: source path, parsed header and decoded voxel data.
#[derive(Debug, Clone)]
pub struct NiftiImage {
    /// Path the image was loaded from, as given by the caller.
    pub path: PathBuf,
    /// Parsed header.
    pub header: Header,
    /// Decoded (and, where applicable, scaled) voxel data.
    pub data: VoxelArray,
}

/// Load a NIfTI image from file.
///
/// Supports both `.nii` and `.nii.gz` formats with automatic detection.
#[must_use = "this function returns a loaded image that should be used"]
pub fn load<P: AsRef<Path>>(path: P) -> Result<NiftiImage> {
    let path = path.as_ref();
    let is_gzipped = path.extension().is_some_and(|e| e == "gz");

    if is_gzipped {
        let compressed = std::fs::read(path)?;
        let bytes = decompress_gzip(&compressed)?;
        from_bytes(path, &bytes)
    } else {
        let file = File::open(path)?;
        // SAFETY: the file was just opened and is only read through the map.
        let mmap = unsafe { Mmap::map(&file)? };
        from_bytes(path, &mmap)
    }
}

/// Load only the header from a NIfTI file (fast metadata inspection).
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<Header> {
    let path = path.as_ref();
    let is_gzipped = path.extension().is_some_and(|e| e == "gz");

    if is_gzipped {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let header_buf = read_header_bytes(&mut decoder)?;
        Header::from_bytes(&header_buf)
    } else {
        let file = File::open(path)?;
        // SAFETY: the file was just opened and is only read through the map.
        let mmap = unsafe { Mmap::map(&file)? };
        Header::from_bytes(&mmap)
    }
}

fn from_bytes(path: &Path, bytes: &[u8]) -> Result<NiftiImage> {
    let header = Header::from_bytes(bytes)?;

    let start = header.vox_offset as usize;
    if bytes.len() < start {
        return Err(Error::InvalidDimensions(format!(
            "vox_offset {start} is beyond the end of the file ({} bytes)",
            bytes.len()
        )));
    }
    let mut data = VoxelArray::decode(&header, &bytes[start..])?;

    // Non-trivial slope/intercept means the stored integers encode scaled
    // values; apply the scaling so content comparison sees what a reader
    // of the image would see. NaN or zero slope disables scaling.
    let (slope, inter) = (header.scl_slope, header.scl_inter);
    if slope != 0.0 && !slope.is_nan() && !inter.is_nan() && (slope != 1.0 || inter != 0.0) {
        data = data.scaled(slope, inter);
    }

    Ok(NiftiImage {
        path: path.to_path_buf(),
        header,
        data,
    })
}

/// Read exactly the header region from a stream: 4 bytes to learn the
/// version, then the rest of that version's header.
fn read_header_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;

    let le = i32::from_le_bytes(prefix);
    let be = i32::from_be_bytes(prefix);
    let size = if le == 348 || be == 348 {
        348
    } else if le == 540 || be == 540 {
        540
    } else {
        return Err(Error::InvalidMagic(prefix));
    };

    let mut bytes = vec![0u8; size];
    bytes[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut bytes[4..])?;
    Ok(bytes)
}

/// Decompress a whole gzip stream, sizing the output buffer from the ISIZE
/// trailer (RFC 1952; only reliable for single-member gzip under 4 GiB,
/// which is the common case for `.nii.gz`).
fn decompress_gzip(compressed: &[u8]) -> Result<Vec<u8>> {
    let estimated = if compressed.len() >= 4 {
        let trailer = &compressed[compressed.len() - 4..];
        u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize
    } else {
        compressed.len() * 4
    };

    let mut output = Vec::with_capacity(estimated);
    MultiGzDecoder::new(compressed)
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    Ok(output)
}
