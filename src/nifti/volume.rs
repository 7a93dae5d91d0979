//! Voxel data decoding and content fingerprinting.
//!
//! Voxel bytes are decoded with the header's endianness into an F-order
//! [`ndarray::ArrayD`] of the header's datatype. When the header carries a
//! non-trivial scl_slope/scl_inter pair the array is promoted to float64
//! with the scaling applied, so two files that only differ in raw encoding
//! but describe the same scaled values still compare equal.

use crate::error::{Error, Result};
use crate::nifti::header::{DataType, Header};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// A decoded voxel volume of one of the supported NIfTI datatypes.
#[derive(Debug, Clone)]
pub enum VoxelArray {
    /// Unsigned 8-bit volume.
    U8(ArrayD<u8>),
    /// Signed 8-bit volume.
    I8(ArrayD<i8>),
    /// Signed 16-bit volume.
    I16(ArrayD<i16>),
    /// Unsigned 16-bit volume.
    U16(ArrayD<u16>),
    /// Signed 32-bit volume.
    I32(ArrayD<i32>),
    /// Unsigned 32-bit volume.
    U32(ArrayD<u32>),
    /// Signed 64-bit volume.
    I64(ArrayD<i64>),
    /// Unsigned 64-bit volume.
    U64(ArrayD<u64>),
    /// 32-bit float volume.
    F32(ArrayD<f32>),
    /// 64-bit float volume.
    F64(ArrayD<f64>),
}

/// Run `$body` with `$arr` bound to the inner array of any variant.
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            VoxelArray::U8($arr) => $body,
            VoxelArray::I8($arr) => $body,
            VoxelArray::I16($arr) => $body,
            VoxelArray::U16($arr) => $body,
            VoxelArray::I32($arr) => $body,
            VoxelArray::U32($arr) => $body,
            VoxelArray::I64($arr) => $body,
            VoxelArray::U64($arr) => $body,
            VoxelArray::F32($arr) => $body,
            VoxelArray::F64($arr) => $body,
        }
    };
}

impl VoxelArray {
    /// Decode voxel bytes according to the header's datatype, shape and
    /// endianness. `bytes` must start at the data offset.
    pub fn decode(header: &Header, bytes: &[u8]) -> Result<Self> {
        let need = header.data_size()?;
        if bytes.len() < need {
            return Err(Error::InvalidDimensions(format!(
                "voxel data truncated: got {} bytes, need {need}",
                bytes.len()
            )));
        }
        let bytes = &bytes[..need];

        if header.little_endian {
            Self::decode_with::<LittleEndian>(header, bytes)
        } else {
            Self::decode_with::<BigEndian>(header, bytes)
        }
    }

    fn decode_with<E: ByteOrder>(header: &Header, bytes: &[u8]) -> Result<Self> {
        let shape = header.shape();
        let count = header.num_voxels()?;

        Ok(match header.datatype {
            DataType::UInt8 => Self::U8(build(&shape, bytes.to_vec())?),
            DataType::Int8 => {
                Self::I8(build(&shape, bytes.iter().map(|&b| b as i8).collect())?)
            }
            DataType::Int16 => {
                let mut v = vec![0i16; count];
                E::read_i16_into(bytes, &mut v);
                Self::I16(build(&shape, v)?)
            }
            DataType::UInt16 => {
                let mut v = vec![0u16; count];
                E::read_u16_into(bytes, &mut v);
                Self::U16(build(&shape, v)?)
            }
            DataType::Int32 => {
                let mut v = vec![0i32; count];
                E::read_i32_into(bytes, &mut v);
                Self::I32(build(&shape, v)?)
            }
            DataType::UInt32 => {
                let mut v = vec![0u32; count];
                E::read_u32_into(bytes, &mut v);
                Self::U32(build(&shape, v)?)
            }
            DataType::Int64 => {
                let mut v = vec![0i64; count];
                E::read_i64_into(bytes, &mut v);
                Self::I64(build(&shape, v)?)
            }
            DataType::UInt64 => {
                let mut v = vec![0u64; count];
                E::read_u64_into(bytes, &mut v);
                Self::U64(build(&shape, v)?)
            }
            DataType::Float32 => {
                let mut v = vec![0f32; count];
                E::read_f32_into(bytes, &mut v);
                Self::F32(build(&shape, v)?)
            }
            DataType::Float64 => {
                let mut v = vec![0f64; count];
                E::read_f64_into(bytes, &mut v);
                Self::F64(build(&shape, v)?)
            }
        })
    }

    /// numpy-style dtype name of the stored elements.
    pub fn dtype_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "uint8",
            Self::I8(_) => "int8",
            Self::I16(_) => "int16",
            Self::U16(_) => "uint16",
            Self::I32(_) => "int32",
            Self::U32(_) => "uint32",
            Self::I64(_) => "int64",
            Self::U64(_) => "uint64",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
        }
    }

    /// Array shape.
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// Apply `value * slope + inter`, promoting to a float64 array. This is
    /// what scaled image data looks like after loading.
    pub fn scaled(&self, slope: f64, inter: f64) -> Self {
        let scaled = match self {
            Self::U8(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::I8(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::I16(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::U16(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::I32(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::U32(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::I64(a) => a.mapv(|v| v as f64 * slope + inter),
            Self::U64(a) => a.mapv(|v| v as f64 * slope + inter),
            Self::F32(a) => a.mapv(|v| f64::from(v) * slope + inter),
            Self::F64(a) => a.mapv(|v| v * slope + inter),
        };
        Self::F64(scaled)
    }

    /// Content fingerprint: sha-256 over the dtype, shape and an
    /// element-by-element textual representation of the array.
    ///
    /// The textual form gives NaN a stable token, so two volumes with NaN
    /// in the same slots fingerprint identically. Used purely for equality
    /// decisions, never displayed.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        with_array!(self, a => digest_array(&mut hasher, self.dtype_name(), a));
        format!("{:x}", hasher.finalize())
    }
}

fn digest_array<T: std::fmt::Debug>(hasher: &mut Sha256, dtype: &str, array: &ArrayD<T>) {
    let mut token = String::with_capacity(32);
    let _ = write!(token, "{}{:?};", dtype, array.shape());
    hasher.update(token.as_bytes());
    for value in array.iter() {
        token.clear();
        let _ = write!(token, "{value:?},");
        hasher.update(token.as_bytes());
    }
}

/// NIfTI data is stored in Fortran order on disk.
fn build<T>(shape: &[usize], data: Vec<T>) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape).f(), data)
        .map_err(|e| Error::InvalidDimensions(format!("voxel array shape mismatch: {e}")))
}
