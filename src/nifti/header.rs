//! Raw NIfTI header parsing and field access.
//!
//! Supports both NIfTI-1 (348-byte header) and NIfTI-2 (540-byte header)
//! formats with automatic version detection and endianness handling.
//!
//! Unlike a reader that only keeps the fields it needs, this parser exposes
//! every raw header field, in struct order, as a name -> [`FieldValue`]
//! mapping. Field comparison works over that mapping; the typed accessors on
//! [`Header`] exist for the voxel decoder.
//!
//! Parsing is deliberately lenient: compliance problems that do not prevent
//! reading (bitpix/datatype disagreement, bad qfac, odd vox_offset) are
//! logged as warnings rather than rejected, since the whole point of a diff
//! tool is to inspect files that may be slightly broken.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt::Write as _;

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// NIfTI-1 format (348-byte header, 16-bit dimensions)
    #[default]
    Nifti1,
    /// NIfTI-2 format (540-byte header, 64-bit dimensions)
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }

    /// Default vox_offset for this version (header size + padding).
    pub const fn default_vox_offset(self) -> i64 {
        match self {
            Self::Nifti1 => 352,
            Self::Nifti2 => 544,
        }
    }
}

/// NIfTI-1 header field byte offsets, in struct order.
mod offsets_v1 {
    pub const SIZEOF_HDR: usize = 0;
    pub const DATA_TYPE: usize = 4;
    pub const DB_NAME: usize = 14;
    pub const EXTENTS: usize = 32;
    pub const SESSION_ERROR: usize = 36;
    pub const REGULAR: usize = 38;
    pub const DIM_INFO: usize = 39;
    pub const DIM: usize = 40;
    pub const INTENT_P1: usize = 56;
    pub const INTENT_P2: usize = 60;
    pub const INTENT_P3: usize = 64;
    pub const INTENT_CODE: usize = 68;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const SLICE_START: usize = 74;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const SCL_SLOPE: usize = 112;
    pub const SCL_INTER: usize = 116;
    pub const SLICE_END: usize = 120;
    pub const SLICE_CODE: usize = 122;
    pub const XYZT_UNITS: usize = 123;
    pub const CAL_MAX: usize = 124;
    pub const CAL_MIN: usize = 128;
    pub const SLICE_DURATION: usize = 132;
    pub const TOFFSET: usize = 136;
    pub const GLMAX: usize = 140;
    pub const GLMIN: usize = 144;
    pub const DESCRIP: usize = 148;
    pub const AUX_FILE: usize = 228;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QUATERN_C: usize = 260;
    pub const QUATERN_D: usize = 264;
    pub const QOFFSET_X: usize = 268;
    pub const QOFFSET_Y: usize = 272;
    pub const QOFFSET_Z: usize = 276;
    pub const SROW_X: usize = 280;
    pub const SROW_Y: usize = 296;
    pub const SROW_Z: usize = 312;
    pub const INTENT_NAME: usize = 328;
    pub const MAGIC: usize = 344;
}

/// NIfTI-2 header field byte offsets, in struct order.
mod offsets_v2 {
    pub const SIZEOF_HDR: usize = 0;
    pub const MAGIC: usize = 4;
    pub const DATATYPE: usize = 12;
    pub const BITPIX: usize = 14;
    pub const DIM: usize = 16;
    pub const INTENT_P1: usize = 80;
    pub const INTENT_P2: usize = 88;
    pub const INTENT_P3: usize = 96;
    pub const PIXDIM: usize = 104;
    pub const VOX_OFFSET: usize = 168;
    pub const SCL_SLOPE: usize = 176;
    pub const SCL_INTER: usize = 184;
    pub const CAL_MAX: usize = 192;
    pub const CAL_MIN: usize = 200;
    pub const SLICE_DURATION: usize = 208;
    pub const TOFFSET: usize = 216;
    pub const SLICE_START: usize = 224;
    pub const SLICE_END: usize = 232;
    pub const DESCRIP: usize = 240;
    pub const AUX_FILE: usize = 320;
    pub const QFORM_CODE: usize = 344;
    pub const SFORM_CODE: usize = 348;
    pub const QUATERN_B: usize = 352;
    pub const QUATERN_C: usize = 360;
    pub const QUATERN_D: usize = 368;
    pub const QOFFSET_X: usize = 376;
    pub const QOFFSET_Y: usize = 384;
    pub const QOFFSET_Z: usize = 392;
    pub const SROW_X: usize = 400;
    pub const SROW_Y: usize = 432;
    pub const SROW_Z: usize = 464;
    pub const SLICE_CODE: usize = 496;
    pub const XYZT_UNITS: usize = 500;
    pub const INTENT_CODE: usize = 504;
    pub const INTENT_NAME: usize = 508;
    pub const DIM_INFO: usize = 524;
    pub const UNUSED_STR: usize = 525;
}

/// NIfTI voxel data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// 64-bit floating point
    Float64 = 64,
    /// Signed 8-bit integer
    Int8 = 256,
    /// Unsigned 16-bit integer
    UInt16 = 512,
    /// Unsigned 32-bit integer
    UInt32 = 768,
    /// Signed 64-bit integer
    Int64 = 1024,
    /// Unsigned 64-bit integer
    UInt64 = 1280,
}

impl DataType {
    /// Parse from a NIfTI datatype code.
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(Self::UInt8),
            4 => Ok(Self::Int16),
            8 => Ok(Self::Int32),
            16 => Ok(Self::Float32),
            64 => Ok(Self::Float64),
            256 => Ok(Self::Int8),
            512 => Ok(Self::UInt16),
            768 => Ok(Self::UInt32),
            1024 => Ok(Self::Int64),
            1280 => Ok(Self::UInt64),
            _ => Err(Error::UnsupportedDataType(code)),
        }
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// numpy-style dtype name, as shown in annotated field output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single raw header field value.
///
/// Scalars keep the stored width of the on-disk field; 1-D fields keep the
/// element type. Fixed-size byte strings remember their capacity so their
/// dtype renders as `S{n}`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Unsigned byte scalar (dim_info, slice_code in NIfTI-1).
    U8(u8),
    /// 16-bit integer scalar.
    I16(i16),
    /// 32-bit integer scalar.
    I32(i32),
    /// 64-bit integer scalar.
    I64(i64),
    /// 32-bit float scalar.
    F32(f32),
    /// 64-bit float scalar.
    F64(f64),
    /// Fixed-capacity byte string, NUL padding stripped.
    Str {
        /// Decoded text.
        value: String,
        /// On-disk capacity in bytes.
        size: usize,
    },
    /// 1-D array of 16-bit integers (dim in NIfTI-1).
    I16Vec(Vec<i16>),
    /// 1-D array of 64-bit integers (dim in NIfTI-2).
    I64Vec(Vec<i64>),
    /// 1-D array of 32-bit floats (pixdim, srow_* in NIfTI-1).
    F32Vec(Vec<f32>),
    /// 1-D array of 64-bit floats (pixdim, srow_* in NIfTI-2).
    F64Vec(Vec<f64>),
}

impl FieldValue {
    /// numpy-style dtype name of the stored value.
    pub fn dtype(&self) -> String {
        match self {
            Self::U8(_) => "uint8".to_string(),
            Self::I16(_) | Self::I16Vec(_) => "int16".to_string(),
            Self::I32(_) => "int32".to_string(),
            Self::I64(_) | Self::I64Vec(_) => "int64".to_string(),
            Self::F32(_) | Self::F32Vec(_) => "float32".to_string(),
            Self::F64(_) | Self::F64Vec(_) => "float64".to_string(),
            Self::Str { size, .. } => format!("S{size}"),
        }
    }

    /// Number of array dimensions: 0 for scalars and strings, 1 for vectors.
    pub fn ndim(&self) -> usize {
        match self {
            Self::I16Vec(_) | Self::I64Vec(_) | Self::F32Vec(_) | Self::F64Vec(_) => 1,
            _ => 0,
        }
    }

    /// True when every element is NaN (vacuously true for empty vectors,
    /// matching `np.all` semantics). Non-float values are never NaN.
    pub fn all_nan(&self) -> bool {
        match self {
            Self::F32(v) => v.is_nan(),
            Self::F64(v) => v.is_nan(),
            Self::F32Vec(v) => v.iter().all(|x| x.is_nan()),
            Self::F64Vec(v) => v.iter().all(|x| x.is_nan()),
            _ => false,
        }
    }

    /// Numeric view for element-wise comparison; `None` for strings.
    pub(crate) fn numeric_view(&self) -> Option<Vec<f64>> {
        match self {
            Self::U8(v) => Some(vec![f64::from(*v)]),
            Self::I16(v) => Some(vec![f64::from(*v)]),
            Self::I32(v) => Some(vec![f64::from(*v)]),
            Self::I64(v) => Some(vec![*v as f64]),
            Self::F32(v) => Some(vec![f64::from(*v)]),
            Self::F64(v) => Some(vec![*v]),
            Self::I16Vec(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            Self::I64Vec(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Self::F32Vec(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            Self::F64Vec(v) => Some(v.to_vec()),
            Self::Str { .. } => None,
        }
    }

    /// Plain display form: scalars print bare, 1-D values print as lists.
    pub fn display(&self) -> String {
        match self {
            Self::U8(v) => v.to_string(),
            Self::I16(v) => v.to_string(),
            Self::I32(v) => v.to_string(),
            Self::I64(v) => v.to_string(),
            // Debug formatting keeps the trailing ".0" on whole floats.
            Self::F32(v) => format!("{v:?}"),
            Self::F64(v) => format!("{v:?}"),
            Self::Str { value, .. } => value.clone(),
            Self::I16Vec(v) => format!("{v:?}"),
            Self::I64Vec(v) => format!("{v:?}"),
            Self::F32Vec(v) => format!("{v:?}"),
            Self::F64Vec(v) => format!("{v:?}"),
        }
    }

    /// Display form annotated with the stored dtype, `<value>@<dtype>`.
    pub fn display_annotated(&self) -> String {
        let mut out = self.display();
        let _ = write!(out, "@{}", self.dtype());
        out
    }
}

/// Parsed NIfTI header: the full raw field mapping plus the handful of
/// typed values the voxel decoder needs.
#[derive(Debug, Clone)]
pub struct Header {
    /// NIfTI format version.
    pub version: NiftiVersion,
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension (64-bit for NIfTI-2 compatibility).
    pub dim: [i64; 7],
    /// Voxel data type.
    pub datatype: DataType,
    /// Data offset in file, clamped to at least the header end.
    pub vox_offset: i64,
    /// Data scaling slope.
    pub scl_slope: f64,
    /// Data scaling intercept.
    pub scl_inter: f64,
    /// File endianness (true = little endian).
    pub(crate) little_endian: bool,
    /// Raw fields in on-disk struct order.
    fields: Vec<(&'static str, FieldValue)>,
}

impl Header {
    /// Read a header from bytes with automatic version and endianness
    /// detection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "header too short to detect version",
            )));
        }

        // Detect version and endianness from the sizeof_hdr field.
        let sizeof_hdr_le = LittleEndian::read_i32(&bytes[0..4]);
        let sizeof_hdr_be = BigEndian::read_i32(&bytes[0..4]);

        let (version, little_endian) = if sizeof_hdr_le == 348 {
            (NiftiVersion::Nifti1, true)
        } else if sizeof_hdr_be == 348 {
            (NiftiVersion::Nifti1, false)
        } else if sizeof_hdr_le == 540 {
            (NiftiVersion::Nifti2, true)
        } else if sizeof_hdr_be == 540 {
            (NiftiVersion::Nifti2, false)
        } else {
            return Err(Error::InvalidMagic([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]));
        };

        let required_size = version.header_size();
        if bytes.len() < required_size {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "header too short: got {} bytes, need {} for {:?}",
                    bytes.len(),
                    required_size,
                    version
                ),
            )));
        }

        match (version, little_endian) {
            (NiftiVersion::Nifti1, true) => Self::parse_v1::<LittleEndian>(bytes, true),
            (NiftiVersion::Nifti1, false) => Self::parse_v1::<BigEndian>(bytes, false),
            (NiftiVersion::Nifti2, true) => Self::parse_v2::<LittleEndian>(bytes, true),
            (NiftiVersion::Nifti2, false) => Self::parse_v2::<BigEndian>(bytes, false),
        }
    }

    /// Look up a raw field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Field names in on-disk struct order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(key, _)| *key)
    }

    /// Image shape, `dim[1..=ndim]` as usize.
    pub fn shape(&self) -> Vec<usize> {
        self.dim[..self.ndim as usize]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    /// Total number of voxels, guarding against overflow.
    pub fn num_voxels(&self) -> Result<usize> {
        let mut voxels: usize = 1;
        for &d in &self.dim[..self.ndim as usize] {
            voxels = voxels
                .checked_mul(d as usize)
                .ok_or_else(|| Error::InvalidDimensions("dimension product overflow".into()))?;
        }
        Ok(voxels)
    }

    /// Total size of the voxel data in bytes.
    pub fn data_size(&self) -> Result<usize> {
        self.num_voxels()?
            .checked_mul(self.datatype.byte_size())
            .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))
    }

    /// Build a header directly from a field list, for diff unit tests.
    #[cfg(test)]
    pub(crate) fn from_fields(fields: Vec<(&'static str, FieldValue)>) -> Self {
        Self {
            version: NiftiVersion::Nifti1,
            ndim: 1,
            dim: [1, 0, 0, 0, 0, 0, 0],
            datatype: DataType::UInt8,
            vox_offset: 352,
            scl_slope: 1.0,
            scl_inter: 0.0,
            little_endian: true,
            fields,
        }
    }

    /// Parse a NIfTI-1 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v1<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v1::*;

        let magic = &bytes[MAGIC..MAGIC + 4];
        if magic != b"n+1\0" && magic != b"ni1\0" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let dim_raw: Vec<i16> = (0..8)
            .map(|i| E::read_i16(&bytes[DIM + i * 2..DIM + i * 2 + 2]))
            .collect();
        let (ndim, dim) = checked_dims(dim_raw.iter().map(|&d| i64::from(d)))?;

        let datatype_code = E::read_i16(&bytes[DATATYPE..DATATYPE + 2]);
        let datatype = DataType::from_code(datatype_code)?;
        let bitpix = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
        check_bitpix(bitpix, datatype);

        let pixdim_raw: Vec<f32> = (0..8)
            .map(|i| E::read_f32(&bytes[PIXDIM + i * 4..PIXDIM + i * 4 + 4]))
            .collect();
        check_pixdim(pixdim_raw.iter().map(|&p| f64::from(p)), ndim);

        let vox_offset_raw = E::read_f32(&bytes[VOX_OFFSET..VOX_OFFSET + 4]);
        if !vox_offset_raw.is_finite() {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset must be finite, got {vox_offset_raw}"
            )));
        }
        if vox_offset_raw.fract() != 0.0 {
            log::warn!("vox_offset {vox_offset_raw} is not an integer; truncating");
        }
        let vox_offset = clamp_vox_offset(vox_offset_raw as i64, NiftiVersion::Nifti1);

        let scl_slope_raw = E::read_f32(&bytes[SCL_SLOPE..SCL_SLOPE + 4]);
        let scl_inter_raw = E::read_f32(&bytes[SCL_INTER..SCL_INTER + 4]);

        let fields = vec![
            ("sizeof_hdr", FieldValue::I32(E::read_i32(&bytes[SIZEOF_HDR..SIZEOF_HDR + 4]))),
            ("data_type", string_field(bytes, DATA_TYPE, 10)),
            ("db_name", string_field(bytes, DB_NAME, 18)),
            ("extents", FieldValue::I32(E::read_i32(&bytes[EXTENTS..EXTENTS + 4]))),
            ("session_error", FieldValue::I16(E::read_i16(&bytes[SESSION_ERROR..SESSION_ERROR + 2]))),
            ("regular", string_field(bytes, REGULAR, 1)),
            ("dim_info", FieldValue::U8(bytes[DIM_INFO])),
            ("dim", FieldValue::I16Vec(dim_raw)),
            ("intent_p1", FieldValue::F32(E::read_f32(&bytes[INTENT_P1..INTENT_P1 + 4]))),
            ("intent_p2", FieldValue::F32(E::read_f32(&bytes[INTENT_P2..INTENT_P2 + 4]))),
            ("intent_p3", FieldValue::F32(E::read_f32(&bytes[INTENT_P3..INTENT_P3 + 4]))),
            ("intent_code", FieldValue::I16(E::read_i16(&bytes[INTENT_CODE..INTENT_CODE + 2]))),
            ("datatype", FieldValue::I16(datatype_code)),
            ("bitpix", FieldValue::I16(bitpix)),
            ("slice_start", FieldValue::I16(E::read_i16(&bytes[SLICE_START..SLICE_START + 2]))),
            ("pixdim", FieldValue::F32Vec(pixdim_raw)),
            ("vox_offset", FieldValue::F32(vox_offset_raw)),
            ("scl_slope", FieldValue::F32(scl_slope_raw)),
            ("scl_inter", FieldValue::F32(scl_inter_raw)),
            ("slice_end", FieldValue::I16(E::read_i16(&bytes[SLICE_END..SLICE_END + 2]))),
            ("slice_code", FieldValue::U8(bytes[SLICE_CODE])),
            ("xyzt_units", FieldValue::U8(bytes[XYZT_UNITS])),
            ("cal_max", FieldValue::F32(E::read_f32(&bytes[CAL_MAX..CAL_MAX + 4]))),
            ("cal_min", FieldValue::F32(E::read_f32(&bytes[CAL_MIN..CAL_MIN + 4]))),
            ("slice_duration", FieldValue::F32(E::read_f32(&bytes[SLICE_DURATION..SLICE_DURATION + 4]))),
            ("toffset", FieldValue::F32(E::read_f32(&bytes[TOFFSET..TOFFSET + 4]))),
            ("glmax", FieldValue::I32(E::read_i32(&bytes[GLMAX..GLMAX + 4]))),
            ("glmin", FieldValue::I32(E::read_i32(&bytes[GLMIN..GLMIN + 4]))),
            ("descrip", string_field(bytes, DESCRIP, 80)),
            ("aux_file", string_field(bytes, AUX_FILE, 24)),
            ("qform_code", FieldValue::I16(E::read_i16(&bytes[QFORM_CODE..QFORM_CODE + 2]))),
            ("sform_code", FieldValue::I16(E::read_i16(&bytes[SFORM_CODE..SFORM_CODE + 2]))),
            ("quatern_b", FieldValue::F32(E::read_f32(&bytes[QUATERN_B..QUATERN_B + 4]))),
            ("quatern_c", FieldValue::F32(E::read_f32(&bytes[QUATERN_C..QUATERN_C + 4]))),
            ("quatern_d", FieldValue::F32(E::read_f32(&bytes[QUATERN_D..QUATERN_D + 4]))),
            ("qoffset_x", FieldValue::F32(E::read_f32(&bytes[QOFFSET_X..QOFFSET_X + 4]))),
            ("qoffset_y", FieldValue::F32(E::read_f32(&bytes[QOFFSET_Y..QOFFSET_Y + 4]))),
            ("qoffset_z", FieldValue::F32(E::read_f32(&bytes[QOFFSET_Z..QOFFSET_Z + 4]))),
            ("srow_x", read_f32_row::<E>(bytes, SROW_X)),
            ("srow_y", read_f32_row::<E>(bytes, SROW_Y)),
            ("srow_z", read_f32_row::<E>(bytes, SROW_Z)),
            ("intent_name", string_field(bytes, INTENT_NAME, 16)),
            ("magic", string_field(bytes, MAGIC, 4)),
        ];

        Ok(Self {
            version: NiftiVersion::Nifti1,
            ndim,
            dim,
            datatype,
            vox_offset,
            scl_slope: f64::from(scl_slope_raw),
            scl_inter: f64::from(scl_inter_raw),
            little_endian,
            fields,
        })
    }

    /// Parse a NIfTI-2 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v2<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v2::*;

        // Magic is at offset 4 in NIfTI-2.
        let magic = &bytes[MAGIC..MAGIC + 8];
        if magic != b"n+2\0\r\n\x1a\n" && magic != b"ni2\0\r\n\x1a\n" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let dim_raw: Vec<i64> = (0..8)
            .map(|i| E::read_i64(&bytes[DIM + i * 8..DIM + i * 8 + 8]))
            .collect();
        let (ndim, dim) = checked_dims(dim_raw.iter().copied())?;

        let datatype_code = E::read_i16(&bytes[DATATYPE..DATATYPE + 2]);
        let datatype = DataType::from_code(datatype_code)?;
        let bitpix = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
        check_bitpix(bitpix, datatype);

        let pixdim_raw: Vec<f64> = (0..8)
            .map(|i| E::read_f64(&bytes[PIXDIM + i * 8..PIXDIM + i * 8 + 8]))
            .collect();
        check_pixdim(pixdim_raw.iter().copied(), ndim);

        let vox_offset_raw = E::read_i64(&bytes[VOX_OFFSET..VOX_OFFSET + 8]);
        let vox_offset = clamp_vox_offset(vox_offset_raw, NiftiVersion::Nifti2);
        let scl_slope = E::read_f64(&bytes[SCL_SLOPE..SCL_SLOPE + 8]);
        let scl_inter = E::read_f64(&bytes[SCL_INTER..SCL_INTER + 8]);

        let fields = vec![
            ("sizeof_hdr", FieldValue::I32(E::read_i32(&bytes[SIZEOF_HDR..SIZEOF_HDR + 4]))),
            ("magic", string_field(bytes, MAGIC, 8)),
            ("datatype", FieldValue::I16(datatype_code)),
            ("bitpix", FieldValue::I16(bitpix)),
            ("dim", FieldValue::I64Vec(dim_raw)),
            ("intent_p1", FieldValue::F64(E::read_f64(&bytes[INTENT_P1..INTENT_P1 + 8]))),
            ("intent_p2", FieldValue::F64(E::read_f64(&bytes[INTENT_P2..INTENT_P2 + 8]))),
            ("intent_p3", FieldValue::F64(E::read_f64(&bytes[INTENT_P3..INTENT_P3 + 8]))),
            ("pixdim", FieldValue::F64Vec(pixdim_raw)),
            ("vox_offset", FieldValue::I64(vox_offset_raw)),
            ("scl_slope", FieldValue::F64(scl_slope)),
            ("scl_inter", FieldValue::F64(scl_inter)),
            ("cal_max", FieldValue::F64(E::read_f64(&bytes[CAL_MAX..CAL_MAX + 8]))),
            ("cal_min", FieldValue::F64(E::read_f64(&bytes[CAL_MIN..CAL_MIN + 8]))),
            ("slice_duration", FieldValue::F64(E::read_f64(&bytes[SLICE_DURATION..SLICE_DURATION + 8]))),
            ("toffset", FieldValue::F64(E::read_f64(&bytes[TOFFSET..TOFFSET + 8]))),
            ("slice_start", FieldValue::I64(E::read_i64(&bytes[SLICE_START..SLICE_START + 8]))),
            ("slice_end", FieldValue::I64(E::read_i64(&bytes[SLICE_END..SLICE_END + 8]))),
            ("descrip", string_field(bytes, DESCRIP, 80)),
            ("aux_file", string_field(bytes, AUX_FILE, 24)),
            ("qform_code", FieldValue::I32(E::read_i32(&bytes[QFORM_CODE..QFORM_CODE + 4]))),
            ("sform_code", FieldValue::I32(E::read_i32(&bytes[SFORM_CODE..SFORM_CODE + 4]))),
            ("quatern_b", FieldValue::F64(E::read_f64(&bytes[QUATERN_B..QUATERN_B + 8]))),
            ("quatern_c", FieldValue::F64(E::read_f64(&bytes[QUATERN_C..QUATERN_C + 8]))),
            ("quatern_d", FieldValue::F64(E::read_f64(&bytes[QUATERN_D..QUATERN_D + 8]))),
            ("qoffset_x", FieldValue::F64(E::read_f64(&bytes[QOFFSET_X..QOFFSET_X + 8]))),
            ("qoffset_y", FieldValue::F64(E::read_f64(&bytes[QOFFSET_Y..QOFFSET_Y + 8]))),
            ("qoffset_z", FieldValue::F64(E::read_f64(&bytes[QOFFSET_Z..QOFFSET_Z + 8]))),
            ("srow_x", read_f64_row::<E>(bytes, SROW_X)),
            ("srow_y", read_f64_row::<E>(bytes, SROW_Y)),
            ("srow_z", read_f64_row::<E>(bytes, SROW_Z)),
            ("slice_code", FieldValue::I32(E::read_i32(&bytes[SLICE_CODE..SLICE_CODE + 4]))),
            ("xyzt_units", FieldValue::I32(E::read_i32(&bytes[XYZT_UNITS..XYZT_UNITS + 4]))),
            ("intent_code", FieldValue::I32(E::read_i32(&bytes[INTENT_CODE..INTENT_CODE + 4]))),
            ("intent_name", string_field(bytes, INTENT_NAME, 16)),
            ("dim_info", FieldValue::U8(bytes[DIM_INFO])),
            ("unused_str", string_field(bytes, UNUSED_STR, 15)),
        ];

        Ok(Self {
            version: NiftiVersion::Nifti2,
            ndim,
            dim,
            datatype,
            vox_offset,
            scl_slope,
            scl_inter,
            little_endian,
            fields,
        })
    }
}

/// Decode a fixed-capacity byte string field, stripping NUL padding.
fn string_field(bytes: &[u8], start: usize, size: usize) -> FieldValue {
    let value = String::from_utf8_lossy(&bytes[start..start + size])
        .trim_end_matches('\0')
        .to_string();
    FieldValue::Str { value, size }
}

fn read_f32_row<E: ByteOrder>(bytes: &[u8], start: usize) -> FieldValue {
    let row: Vec<f32> = (0..4)
        .map(|i| E::read_f32(&bytes[start + i * 4..start + i * 4 + 4]))
        .collect();
    FieldValue::F32Vec(row)
}

fn read_f64_row<E: ByteOrder>(bytes: &[u8], start: usize) -> FieldValue {
    let row: Vec<f64> = (0..4)
        .map(|i| E::read_f64(&bytes[start + i * 8..start + i * 8 + 8]))
        .collect();
    FieldValue::F64Vec(row)
}

/// Validate the dim array: dim[0] is ndim and must be 1..=7, used
/// dimensions must be non-negative. Zero-size dimensions are tolerated
/// with a warning (the volume is simply empty).
fn checked_dims(raw: impl Iterator<Item = i64>) -> Result<(u8, [i64; 7])> {
    let raw: Vec<i64> = raw.collect();
    let ndim_raw = raw[0];
    if !(1..=7).contains(&ndim_raw) {
        return Err(Error::InvalidDimensions(format!(
            "ndim must be 1..=7, got {ndim_raw}"
        )));
    }
    let ndim = ndim_raw as u8;

    let mut dim = [0i64; 7];
    for (i, dim_val) in dim.iter_mut().enumerate() {
        let value = raw[i + 1];
        if value < 0 {
            return Err(Error::InvalidDimensions(format!(
                "dimension {i} has negative value: {value}"
            )));
        }
        if value == 0 && i < ndim as usize {
            log::warn!("dimension {i} is zero; volume is empty");
        }
        *dim_val = value;
    }
    Ok((ndim, dim))
}

fn check_bitpix(bitpix: i16, datatype: DataType) {
    let expected = (datatype.byte_size() * 8) as i16;
    if bitpix != expected {
        log::warn!("bitpix {bitpix} does not match datatype {datatype} (expected {expected})");
    }
}

fn check_pixdim(pixdim: impl Iterator<Item = f64>, ndim: u8) {
    for (i, value) in pixdim.enumerate() {
        if i == 0 {
            // pixdim[0] is qfac and should be +1 or -1.
            if value != 1.0 && value != -1.0 && value != 0.0 {
                log::warn!("pixdim[0] (qfac) is {value}, expected 1 or -1");
            }
        } else if i <= ndim as usize && (!value.is_finite() || value <= 0.0) {
            log::warn!("pixdim[{i}] should be finite and positive, got {value}");
        }
    }
}

fn clamp_vox_offset(offset: i64, version: NiftiVersion) -> i64 {
    let min = version.header_size() as i64;
    if offset < min {
        log::warn!(
            "vox_offset {offset} is before the header end; using default {}",
            version.default_vox_offset()
        );
        version.default_vox_offset()
    } else {
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid little-endian NIfTI-1 header bytes: 10x10x10 float32.
    fn minimal_v1_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 348];
        LittleEndian::write_i32(&mut bytes[0..4], 348);
        bytes[344..348].copy_from_slice(b"n+1\0");
        LittleEndian::write_i16(&mut bytes[40..42], 3); // ndim
        LittleEndian::write_i16(&mut bytes[42..44], 10);
        LittleEndian::write_i16(&mut bytes[44..46], 10);
        LittleEndian::write_i16(&mut bytes[46..48], 10);
        LittleEndian::write_i16(&mut bytes[70..72], 16); // datatype = Float32
        LittleEndian::write_i16(&mut bytes[72..74], 32); // bitpix
        LittleEndian::write_f32(&mut bytes[76..80], 1.0); // qfac
        LittleEndian::write_f32(&mut bytes[80..84], 1.0);
        LittleEndian::write_f32(&mut bytes[84..88], 1.0);
        LittleEndian::write_f32(&mut bytes[88..92], 1.0);
        LittleEndian::write_f32(&mut bytes[108..112], 352.0); // vox_offset
        bytes
    }

    #[test]
    fn test_v1_field_order_and_values() {
        let header = Header::from_bytes(&minimal_v1_bytes()).unwrap();
        let keys: Vec<&str> = header.keys().collect();
        assert_eq!(keys.first(), Some(&"sizeof_hdr"));
        assert_eq!(keys.last(), Some(&"magic"));
        assert_eq!(keys.len(), 43);
        assert_eq!(header.get("sizeof_hdr"), Some(&FieldValue::I32(348)));
        assert_eq!(
            header.get("dim"),
            Some(&FieldValue::I16Vec(vec![3, 10, 10, 10, 0, 0, 0, 0]))
        );
        assert_eq!(
            header.get("magic"),
            Some(&FieldValue::Str {
                value: "n+1".to_string(),
                size: 4
            })
        );
        assert!(header.get("no_such_field").is_none());
    }

    #[test]
    fn test_v1_typed_fields() {
        let header = Header::from_bytes(&minimal_v1_bytes()).unwrap();
        assert_eq!(header.version, NiftiVersion::Nifti1);
        assert_eq!(header.ndim, 3);
        assert_eq!(header.shape(), vec![10, 10, 10]);
        assert_eq!(header.datatype, DataType::Float32);
        assert_eq!(header.vox_offset, 352);
        assert_eq!(header.data_size().unwrap(), 4000);
    }

    #[test]
    fn test_v1_descrip_decoding() {
        let mut bytes = minimal_v1_bytes();
        bytes[148..151].copy_from_slice(b"abc");
        let header = Header::from_bytes(&bytes).unwrap();
        let descrip = header.get("descrip").unwrap();
        assert_eq!(
            descrip,
            &FieldValue::Str {
                value: "abc".to_string(),
                size: 80
            }
        );
        assert_eq!(descrip.dtype(), "S80");
        assert_eq!(descrip.display(), "abc");
    }

    #[test]
    fn test_big_endian_v1() {
        let mut bytes = vec![0u8; 348];
        BigEndian::write_i32(&mut bytes[0..4], 348);
        bytes[344..348].copy_from_slice(b"n+1\0");
        BigEndian::write_i16(&mut bytes[40..42], 2);
        BigEndian::write_i16(&mut bytes[42..44], 4);
        BigEndian::write_i16(&mut bytes[44..46], 5);
        BigEndian::write_i16(&mut bytes[70..72], 4); // datatype = Int16
        BigEndian::write_i16(&mut bytes[72..74], 16);
        BigEndian::write_f32(&mut bytes[76..80], 1.0);
        BigEndian::write_f32(&mut bytes[80..84], 1.0);
        BigEndian::write_f32(&mut bytes[84..88], 1.0);
        BigEndian::write_f32(&mut bytes[108..112], 352.0);
        let header = Header::from_bytes(&bytes).unwrap();
        assert!(!header.little_endian);
        assert_eq!(header.shape(), vec![4, 5]);
        assert_eq!(header.datatype, DataType::Int16);
    }

    #[test]
    fn test_v2_parse() {
        let mut bytes = vec![0u8; 540];
        LittleEndian::write_i32(&mut bytes[0..4], 540);
        bytes[4..12].copy_from_slice(b"n+2\0\r\n\x1a\n");
        LittleEndian::write_i16(&mut bytes[12..14], 16); // datatype = Float32
        LittleEndian::write_i16(&mut bytes[14..16], 32);
        LittleEndian::write_i64(&mut bytes[16..24], 3);
        LittleEndian::write_i64(&mut bytes[24..32], 10);
        LittleEndian::write_i64(&mut bytes[32..40], 10);
        LittleEndian::write_i64(&mut bytes[40..48], 10);
        LittleEndian::write_f64(&mut bytes[104..112], 1.0); // qfac
        LittleEndian::write_f64(&mut bytes[112..120], 1.0);
        LittleEndian::write_f64(&mut bytes[120..128], 1.0);
        LittleEndian::write_f64(&mut bytes[128..136], 1.0);
        LittleEndian::write_i64(&mut bytes[168..176], 544); // vox_offset

        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.version, NiftiVersion::Nifti2);
        assert_eq!(header.shape(), vec![10, 10, 10]);
        // NIfTI-2 stores dim as int64.
        assert_eq!(header.get("dim").unwrap().dtype(), "int64");
        // magic comes second in the NIfTI-2 struct.
        let keys: Vec<&str> = header.keys().collect();
        assert_eq!(keys[1], "magic");
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = minimal_v1_bytes();
        bytes[344..348].copy_from_slice(b"BAD!");
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid NIfTI magic"));
    }

    #[test]
    fn test_unsupported_datatype() {
        let mut bytes = minimal_v1_bytes();
        LittleEndian::write_i16(&mut bytes[70..72], 9999);
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported data type"));
    }

    #[test]
    fn test_short_buffer() {
        assert!(Header::from_bytes(&[0u8; 3]).is_err());
        let bytes = minimal_v1_bytes();
        assert!(Header::from_bytes(&bytes[..100]).is_err());
    }

    #[test]
    fn test_field_value_all_nan() {
        assert!(FieldValue::F32(f32::NAN).all_nan());
        assert!(FieldValue::F32Vec(vec![f32::NAN, f32::NAN]).all_nan());
        assert!(!FieldValue::F32Vec(vec![f32::NAN, 1.0]).all_nan());
        assert!(!FieldValue::I16(0).all_nan());
        assert!(!FieldValue::Str {
            value: String::new(),
            size: 4
        }
        .all_nan());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::I16(348).display(), "348");
        assert_eq!(FieldValue::F32(1.0).display(), "1.0");
        assert_eq!(FieldValue::F32Vec(vec![1.0, 2.5]).display(), "[1.0, 2.5]");
        assert_eq!(
            FieldValue::I16Vec(vec![3, 10]).display_annotated(),
            "[3, 10]@int16"
        );
    }
}
