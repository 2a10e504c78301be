//! Encoding between canonical [`Splat`]s and the per-group storage layouts.
//!
//! Float formats store values as is. Normalized formats store values relative to
//! the ranges of a [`ChunkInfo`]; without one the identity range is used.
use bytemuck::{bytes_of, pod_read_unaligned};
use glam::{Quat, Vec3, Vec4};
use half::f16;

use crate::chunk::{ChunkInfo, denormalize3, denormalize4, normalize3, normalize4};
use crate::format::{CodecError, DataFormat, FormatDescriptor};
use crate::quant::{
    pack_111011, pack_655, pack_888, pack_8888, pack_smallest_three, unpack_111011, unpack_655,
    unpack_888, unpack_8888, unpack_smallest_three,
};
use crate::sh::{SH_C0, SH_COEFFS, rgb_to_sh};
use crate::splat::Splat;

// Quantized scales never decode to exactly zero.
const MIN_DECODED_SCALE: f32 = 1e-7;

fn read_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

fn read_u16(raw: &[u8]) -> u16 {
    u16::from_le_bytes([raw[0], raw[1]])
}

fn to_halves<const N: usize>(values: [f32; N]) -> [u16; N] {
    values.map(|v| f16::from_f32(v).to_bits())
}

fn from_halves<const N: usize>(values: [u16; N]) -> [f32; N] {
    values.map(|v| f16::from_bits(v).to_f32())
}

pub(crate) fn encode_vector(v: Vec3, format: DataFormat, range: (Vec3, Vec3), out: &mut [u8]) {
    match format {
        DataFormat::Float32 => out[..12].copy_from_slice(bytes_of(&v.to_array())),
        DataFormat::Float16 => out[..6].copy_from_slice(bytes_of(&to_halves(v.to_array()))),
        DataFormat::Norm11 => {
            let packed = pack_111011(normalize3(v, range));
            out[..4].copy_from_slice(&packed.to_le_bytes());
        }
        DataFormat::Norm6 => {
            let packed = pack_655(normalize3(v, range));
            out[..2].copy_from_slice(&packed.to_le_bytes());
        }
        DataFormat::Norm8 => out[..3].copy_from_slice(&pack_888(normalize3(v, range))),
    }
}

pub(crate) fn decode_vector(raw: &[u8], format: DataFormat, range: (Vec3, Vec3)) -> Vec3 {
    match format {
        DataFormat::Float32 => Vec3::from_array(pod_read_unaligned(&raw[..12])),
        DataFormat::Float16 => Vec3::from_array(from_halves(pod_read_unaligned(&raw[..6]))),
        DataFormat::Norm11 => denormalize3(unpack_111011(read_u32(raw)), range),
        DataFormat::Norm6 => denormalize3(unpack_655(read_u16(raw)), range),
        DataFormat::Norm8 => denormalize3(unpack_888([raw[0], raw[1], raw[2]]), range),
    }
}

fn ranges(chunk: Option<&ChunkInfo>) -> &ChunkInfo {
    chunk.unwrap_or(&ChunkInfo::UNIT)
}

pub(crate) fn encode_position(
    pos: Vec3,
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
    out: &mut [u8],
) {
    encode_vector(pos, format, ranges(chunk).pos_range(), out);
}

pub(crate) fn decode_position(raw: &[u8], format: DataFormat, chunk: Option<&ChunkInfo>) -> Vec3 {
    decode_vector(raw, format, ranges(chunk).pos_range())
}

pub(crate) fn encode_other(
    rot: Quat,
    scale: Vec3,
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
    out: &mut [u8],
) {
    if format == DataFormat::Float32 {
        let values = [rot.x, rot.y, rot.z, rot.w, scale.x, scale.y, scale.z];
        out[..28].copy_from_slice(bytes_of(&values));
    } else {
        out[..4].copy_from_slice(&pack_smallest_three(rot).to_le_bytes());
        encode_vector(scale, format, ranges(chunk).scale_range(), &mut out[4..]);
    }
}

pub(crate) fn decode_other(
    raw: &[u8],
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
) -> (Quat, Vec3) {
    if format == DataFormat::Float32 {
        let values: [f32; 7] = pod_read_unaligned(&raw[..28]);
        (
            Quat::from_xyzw(values[0], values[1], values[2], values[3]),
            Vec3::new(values[4], values[5], values[6]),
        )
    } else {
        let rot = unpack_smallest_three(read_u32(raw));
        let scale = decode_vector(&raw[4..], format, ranges(chunk).scale_range());
        (rot, scale.max(Vec3::splat(MIN_DECODED_SCALE)))
    }
}

/// Encode the 15 higher order coefficients, `sh[0]` lives in the color group.
pub(crate) fn encode_sh(
    sh: &[Vec3; SH_COEFFS],
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
    out: &mut [u8],
) {
    let stride = format.vector_stride();
    let range = ranges(chunk).sh_range();
    for (k, coeff) in sh[1..].iter().enumerate() {
        encode_vector(*coeff, format, range, &mut out[k * stride..]);
    }
}

pub(crate) fn decode_sh(
    raw: &[u8],
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
    sh: &mut [Vec3; SH_COEFFS],
) {
    let stride = format.vector_stride();
    let range = ranges(chunk).sh_range();
    for (k, coeff) in sh[1..].iter_mut().enumerate() {
        *coeff = decode_vector(&raw[k * stride..], format, range);
    }
}

/// Encode the DC term and opacity. Float32 keeps the coefficients as they are,
/// the other formats store base color and opacity.
pub(crate) fn encode_color(
    dc: Vec3,
    opacity: f32,
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
    out: &mut [u8],
) {
    let color = (dc * SH_C0 + 0.5).extend(opacity);
    match format {
        DataFormat::Float32 => {
            out[..16].copy_from_slice(bytes_of(&dc.extend(opacity).to_array()));
        }
        DataFormat::Float16 => out[..8].copy_from_slice(bytes_of(&to_halves(color.to_array()))),
        DataFormat::Norm8 => {
            let packed = pack_8888(normalize4(color, ranges(chunk).col_range()));
            out[..4].copy_from_slice(&packed.to_le_bytes());
        }
        DataFormat::Norm11 | DataFormat::Norm6 => {
            unreachable!("Color formats are validated before encoding")
        }
    }
}

/// DC term and opacity of a color record.
pub(crate) fn decode_color(
    raw: &[u8],
    format: DataFormat,
    chunk: Option<&ChunkInfo>,
) -> (Vec3, f32) {
    let color = match format {
        DataFormat::Float32 => {
            let values: [f32; 4] = pod_read_unaligned(&raw[..16]);
            return (Vec3::new(values[0], values[1], values[2]), values[3]);
        }
        DataFormat::Float16 => Vec4::from_array(from_halves(pod_read_unaligned(&raw[..8]))),
        DataFormat::Norm8 => denormalize4(unpack_8888(read_u32(raw)), ranges(chunk).col_range()),
        DataFormat::Norm11 | DataFormat::Norm6 => {
            unreachable!("Color formats are validated before decoding")
        }
    };
    (rgb_to_sh(color.truncate()), color.w)
}

/// The four encoded groups of a single splat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawSplat {
    pub pos: Vec<u8>,
    pub other: Vec<u8>,
    pub sh: Vec<u8>,
    pub color: Vec<u8>,
}

pub fn encode_splat(
    splat: &Splat,
    formats: FormatDescriptor,
    chunk: Option<&ChunkInfo>,
) -> Result<RawSplat, CodecError> {
    formats.validate()?;
    let mut raw = RawSplat {
        pos: vec![0; formats.pos_stride()],
        other: vec![0; formats.other_stride()],
        sh: vec![0; formats.sh_stride()],
        color: vec![0; formats.color_stride()],
    };
    encode_position(splat.pos, formats.pos, chunk, &mut raw.pos);
    encode_other(splat.rot, splat.scale, formats.other, chunk, &mut raw.other);
    encode_sh(&splat.sh, formats.sh, chunk, &mut raw.sh);
    encode_color(splat.sh[0], splat.opacity, formats.color, chunk, &mut raw.color);
    Ok(raw)
}

pub fn decode_splat(
    raw: &RawSplat,
    formats: FormatDescriptor,
    chunk: Option<&ChunkInfo>,
) -> Result<Splat, CodecError> {
    formats.validate()?;
    for (group, found, needed) in [
        ("position", raw.pos.len(), formats.pos_stride()),
        ("other", raw.other.len(), formats.other_stride()),
        ("sh", raw.sh.len(), formats.sh_stride()),
        ("color", raw.color.len(), formats.color_stride()),
    ] {
        if found < needed {
            return Err(CodecError::Truncated {
                group,
                needed,
                found,
            });
        }
    }

    let (rot, scale) = decode_other(&raw.other, formats.other, chunk);
    let mut splat = Splat {
        pos: decode_position(&raw.pos, formats.pos, chunk),
        rot,
        scale,
        ..Default::default()
    };
    decode_sh(&raw.sh, formats.sh, chunk, &mut splat.sh);
    (splat.sh[0], splat.opacity) = decode_color(&raw.color, formats.color, chunk);
    Ok(splat)
}
