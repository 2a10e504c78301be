//! Bit packing primitives for the quantized formats.
//!
//! All `unorm` helpers take values already remapped to `[0, 1]`.
use glam::{Quat, Vec3, Vec4};

const SQRT2: f32 = std::f32::consts::SQRT_2;

pub fn pack_unorm(value: f32, bits: u32) -> u32 {
    let max = ((1u32 << bits) - 1) as f32;
    (value.clamp(0.0, 1.0) * max).round() as u32
}

pub fn unpack_unorm(packed: u32, bits: u32) -> f32 {
    let max = (1u32 << bits) - 1;
    (packed & max) as f32 / max as f32
}

pub fn pack_111011(v: Vec3) -> u32 {
    pack_unorm(v.x, 11) | (pack_unorm(v.y, 10) << 11) | (pack_unorm(v.z, 11) << 21)
}

pub fn unpack_111011(packed: u32) -> Vec3 {
    Vec3::new(
        unpack_unorm(packed, 11),
        unpack_unorm(packed >> 11, 10),
        unpack_unorm(packed >> 21, 11),
    )
}

pub fn pack_655(v: Vec3) -> u16 {
    (pack_unorm(v.x, 6) | (pack_unorm(v.y, 5) << 6) | (pack_unorm(v.z, 5) << 11)) as u16
}

pub fn unpack_655(packed: u16) -> Vec3 {
    let packed = packed as u32;
    Vec3::new(
        unpack_unorm(packed, 6),
        unpack_unorm(packed >> 6, 5),
        unpack_unorm(packed >> 11, 5),
    )
}

pub fn pack_888(v: Vec3) -> [u8; 3] {
    v.to_array().map(|c| pack_unorm(c, 8) as u8)
}

pub fn unpack_888(packed: [u8; 3]) -> Vec3 {
    Vec3::from_array(packed.map(|c| unpack_unorm(c as u32, 8)))
}

pub fn pack_8888(v: Vec4) -> u32 {
    u32::from_le_bytes(v.to_array().map(|c| pack_unorm(c, 8) as u8))
}

pub fn unpack_8888(packed: u32) -> Vec4 {
    Vec4::from_array(packed.to_le_bytes().map(|c| unpack_unorm(c as u32, 8)))
}

/// Pack a rotation as its three smallest components (10 bits each) plus the
/// 2-bit index of the dropped largest component.
///
/// The quaternion is negated when needed so the dropped component is positive,
/// which lets the decoder rebuild it from the unit length constraint.
pub fn pack_smallest_three(rot: Quat) -> u32 {
    let mut q = rot.normalize().to_array();
    let largest = (0..4)
        .max_by(|&a, &b| q[a].abs().total_cmp(&q[b].abs()))
        .unwrap_or(3);
    if q[largest] < 0.0 {
        q = q.map(|c| -c);
    }

    let mut packed = (largest as u32) << 30;
    let mut shift = 0;
    for (i, c) in q.iter().enumerate() {
        if i == largest {
            continue;
        }
        packed |= pack_unorm(c * (SQRT2 * 0.5) + 0.5, 10) << shift;
        shift += 10;
    }
    packed
}

pub fn unpack_smallest_three(packed: u32) -> Quat {
    let largest = (packed >> 30) as usize;
    let three = [0, 10, 20].map(|shift| (unpack_unorm(packed >> shift, 10) - 0.5) * SQRT2);
    let dropped = (1.0 - three.iter().map(|c| c * c).sum::<f32>()).max(0.0).sqrt();

    let mut q = [0.0; 4];
    let mut rest = three.into_iter();
    for (i, c) in q.iter_mut().enumerate() {
        *c = if i == largest {
            dropped
        } else {
            rest.next().unwrap_or_default()
        };
    }
    Quat::from_array(q).normalize()
}
