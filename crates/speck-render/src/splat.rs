use glam::{Quat, Vec3, Vec4};

use crate::sh::{SH_C0, SH_COEFFS, rgb_to_sh};

/// A single gaussian in canonical full precision.
///
/// `sh[0]` is the DC term, `sh[1..]` the 15 higher order coefficients of bands 1 to 3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
    pub opacity: f32,
    pub sh: [Vec3; SH_COEFFS],
}

impl Default for Splat {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            scale: Vec3::ONE,
            opacity: 1.0,
            sh: [Vec3::ZERO; SH_COEFFS],
        }
    }
}

impl Splat {
    /// A splat with only a base color and no view dependent terms.
    pub fn from_color(pos: Vec3, rot: Quat, scale: Vec3, rgb: Vec3, opacity: f32) -> Self {
        let mut sh = [Vec3::ZERO; SH_COEFFS];
        sh[0] = rgb_to_sh(rgb);
        Self {
            pos,
            rot,
            scale,
            opacity,
            sh,
        }
    }

    pub fn base_color(&self) -> Vec3 {
        self.sh[0] * SH_C0 + 0.5
    }

    /// Base color and opacity, as stored in the color group.
    pub fn color(&self) -> Vec4 {
        self.base_color().extend(self.opacity)
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn inverse_sigmoid(x: f32) -> f32 {
    let x = x.clamp(1e-6, 1.0 - 1e-6);
    (x / (1.0 - x)).ln()
}
