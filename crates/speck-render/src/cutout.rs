use clap::ValueEnum;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(
    Default, ValueEnum, Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CutoutShape {
    /// Unit sphere in cutout space.
    #[default]
    Ellipsoid,
    /// The cube `[-1, 1]^3` in cutout space.
    Box,
    /// Placeholder entry, never affects anything.
    Invalid,
}

/// A volume that hides splats inside it, or outside it when inverted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cutout {
    /// World to cutout space.
    pub matrix: Mat4,
    pub shape: CutoutShape,
    pub invert: bool,
}

impl Cutout {
    /// Ellipsoid from a world transform of the unit sphere.
    pub fn ellipsoid(cutout_to_world: Mat4, invert: bool) -> Self {
        Self {
            matrix: cutout_to_world.inverse(),
            shape: CutoutShape::Ellipsoid,
            invert,
        }
    }

    /// Box from a world transform of the `[-1, 1]^3` cube.
    pub fn cube(cutout_to_world: Mat4, invert: bool) -> Self {
        Self {
            matrix: cutout_to_world.inverse(),
            shape: CutoutShape::Box,
            invert,
        }
    }
}

fn contains(shape: CutoutShape, local: Vec3) -> Option<bool> {
    match shape {
        CutoutShape::Ellipsoid => Some(local.length_squared() <= 1.0),
        CutoutShape::Box => Some(local.abs().max_element() <= 1.0),
        CutoutShape::Invalid => None,
    }
}

/// Cutouts moved into the object space of one collection, ready to test splat
/// positions in that space.
#[derive(Clone, Debug, Default)]
pub struct ObjectCutouts {
    entries: Vec<(Mat4, CutoutShape, bool)>,
}

impl ObjectCutouts {
    pub fn new(cutouts: &[Cutout], object_to_world: Mat4) -> Self {
        let entries = cutouts
            .iter()
            .filter(|c| c.shape != CutoutShape::Invalid)
            .map(|c| (c.matrix * object_to_world, c.shape, c.invert))
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A splat is cut when it lies inside a regular cutout or outside an
    /// inverted one. The first cutout that cuts decides.
    pub fn is_cut(&self, object_pos: Vec3) -> bool {
        for (matrix, shape, invert) in &self.entries {
            let local = matrix.transform_point3(object_pos);
            let Some(inside) = contains(*shape, local) else {
                continue;
            };
            if inside != *invert {
                return true;
            }
        }
        false
    }
}
