use glam::{Mat3, Mat4, Quat, Vec3};
use speck_render::Splat;
use speck_render::sh::ShRotation;

/// An affine transform of rotation, per axis scale and translation, applied to
/// whole splats.
///
/// Negative scales mirror the splats. Their rotation is conjugated by the
/// mirror so the footprint stays a valid gaussian, and the SH coefficients
/// are reflected along.
#[derive(Debug, Clone)]
pub struct SplatTransform {
    matrix: Mat4,
    rotation: Quat,
    scale: Vec3,
    sh_rotation: Option<ShRotation>,
}

impl SplatTransform {
    pub fn new(matrix: Mat4) -> Self {
        let (scale, rotation, _) = matrix.to_scale_rotation_translation();
        let linear = Mat3::from_mat4(matrix);
        // Direction part of the transform, mirror included.
        let orientation = Mat3::from_cols(
            linear.x_axis.normalize_or_zero(),
            linear.y_axis.normalize_or_zero(),
            linear.z_axis.normalize_or_zero(),
        );
        let sh_rotation = (!orientation.abs_diff_eq(Mat3::IDENTITY, 1e-6))
            .then(|| ShRotation::from_mat3(orientation));
        Self {
            matrix,
            rotation: rotation.normalize(),
            scale,
            sh_rotation,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.matrix.abs_diff_eq(Mat4::IDENTITY, 1e-6)
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Rotation of a splat after transforming it.
    pub fn rotate(&self, rot: Quat) -> Quat {
        let mut q = rot.to_array();
        // Mirroring axis k flips the two quaternion components of the other axes.
        for axis in 0..3 {
            if self.scale[axis] < 0.0 {
                q[(axis + 1) % 3] = -q[(axis + 1) % 3];
                q[(axis + 2) % 3] = -q[(axis + 2) % 3];
            }
        }
        (self.rotation * Quat::from_array(q)).normalize()
    }

    pub fn apply(&self, splat: &mut Splat) {
        splat.pos = self.matrix.transform_point3(splat.pos);
        splat.rot = self.rotate(splat.rot);
        splat.scale *= self.scale.abs();
        if let Some(sh_rotation) = &self.sh_rotation {
            sh_rotation.apply(&mut splat.sh);
        }
    }
}
