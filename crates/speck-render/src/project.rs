use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use half::f16;
use speck_kernel::{create_buffer, dispatch_1d};

use crate::bitset::DeletionBits;
use crate::camera::CameraParams;
use crate::config::RenderConfig;
use crate::cutout::ObjectCutouts;
use crate::sh::{MAX_SH_ORDER, SH_COEFFS, eval_sh};
use crate::storage::SplatStorage;

/// Low pass filter added to the 2D covariance, in pixels squared.
pub const COV_BLUR: f32 = 0.3;
/// Smallest eigenvalue of a projected covariance.
pub const EIGEN_FLOOR: f32 = 0.1;
/// Longest screen space axis, in pixels.
pub const MAX_AXIS_LENGTH: f32 = 4096.0;
/// Largest opacity after applying the global opacity scale.
pub const MAX_OPACITY: f32 = 65000.0;
// Splat centers are clamped to this multiple of the frustum when evaluating the
// projection Jacobian.
const FRUSTUM_CLAMP: f32 = 1.3;

/// Per splat output of the projection pass, consumed by the rasterizer.
///
/// Degenerate splats are all zeros, so `clip_pos[3] == 0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewRecord {
    pub clip_pos: [f32; 4],
    /// Major ellipse axis in pixels.
    pub axis1: [f32; 2],
    /// Minor ellipse axis in pixels, perpendicular to `axis1`.
    pub axis2: [f32; 2],
    /// RGBA as four halves: `r << 16 | g`, `b << 16 | a`.
    pub color: [u32; 2],
}

impl ViewRecord {
    pub fn is_degenerate(&self) -> bool {
        self.clip_pos[3] == 0.0
    }

    pub fn color(&self) -> Vec4 {
        unpack_color(self.color)
    }
}

fn half_bits(v: f32) -> u32 {
    f16::from_f32(v).to_bits() as u32
}

pub fn pack_color(rgba: Vec4) -> [u32; 2] {
    [
        (half_bits(rgba.x) << 16) | half_bits(rgba.y),
        (half_bits(rgba.z) << 16) | half_bits(rgba.w),
    ]
}

pub fn unpack_color(packed: [u32; 2]) -> Vec4 {
    let half = |bits: u32| f16::from_bits(bits as u16).to_f32();
    Vec4::new(
        half(packed[0] >> 16),
        half(packed[0] & 0xFFFF),
        half(packed[1] >> 16),
        half(packed[1] & 0xFFFF),
    )
}

/// Covariance `R S S^T R^T` of a gaussian.
pub fn calc_cov3d(rot: Quat, scale: Vec3) -> Mat3 {
    let rot = Vec4::from(rot)
        .try_normalize()
        .map_or(Quat::IDENTITY, Quat::from_vec4);
    let m = Mat3::from_quat(rot) * Mat3::from_diagonal(scale);
    m * m.transpose()
}

/// Project a 3D covariance to screen space. Returns the symmetric 2x2 result as
/// `(xx, xy, yy)`.
///
/// `model_view` takes the covariance from object to view space, `view_pos` is
/// the splat center in view space.
pub fn calc_cov2d(
    cov3d: Mat3,
    view_pos: Vec3,
    model_view: Mat3,
    focal: Vec2,
    tan_fov: Vec2,
) -> Vec3 {
    let lim = tan_fov * FRUSTUM_CLAMP;
    let z = view_pos.z;
    let tx = (view_pos.x / z).clamp(-lim.x, lim.x) * z;
    let ty = (view_pos.y / z).clamp(-lim.y, lim.y) * z;

    // Jacobian of the perspective projection at the clamped center, column major.
    let j = Mat3::from_cols(
        Vec3::new(focal.x / z, 0.0, 0.0),
        Vec3::new(0.0, focal.y / z, 0.0),
        Vec3::new(-focal.x * tx / (z * z), -focal.y * ty / (z * z), 0.0),
    );
    let t = j * model_view;
    let cov = t * cov3d * t.transpose();
    Vec3::new(
        cov.x_axis.x + COV_BLUR,
        cov.y_axis.x,
        cov.y_axis.y + COV_BLUR,
    )
}

/// Eigenvalues of a 2x2 covariance `(xx, xy, yy)`, largest first, both
/// clamped to [`EIGEN_FLOOR`].
pub fn covariance_eigenvalues(cov: Vec3) -> (f32, f32) {
    let mid = 0.5 * (cov.x + cov.z);
    let radius = Vec2::new(0.5 * (cov.x - cov.z), cov.y).length();
    ((mid + radius).max(EIGEN_FLOOR), (mid - radius).max(EIGEN_FLOOR))
}

/// Split a 2x2 covariance into two perpendicular ellipse axes, each of length
/// `sqrt(2 * eigenvalue)` capped at [`MAX_AXIS_LENGTH`].
pub fn decompose_covariance(cov: Vec3) -> (Vec2, Vec2) {
    let (lambda1, lambda2) = covariance_eigenvalues(cov);
    let fallback = if cov.x >= cov.z { Vec2::X } else { Vec2::Y };
    let major = Vec2::new(cov.y, lambda1 - cov.x)
        .try_normalize()
        .unwrap_or(fallback);
    let minor = Vec2::new(major.y, -major.x);

    let axis1 = (2.0 * lambda1).sqrt().min(MAX_AXIS_LENGTH) * major;
    let axis2 = (2.0 * lambda2).sqrt().min(MAX_AXIS_LENGTH) * minor;
    (axis1, axis2)
}

/// Everything the projection pass needs besides the splats themselves.
#[derive(Clone, Copy, Debug)]
pub struct ProjectUniforms {
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
    /// Camera position in object space.
    pub camera_object: Vec3,
    pub focal: Vec2,
    pub tan_fov: Vec2,
    pub splat_scale: f32,
    pub opacity_scale: f32,
    pub sh_order: u32,
    pub sh_only: bool,
}

impl ProjectUniforms {
    pub fn new(camera: &CameraParams, object_to_world: Mat4, config: &RenderConfig) -> Self {
        let model_view = camera.view * object_to_world;
        Self {
            model_view,
            model_view_projection: camera.projection * model_view,
            camera_object: object_to_world.inverse().transform_point3(camera.position),
            focal: camera.focal(),
            tan_fov: camera.tan_fov(),
            splat_scale: config.splat_scale,
            opacity_scale: config.opacity_scale,
            sh_order: config.sh_order.min(MAX_SH_ORDER),
            sh_only: config.sh_only,
        }
    }
}

fn project_splat(
    storage: &SplatStorage,
    index: usize,
    deleted: Option<&DeletionBits>,
    cutouts: &ObjectCutouts,
    uniforms: &ProjectUniforms,
) -> ViewRecord {
    let pos = storage.position(index);
    let clip = uniforms.model_view_projection * pos.extend(1.0);
    if clip.w <= 0.0 {
        return ViewRecord::zeroed();
    }
    if deleted.is_some_and(|bits| bits.get(index)) || cutouts.is_cut(pos) {
        return ViewRecord::zeroed();
    }

    let (rot, scale) = storage.rotation_scale(index);
    let cov3d = calc_cov3d(rot, scale * uniforms.splat_scale);
    let view_pos = uniforms.model_view.transform_point3(pos);
    let cov2d = calc_cov2d(
        cov3d,
        view_pos,
        Mat3::from_mat4(uniforms.model_view),
        uniforms.focal,
        uniforms.tan_fov,
    );
    let (axis1, axis2) = decompose_covariance(cov2d);

    let (dc, opacity) = storage.dc_opacity(index);
    let mut sh = [Vec3::ZERO; SH_COEFFS];
    sh[0] = dc;
    if uniforms.sh_order > 0 {
        storage.sh(index, &mut sh);
    }
    // From the camera toward the splat.
    let dir = (pos - uniforms.camera_object).normalize_or(Vec3::Z);
    let rgb = eval_sh(&sh, uniforms.sh_order, dir, uniforms.sh_only);
    let alpha = (opacity * uniforms.opacity_scale).min(MAX_OPACITY);

    ViewRecord {
        clip_pos: clip.to_array(),
        axis1: axis1.to_array(),
        axis2: axis2.to_array(),
        color: pack_color(rgb.extend(alpha)),
    }
}

/// Project every splat of a collection.
pub fn calc_view_data(
    storage: &SplatStorage,
    deleted: Option<&DeletionBits>,
    cutouts: &ObjectCutouts,
    uniforms: &ProjectUniforms,
) -> Vec<ViewRecord> {
    let mut records = create_buffer::<ViewRecord>(storage.count());
    dispatch_1d("CalcViewData", &mut records, |i, out| {
        *out = project_splat(storage, i, deleted, cutouts, uniforms);
    });
    records
}
