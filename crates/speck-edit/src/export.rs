use std::fmt::Write;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use rayon::prelude::*;
use speck_render::sh::{SH_COEFFS, SH_REST_COEFFS};
use speck_render::splat::{inverse_sigmoid, sigmoid};
use speck_render::{Splat, SplatCollection};

use crate::error::EditError;
use crate::transform::SplatTransform;

// Smallest scale written, keeps the log finite.
const MIN_SCALE: f32 = 1e-7;

/// A splat in the layout common to 3D gaussian splatting tools. Matches the
/// vertex properties of [`ply_header`] one to one.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ExportSplat {
    pub pos: [f32; 3],
    /// Unused, always zero.
    pub normal: [f32; 3],
    pub f_dc: [f32; 3],
    /// Higher order SH, all red coefficients first, then green, then blue.
    pub f_rest: [[f32; SH_REST_COEFFS]; 3],
    /// Opacity logit.
    pub opacity: f32,
    /// Log scale.
    pub scale: [f32; 3],
    /// Rotation as w, x, y, z.
    pub rot: [f32; 4],
}

impl ExportSplat {
    pub fn from_splat(splat: &Splat) -> Self {
        let rot = splat.rot.normalize();
        let scale = splat.scale.max(Vec3::splat(MIN_SCALE));
        Self {
            pos: splat.pos.to_array(),
            normal: [0.0; 3],
            f_dc: splat.sh[0].to_array(),
            f_rest: std::array::from_fn(|c| std::array::from_fn(|k| splat.sh[k + 1][c])),
            opacity: inverse_sigmoid(splat.opacity),
            scale: [scale.x.ln(), scale.y.ln(), scale.z.ln()],
            rot: [rot.w, rot.x, rot.y, rot.z],
        }
    }

    pub fn to_splat(&self) -> Splat {
        let mut sh = [Vec3::ZERO; SH_COEFFS];
        sh[0] = Vec3::from_array(self.f_dc);
        for (k, coeff) in sh.iter_mut().skip(1).enumerate() {
            *coeff = Vec3::new(self.f_rest[0][k], self.f_rest[1][k], self.f_rest[2][k]);
        }
        let [w, x, y, z] = self.rot;
        Splat {
            pos: Vec3::from_array(self.pos),
            rot: Quat::from_xyzw(x, y, z, w).normalize(),
            scale: Vec3::from_array(self.scale).exp(),
            opacity: sigmoid(self.opacity),
            sh,
        }
    }
}

/// Every splat that is neither deleted nor cut, in canonical layout. With
/// `bake_transform` the collection's own transform is applied, so the records
/// are in world space.
pub fn export_splats(
    collection: &SplatCollection,
    bake_transform: bool,
) -> Result<Vec<ExportSplat>, EditError> {
    let storage = collection.storage().ok_or(EditError::InvalidAsset)?;
    let _span = tracing::trace_span!("ExportSplats", count = storage.count()).entered();

    let cutouts = collection.object_cutouts();
    let deleted = collection.deletion();
    let transform = bake_transform.then(|| SplatTransform::new(collection.object_to_world));

    let records: Vec<ExportSplat> = (0..storage.count())
        .into_par_iter()
        .filter(|&i| !deleted.is_some_and(|bits| bits.get(i)))
        .filter_map(|i| {
            if cutouts.is_cut(storage.position(i)) {
                return None;
            }
            let mut splat = storage.decode_splat(i);
            if let Some(transform) = &transform {
                transform.apply(&mut splat);
            }
            Some(ExportSplat::from_splat(&splat))
        })
        .collect();

    tracing::debug!("Exported {} of {} splats", records.len(), storage.count());
    Ok(records)
}

/// Header of a binary little endian PLY file whose body is the bytes of
/// `count` [`ExportSplat`] records.
pub fn ply_header(count: usize) -> String {
    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    header.push_str("comment Vertical axis: y\n");
    let _ = writeln!(header, "element vertex {count}");

    let mut names: Vec<String> = ["x", "y", "z", "nx", "ny", "nz"]
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
    names.extend((0..3).map(|i| format!("f_dc_{i}")));
    names.extend((0..3 * SH_REST_COEFFS).map(|i| format!("f_rest_{i}")));
    names.push("opacity".to_owned());
    names.extend((0..3).map(|i| format!("scale_{i}")));
    names.extend((0..4).map(|i| format!("rot_{i}")));

    for name in names {
        let _ = writeln!(header, "property float {name}");
    }
    header.push_str("end_header\n");
    header
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use super::{ExportSplat, export_splats, ply_header};
    use assert_approx_eq::assert_approx_eq;
    use glam::{Mat4, Quat, Vec3};
    use speck_render::cutout::Cutout;
    use speck_render::{Splat, SplatCollection};

    fn splat_at(x: f32) -> Splat {
        let mut splat = Splat::from_color(
            Vec3::new(x, 0.0, 0.0),
            Quat::from_rotation_z(0.3),
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(0.1, 0.5, 0.9),
            0.75,
        );
        splat.sh[1] = Vec3::new(0.1, 0.2, 0.3);
        splat.sh[15] = Vec3::new(-0.1, -0.2, -0.3);
        splat
    }

    #[test]
    fn layout() {
        let record = ExportSplat::from_splat(&splat_at(1.0));
        assert_eq!(size_of::<ExportSplat>(), 62 * 4);
        assert_eq!(record.f_rest[0][0], 0.1);
        assert_eq!(record.f_rest[2][0], 0.3);
        assert_eq!(record.f_rest[1][14], -0.2);
        assert_approx_eq!(record.opacity, (0.75f32 / 0.25).ln(), 1e-5);
        assert_approx_eq!(record.scale[1], 0.2f32.ln(), 1e-6);
        let rot = Quat::from_rotation_z(0.3);
        for (a, b) in record.rot.iter().zip([rot.w, rot.x, rot.y, rot.z]) {
            assert_approx_eq!(*a, b, 1e-6);
        }

        let back = record.to_splat();
        assert!((back.scale - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-5);
        assert_approx_eq!(back.opacity, 0.75, 1e-5);
        assert_eq!(back.sh[15], Vec3::new(-0.1, -0.2, -0.3));
    }

    #[test]
    fn skips_deleted_and_cut() -> anyhow::Result<()> {
        let splats: Vec<Splat> = (0..6).map(|i| splat_at(i as f32 * 2.0)).collect();
        let mut collection = SplatCollection::from_splats(&splats, Mat4::IDENTITY);
        collection.edit_parts().expect("Valid").deletion.set(1, true);
        collection
            .cutouts
            .push(Cutout::ellipsoid(Mat4::from_translation(Vec3::new(8.0, 0.0, 0.0)), false));

        let records = export_splats(&collection, false)?;
        let xs: Vec<f32> = records.iter().map(|r| r.pos[0]).collect();
        assert_eq!(xs, [0.0, 4.0, 6.0, 10.0]);
        Ok(())
    }

    #[test]
    fn bakes_world_transform() -> anyhow::Result<()> {
        let object_to_world = Mat4::from_scale_rotation_translation(
            Vec3::new(-2.0, 2.0, 2.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 5.0, 0.0),
        );
        let collection = SplatCollection::from_splats(&[splat_at(1.0)], object_to_world);
        let local = export_splats(&collection, false)?;
        let world = export_splats(&collection, true)?;
        assert_eq!(local[0].pos, [1.0, 0.0, 0.0]);
        assert_eq!(world[0].pos, [-2.0, 5.0, 0.0]);
        assert_approx_eq!(world[0].scale[0], 0.2f32.ln(), 1e-5);

        let splat = world[0].to_splat();
        // The splat's x axis is mirrored too, up to its sign.
        let axis = splat.rot * Vec3::X;
        let expected = Vec3::new(-(0.3f32.cos()), 0.3f32.sin(), 0.0);
        assert!((axis * axis.dot(expected).signum() - expected).length() < 1e-4);
        Ok(())
    }

    #[test]
    fn header_lists_every_float() {
        let header = ply_header(12);
        assert!(header.contains("element vertex 12\n"));
        assert_eq!(header.matches("property float").count(), 62);
        assert!(header.contains("property float f_rest_44\n"));
        assert!(header.ends_with("end_header\n"));
    }
}
