use glam::{Quat, Vec2, Vec3};
use rayon::prelude::*;
use speck_render::bitset::SelectionBits;
use speck_render::format::DataFormat;
use speck_render::storage::RotationScale;
use speck_render::{CameraParams, EditParts, MAX_SPLAT_COUNT, SplatCollection, StagedSplats};

use crate::aggregate::{EditAggregate, recompute_aggregate};
use crate::error::EditError;
use crate::state::SplatState;

/// Transforms only move selected splats, never deleted or cut ones.
fn is_transformable(parts: &EditParts<'_>, index: usize) -> bool {
    SplatState::of(parts, index) == SplatState::Selected
}

/// Selection and mutation of one splat collection.
///
/// Drag gestures capture a snapshot when they start. Rectangle selection,
/// rotation and scaling are then applied relative to that snapshot, so
/// repeating them during a drag doesn't compound.
#[derive(Debug, Default)]
pub struct EditEngine {
    selection_snapshot: Option<SelectionBits>,
    position_snapshot: Option<Vec<[f32; 3]>>,
    other_snapshot: Option<Vec<RotationScale>>,
    aggregate: EditAggregate,
}

impl EditEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts and bounds as of the last edit.
    pub fn aggregate(&self) -> &EditAggregate {
        &self.aggregate
    }

    /// Recompute counts and bounds. Also drops the selection of splats that are
    /// deleted or cut.
    pub fn update_aggregate(&mut self, collection: &mut SplatCollection) -> EditAggregate {
        if let Some(mut parts) = collection.edit_parts() {
            self.aggregate = recompute_aggregate(&mut parts);
        }
        self.aggregate
    }

    pub fn store_selection_snapshot(&mut self, collection: &mut SplatCollection) {
        self.selection_snapshot = collection.edit_parts().map(|parts| parts.selection.clone());
    }

    /// Capture positions, only possible for full precision storage.
    pub fn store_position_snapshot(&mut self, collection: &mut SplatCollection) {
        self.position_snapshot = collection
            .edit_parts()
            .and_then(|parts| parts.storage.positions().map(<[_]>::to_vec));
    }

    /// Capture rotations and scales, only possible for full precision storage.
    pub fn store_other_snapshot(&mut self, collection: &mut SplatCollection) {
        self.other_snapshot = collection
            .edit_parts()
            .and_then(|parts| parts.storage.rotation_scales().map(<[_]>::to_vec));
    }

    /// Drop every gesture snapshot.
    pub fn end_gesture(&mut self) {
        self.selection_snapshot = None;
        self.position_snapshot = None;
        self.other_snapshot = None;
    }

    /// Select (or with `subtract`, deselect) every splat whose center projects
    /// inside the screen rectangle spanned by `corner_a` and `corner_b`.
    ///
    /// Always starts from the selection snapshot of the current gesture, which
    /// is captured here if there isn't one yet.
    pub fn select_rect(
        &mut self,
        collection: &mut SplatCollection,
        camera: &CameraParams,
        corner_a: Vec2,
        corner_b: Vec2,
        subtract: bool,
    ) -> bool {
        let Some(mut parts) = collection.edit_parts() else {
            return false;
        };
        if self
            .selection_snapshot
            .as_ref()
            .is_none_or(|snapshot| snapshot.len() != parts.selection.len())
        {
            self.selection_snapshot = Some(parts.selection.clone());
        }
        let Some(snapshot) = &self.selection_snapshot else {
            return false;
        };

        let _span = tracing::trace_span!("SelectRect", subtract).entered();
        let rect_min = corner_a.min(corner_b);
        let rect_max = corner_a.max(corner_b);
        let model_view_projection = camera.view_projection() * parts.object_to_world;
        let storage = &*parts.storage;
        let deletion = &*parts.deletion;
        let cutouts = &parts.cutouts;

        parts.selection.par_update(|i, _| {
            let selected = snapshot.get(i);
            if deletion.get(i) {
                return selected;
            }
            let pos = storage.position(i);
            if cutouts.is_cut(pos) {
                return selected;
            }
            let Some(screen) = camera.clip_to_screen(model_view_projection * pos.extend(1.0))
            else {
                return selected;
            };
            if screen.cmplt(rect_min).any() || screen.cmpgt(rect_max).any() {
                return selected;
            }
            !subtract
        });

        self.aggregate = recompute_aggregate(&mut parts);
        true
    }

    /// Set the selection bit of specific splats.
    pub fn select_indices(
        &mut self,
        collection: &mut SplatCollection,
        indices: &[u32],
        selected: bool,
    ) -> Result<(), EditError> {
        let mut parts = collection.edit_parts().ok_or(EditError::InvalidAsset)?;
        let count = parts.selection.len();
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(EditError::InvalidRange {
                start: bad as usize,
                end: bad as usize + 1,
                count,
            });
        }
        for &i in indices {
            parts.selection.set(i as usize, selected);
        }
        self.aggregate = recompute_aggregate(&mut parts);
        Ok(())
    }

    /// Select every splat that isn't deleted or cut.
    pub fn select_all(&mut self, collection: &mut SplatCollection) {
        self.update_selection("SelectAll", collection, |_| true);
    }

    pub fn deselect_all(&mut self, collection: &mut SplatCollection) {
        self.update_selection("DeselectAll", collection, |_| false);
    }

    /// Flip the selection of every splat that isn't deleted or cut.
    pub fn invert_selection(&mut self, collection: &mut SplatCollection) {
        self.update_selection("InvertSelection", collection, |selected| !selected);
    }

    fn update_selection(
        &mut self,
        name: &'static str,
        collection: &mut SplatCollection,
        op: impl Fn(bool) -> bool + Sync + Send,
    ) {
        let Some(mut parts) = collection.edit_parts() else {
            return;
        };
        let _span = tracing::trace_span!("UpdateSelection", op = name).entered();
        let storage = &*parts.storage;
        let deletion = &*parts.deletion;
        let cutouts = &parts.cutouts;
        parts.selection.par_update(|i, selected| {
            let deleted = deletion.get(i);
            let cut = !deleted && cutouts.is_cut(storage.position(i));
            SplatState::from_flags(selected, deleted, cut).is_editable() && op(selected)
        });
        self.aggregate = recompute_aggregate(&mut parts);
    }

    /// Edit access when the touched groups are plain floats without a chunk
    /// table: positions, plus rotation and scale with `needs_other`.
    fn editable_parts<'a>(
        collection: &'a mut SplatCollection,
        operation: &'static str,
        needs_other: bool,
    ) -> Option<EditParts<'a>> {
        let parts = collection.edit_parts()?;
        let formats = parts.storage.formats();
        let editable = !parts.storage.has_chunks()
            && formats.pos == DataFormat::Float32
            && (!needs_other || formats.other == DataFormat::Float32);
        if !editable {
            tracing::debug!(
                "{operation} skipped, storage {:?} can't be edited in place",
                parts.storage.formats()
            );
            return None;
        }
        Some(parts)
    }

    /// Move the selected splats by `delta` in object space. Moves add up, each
    /// call starts from the current positions.
    pub fn translate_selection(&mut self, collection: &mut SplatCollection, delta: Vec3) -> bool {
        let Some(mut parts) = Self::editable_parts(collection, "Translate", false) else {
            return false;
        };
        let moved: Vec<bool> = (0..parts.storage.count())
            .into_par_iter()
            .map(|i| is_transformable(&parts, i))
            .collect();
        let Some(positions) = parts.storage.positions_mut() else {
            return false;
        };
        for (pos, _) in positions.iter_mut().zip(&moved).filter(|(_, m)| **m) {
            *pos = (Vec3::from_array(*pos) + delta).to_array();
        }
        self.aggregate = recompute_aggregate(&mut parts);
        collection.mark_modified();
        collection.invalidate_order();
        true
    }

    /// Rotate the selected splats around `center` (object space), relative to
    /// the position and rotation snapshots of the gesture.
    pub fn rotate_selection(
        &mut self,
        collection: &mut SplatCollection,
        center: Vec3,
        rotation: Quat,
    ) -> bool {
        self.transform_from_snapshot(collection, "Rotate", |pos, rs| {
            let pos = center + rotation * (pos - center);
            let rot = (rotation * rs.rotation()).normalize();
            (pos, rot, rs.scale())
        })
    }

    /// Scale the selected splats away from `center` (object space), relative to
    /// the position and scale snapshots of the gesture.
    pub fn scale_selection(
        &mut self,
        collection: &mut SplatCollection,
        center: Vec3,
        scale: Vec3,
    ) -> bool {
        self.transform_from_snapshot(collection, "Scale", |pos, rs| {
            let pos = center + (pos - center) * scale;
            let rot = rs.rotation();
            // Stretch of each splat axis under the object space scale.
            let axes = [Vec3::X, Vec3::Y, Vec3::Z].map(|axis| (scale * (rot * axis)).length());
            (pos, rot, rs.scale() * Vec3::from_array(axes))
        })
    }

    fn transform_from_snapshot(
        &mut self,
        collection: &mut SplatCollection,
        operation: &'static str,
        transform: impl Fn(Vec3, &RotationScale) -> (Vec3, Quat, Vec3) + Sync + Send,
    ) -> bool {
        let (Some(pos_snapshot), Some(other_snapshot)) =
            (&self.position_snapshot, &self.other_snapshot)
        else {
            tracing::debug!("{operation} skipped, no gesture snapshot");
            return false;
        };
        let Some(mut parts) = Self::editable_parts(collection, operation, true) else {
            return false;
        };
        let count = parts.storage.count();
        if pos_snapshot.len() != count || other_snapshot.len() != count {
            tracing::debug!("{operation} skipped, snapshot is for {} splats", pos_snapshot.len());
            return false;
        }

        let affected: Vec<usize> = (0..count)
            .into_par_iter()
            .filter(|&i| is_transformable(&parts, i))
            .collect();
        let results: Vec<(Vec3, Quat, Vec3)> = affected
            .par_iter()
            .map(|&i| transform(Vec3::from_array(pos_snapshot[i]), &other_snapshot[i]))
            .collect();

        if let Some(positions) = parts.storage.positions_mut() {
            for (&i, (pos, _, _)) in affected.iter().zip(&results) {
                positions[i] = pos.to_array();
            }
        }
        if let Some(others) = parts.storage.rotation_scales_mut() {
            for (&i, (_, rot, scale)) in affected.iter().zip(&results) {
                others[i] = RotationScale {
                    rot: rot.to_array(),
                    scale: scale.to_array(),
                };
            }
        }

        self.aggregate = recompute_aggregate(&mut parts);
        collection.mark_modified();
        collection.invalidate_order();
        true
    }

    /// Move the selection into the deletion bits. Returns whether anything new
    /// got deleted.
    pub fn delete_selected(&mut self, collection: &mut SplatCollection) -> bool {
        let Some(mut parts) = collection.edit_parts() else {
            return false;
        };
        let before = parts.deletion.count_ones();
        parts.deletion.union_with(&*parts.selection);
        parts.selection.clear();
        let changed = parts.deletion.count_ones() != before;
        self.aggregate = recompute_aggregate(&mut parts);
        if changed {
            collection.mark_modified();
        }
        changed
    }

    /// Append a copy of every selected, non deleted splat. The copies are
    /// selected, existing splats keep their selection and deletion bits.
    /// Returns the number of added splats.
    pub fn duplicate_selected(&mut self, collection: &mut SplatCollection) -> Result<usize, EditError> {
        let parts = collection.edit_parts().ok_or(EditError::InvalidAsset)?;
        let storage = &*parts.storage;
        if storage.formats().color != DataFormat::Float32 || storage.has_chunks() {
            let err = EditError::UnsupportedFormat {
                operation: "Duplicate",
                formats: storage.formats(),
                chunked: storage.has_chunks(),
            };
            tracing::warn!("{err}");
            return Err(err);
        }

        let sources: Vec<u32> = parts
            .selection
            .iter_ones()
            .filter(|&i| !parts.deletion.get(i))
            .map(|i| i as u32)
            .collect();
        if sources.is_empty() {
            tracing::debug!("Nothing selected to duplicate");
            return Ok(0);
        }
        let old_count = storage.count();
        let new_count = old_count + sources.len();
        if new_count > MAX_SPLAT_COUNT {
            return Err(EditError::InvalidSplatCount(new_count));
        }

        let _span = tracing::trace_span!("DuplicateSplats", count = sources.len()).entered();
        let mut selection = parts.selection.resized(new_count);
        for i in old_count..new_count {
            selection.set(i, true);
        }
        let staged = StagedSplats {
            storage: storage.append_copies(&sources),
            selection,
            deletion: parts.deletion.resized(new_count),
        };

        collection.stage(staged);
        collection.commit_staged();
        self.end_gesture();
        self.update_aggregate(collection);
        Ok(sources.len())
    }

    /// Change the number of splats. Kept splats are copied over, new ones are
    /// zeroed. Not possible with a chunk table.
    pub fn resize(&mut self, collection: &mut SplatCollection, count: usize) -> Result<(), EditError> {
        if count == 0 || count > MAX_SPLAT_COUNT {
            return Err(EditError::InvalidSplatCount(count));
        }
        let parts = collection.edit_parts().ok_or(EditError::InvalidAsset)?;
        let storage = &*parts.storage;
        if storage.has_chunks() {
            return Err(EditError::UnsupportedFormat {
                operation: "Resize",
                formats: storage.formats(),
                chunked: true,
            });
        }
        if storage.count() == count {
            return Ok(());
        }

        let staged = StagedSplats {
            storage: storage.with_count(count),
            selection: parts.selection.resized(count),
            deletion: parts.deletion.resized(count),
        };
        collection.stage(staged);
        collection.commit_staged();
        self.end_gesture();
        self.update_aggregate(collection);
        Ok(())
    }
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use super::EditEngine;
    use crate::error::EditError;
    use assert_approx_eq::assert_approx_eq;
    use glam::{Mat4, Quat, UVec2, Vec2, Vec3};
    use rand::Rng;
    use speck_render::cutout::Cutout;
    use speck_render::format::{DataFormat, FormatDescriptor};
    use speck_render::{CameraParams, RenderConfig, Splat, SplatAsset, SplatCollection};

    fn camera() -> CameraParams {
        CameraParams::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::Y,
            1.0,
            UVec2::new(512, 512),
        )
    }

    fn row(n: usize, spacing: f32) -> SplatCollection {
        let splats: Vec<Splat> = (0..n)
            .map(|i| Splat {
                pos: Vec3::new((i as f32 - (n - 1) as f32 * 0.5) * spacing, 0.0, 0.0),
                scale: Vec3::splat(0.05),
                ..Default::default()
            })
            .collect();
        SplatCollection::from_splats(&splats, Mat4::IDENTITY)
    }

    fn selected(collection: &SplatCollection) -> Vec<usize> {
        collection
            .selection()
            .map(|bits| bits.iter_ones().collect())
            .unwrap_or_default()
    }

    fn select_around(engine: &mut EditEngine, collection: &mut SplatCollection, index: usize) {
        let storage = collection.storage().expect("Valid");
        let screen = camera()
            .world_to_screen(storage.position(index))
            .expect("In front of camera");
        engine.store_selection_snapshot(collection);
        assert!(engine.select_rect(
            collection,
            &camera(),
            screen - Vec2::splat(3.0),
            screen + Vec2::splat(3.0),
            false,
        ));
        engine.end_gesture();
    }

    #[test]
    fn delete_scenario() {
        let mut collection = row(10, 1.0);
        let mut engine = EditEngine::new();
        for i in [2, 5, 7] {
            select_around(&mut engine, &mut collection, i);
        }
        assert_eq!(selected(&collection), [2, 5, 7]);
        assert_eq!(engine.aggregate().selected, 3);

        assert!(engine.delete_selected(&mut collection));
        assert_eq!(engine.aggregate().selected, 0);
        assert_eq!(engine.aggregate().deleted, 3);
        assert!(collection.is_modified());

        engine.select_all(&mut collection);
        assert_eq!(selected(&collection), [0, 1, 3, 4, 6, 8, 9]);
        assert_eq!(engine.aggregate().selected, 7);

        // Nothing new to delete the second time around.
        engine.deselect_all(&mut collection);
        assert!(!engine.delete_selected(&mut collection));
    }

    #[test]
    fn ellipsoid_cutout_scenario() {
        let mut collection = row(5, 2.0);
        let target = collection.storage().expect("Valid").position(1);
        collection
            .cutouts
            .push(Cutout::ellipsoid(Mat4::from_translation(target), false));

        collection.prepare_frame(&camera(), &RenderConfig::default());
        let view_data = collection.view_data();
        assert!(view_data[1].is_degenerate());
        assert!(view_data.iter().enumerate().all(|(i, r)| i == 1 || !r.is_degenerate()));

        let mut engine = EditEngine::new();
        engine.select_all(&mut collection);
        assert_eq!(selected(&collection), [0, 2, 3, 4]);
        assert_eq!(engine.aggregate().cut, 1);

        engine.invert_selection(&mut collection);
        assert!(selected(&collection).is_empty());
    }

    #[test]
    fn rect_selection_is_idempotent() {
        let mut collection = row(30, 0.3);
        let mut engine = EditEngine::new();
        engine.select_indices(&mut collection, &[0, 29], true).expect("In range");
        engine.store_selection_snapshot(&mut collection);

        let (a, b) = (Vec2::new(200.0, 0.0), Vec2::new(300.0, 512.0));
        engine.select_rect(&mut collection, &camera(), a, b, false);
        let first = selected(&collection);
        engine.select_rect(&mut collection, &camera(), b, a, false);
        assert_eq!(selected(&collection), first);
        assert!(first.len() > 3 && first.contains(&0) && first.contains(&29));

        // A smaller rectangle later in the same drag starts over from the snapshot.
        engine.select_rect(&mut collection, &camera(), Vec2::ZERO, Vec2::ONE, false);
        assert_eq!(selected(&collection), [0, 29]);

        engine.select_rect(&mut collection, &camera(), Vec2::ZERO, Vec2::splat(512.0), true);
        assert!(selected(&collection).is_empty());
    }

    #[test]
    fn rect_skips_behind_camera() {
        let splats = [Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0)].map(|pos| Splat {
            pos,
            ..Default::default()
        });
        let mut collection = SplatCollection::from_splats(&splats, Mat4::IDENTITY);
        let mut engine = EditEngine::new();
        engine.select_rect(
            &mut collection,
            &camera(),
            Vec2::splat(-1e6),
            Vec2::splat(1e6),
            false,
        );
        assert_eq!(selected(&collection), [0]);
    }

    #[test]
    fn duplicate_appends_selected() -> anyhow::Result<()> {
        let mut rng = rand::rng();
        let splats: Vec<Splat> = (0..20)
            .map(|_| {
                Splat::from_color(
                    Vec3::new(rng.random(), rng.random(), rng.random()),
                    Quat::from_rotation_x(rng.random()),
                    Vec3::splat(0.1),
                    Vec3::new(rng.random(), rng.random(), rng.random()),
                    rng.random(),
                )
            })
            .collect();
        let mut collection = SplatCollection::from_splats(&splats, Mat4::IDENTITY);
        let mut engine = EditEngine::new();
        engine.select_indices(&mut collection, &[4], true)?;
        engine.delete_selected(&mut collection);
        engine.select_indices(&mut collection, &[1, 4, 8, 12, 19], true)?;
        let before = collection.storage().expect("Valid").read_splats();

        let added = engine.duplicate_selected(&mut collection)?;
        // Splat 4 is deleted and doesn't count as selected.
        assert_eq!(added, 4);
        assert_eq!(collection.count(), 24);

        let storage = collection.storage().expect("Valid");
        assert_eq!(&storage.read_splats()[..20], &before[..]);
        for (new, old) in (20..24).zip([1, 8, 12, 19]) {
            assert_eq!(storage.decode_splat(new), before[old]);
        }
        assert_eq!(selected(&collection), [1, 8, 12, 19, 20, 21, 22, 23]);
        let deleted: Vec<usize> = collection.deletion().expect("Allocated").iter_ones().collect();
        assert_eq!(deleted, [4]);
        assert_eq!(engine.aggregate().selected, 8);

        collection.prepare_frame(&camera(), &RenderConfig::default());
        assert_eq!(collection.view_data().len(), 24);
        assert_eq!(collection.sorted_order().len(), 24);
        Ok(())
    }

    #[test]
    fn duplicate_rejects_lossy_color() -> anyhow::Result<()> {
        let splats = vec![Splat::default(); 4];
        let formats = FormatDescriptor::new(
            DataFormat::Float32,
            DataFormat::Float32,
            DataFormat::Float32,
            DataFormat::Norm8,
        )?;
        let asset = SplatAsset::encode(&splats, formats, false)?;
        let mut collection = SplatCollection::new(&asset, Mat4::IDENTITY);
        let mut engine = EditEngine::new();
        engine.select_all(&mut collection);

        let result = engine.duplicate_selected(&mut collection);
        assert!(matches!(result, Err(EditError::UnsupportedFormat { .. })));
        assert_eq!(collection.count(), 4);
        Ok(())
    }

    fn encoded_row(pos: DataFormat, other: DataFormat) -> anyhow::Result<SplatCollection> {
        let splats: Vec<Splat> = (0..4)
            .map(|i| Splat {
                pos: Vec3::new(i as f32, 0.0, 0.0),
                scale: Vec3::splat(0.1),
                ..Default::default()
            })
            .collect();
        let formats = FormatDescriptor::new(pos, other, DataFormat::Norm6, DataFormat::Norm8)?;
        let asset = SplatAsset::encode(&splats, formats, false)?;
        Ok(SplatCollection::new(&asset, Mat4::IDENTITY))
    }

    #[test]
    fn transforms_only_need_touched_groups() -> anyhow::Result<()> {
        let mut engine = EditEngine::new();

        // Quantized SH and color don't get in the way.
        let mut collection = encoded_row(DataFormat::Float32, DataFormat::Float32)?;
        engine.select_indices(&mut collection, &[1], true)?;
        assert!(engine.translate_selection(&mut collection, Vec3::Y));
        engine.store_position_snapshot(&mut collection);
        engine.store_other_snapshot(&mut collection);
        assert!(engine.scale_selection(&mut collection, Vec3::ZERO, Vec3::splat(2.0)));
        let storage = collection.storage().expect("Valid");
        assert_eq!(storage.position(1), Vec3::new(2.0, 2.0, 0.0));
        assert!((storage.rotation_scale(1).1 - Vec3::splat(0.2)).length() < 1e-6);
        engine.end_gesture();

        // Translation only touches positions.
        let mut collection = encoded_row(DataFormat::Float32, DataFormat::Norm11)?;
        engine.select_indices(&mut collection, &[2], true)?;
        assert!(engine.translate_selection(&mut collection, Vec3::Z));
        assert_eq!(collection.storage().expect("Valid").position(2), Vec3::new(2.0, 0.0, 1.0));

        let mut collection = encoded_row(DataFormat::Norm11, DataFormat::Float32)?;
        engine.select_indices(&mut collection, &[2], true)?;
        let before = collection.storage().expect("Valid").position(2);
        assert!(!engine.translate_selection(&mut collection, Vec3::Z));
        assert_eq!(collection.storage().expect("Valid").position(2), before);
        assert!(!collection.is_modified());
        Ok(())
    }

    #[test]
    fn translate_adds_up() {
        let mut collection = row(3, 1.0);
        let mut engine = EditEngine::new();
        engine.select_indices(&mut collection, &[0], true).expect("In range");
        assert!(engine.translate_selection(&mut collection, Vec3::Y));
        assert!(engine.translate_selection(&mut collection, Vec3::Y));
        let storage = collection.storage().expect("Valid");
        assert_eq!(storage.position(0), Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(storage.position(1), Vec3::ZERO);
        assert_approx_eq!(engine.aggregate().center().y, 2.0, 1e-6);
    }

    #[test]
    fn rotate_and_scale_use_snapshot() {
        let mut collection = row(3, 1.0);
        let mut engine = EditEngine::new();
        engine.select_indices(&mut collection, &[2], true).expect("In range");
        let spin = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);

        // No snapshot yet.
        assert!(!engine.rotate_selection(&mut collection, Vec3::ZERO, spin));

        engine.store_position_snapshot(&mut collection);
        engine.store_other_snapshot(&mut collection);
        for _ in 0..3 {
            assert!(engine.rotate_selection(&mut collection, Vec3::ZERO, spin));
        }
        let storage = collection.storage().expect("Valid");
        assert!((storage.position(2) - Vec3::Y).length() < 1e-5);
        let (rot, _) = storage.rotation_scale(2);
        assert!(rot.abs_diff_eq(spin, 1e-5) || rot.abs_diff_eq(-spin, 1e-5));

        // A fresh gesture, scaling away from the origin.
        engine.end_gesture();
        engine.store_position_snapshot(&mut collection);
        engine.store_other_snapshot(&mut collection);
        engine.scale_selection(&mut collection, Vec3::ZERO, Vec3::splat(2.0));
        engine.scale_selection(&mut collection, Vec3::ZERO, Vec3::splat(3.0));
        let storage = collection.storage().expect("Valid");
        assert!((storage.position(2) - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
        let (_, scale) = storage.rotation_scale(2);
        assert!((scale - Vec3::splat(0.15)).length() < 1e-5);
        assert_eq!(storage.position(0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn resize_checks_count() {
        let mut collection = row(10, 1.0);
        let mut engine = EditEngine::new();
        assert!(matches!(
            engine.resize(&mut collection, 0),
            Err(EditError::InvalidSplatCount(0))
        ));
        assert!(engine.resize(&mut collection, speck_render::MAX_SPLAT_COUNT + 1).is_err());
        assert_eq!(collection.count(), 10);

        engine.select_indices(&mut collection, &[9], true).expect("In range");
        engine.resize(&mut collection, 15).expect("Valid count");
        let storage = collection.storage().expect("Valid");
        assert_eq!(storage.count(), 15);
        assert_eq!(storage.position(9), Vec3::new(4.5, 0.0, 0.0));
        assert_eq!(storage.position(14), Vec3::ZERO);
        assert_eq!(selected(&collection), [9]);

        engine.resize(&mut collection, 5).expect("Valid count");
        assert_eq!(collection.count(), 5);
        assert!(selected(&collection).is_empty());
    }

    #[test]
    fn resize_rejects_chunked() -> anyhow::Result<()> {
        let splats = vec![Splat::default(); 300];
        let asset = SplatAsset::encode(&splats, FormatDescriptor::FULL_PRECISION, true)?;
        let mut collection = SplatCollection::new(&asset, Mat4::IDENTITY);
        let result = EditEngine::new().resize(&mut collection, 10);
        assert!(matches!(result, Err(EditError::UnsupportedFormat { chunked: true, .. })));
        assert_eq!(collection.count(), 300);
        Ok(())
    }
}
