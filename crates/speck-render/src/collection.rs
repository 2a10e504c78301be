use glam::Mat4;

use crate::asset::SplatAsset;
use crate::bitset::{DeletionBits, SelectionBits};
use crate::camera::CameraParams;
use crate::config::RenderConfig;
use crate::cutout::{Cutout, ObjectCutouts};
use crate::project::{ProjectUniforms, ViewRecord, calc_view_data};
use crate::render_mode::{DrawCommand, RenderMode};
use crate::sort::DepthSorter;
use crate::splat::Splat;
use crate::storage::SplatStorage;

/// Everything an edit needs mutable access to, borrowed from one collection.
pub struct EditParts<'a> {
    pub storage: &'a mut SplatStorage,
    pub selection: &'a mut SelectionBits,
    pub deletion: &'a mut DeletionBits,
    pub cutouts: ObjectCutouts,
    pub object_to_world: Mat4,
}

/// Replacement buffers for a collection whose splat count changes. Built off
/// to the side, then swapped in with [`SplatCollection::commit_staged`].
#[derive(Clone, Debug)]
pub struct StagedSplats {
    pub storage: SplatStorage,
    pub selection: SelectionBits,
    pub deletion: DeletionBits,
}

/// One renderable and editable set of splats with its own transform.
#[derive(Debug)]
pub struct SplatCollection {
    storage: Option<SplatStorage>,
    selection: Option<SelectionBits>,
    deletion: Option<DeletionBits>,
    staged: Option<StagedSplats>,
    sorter: DepthSorter,
    view_data: Vec<ViewRecord>,
    draw: Option<DrawCommand>,
    modified: bool,

    pub object_to_world: Mat4,
    pub cutouts: Vec<Cutout>,
    pub active: bool,
    /// Overrides the render mode of the render config.
    pub render_mode: Option<RenderMode>,
}

impl SplatCollection {
    /// Load an asset. An invalid asset gives a collection that stays invalid,
    /// and is skipped by rendering and editing.
    pub fn new(asset: &SplatAsset, object_to_world: Mat4) -> Self {
        let storage = match SplatStorage::from_asset(asset) {
            Ok(storage) => Some(storage),
            Err(e) => {
                tracing::warn!("Invalid splat asset: {e}");
                None
            }
        };
        Self::from_storage(storage, object_to_world)
    }

    pub fn from_splats(splats: &[Splat], object_to_world: Mat4) -> Self {
        Self::from_storage(Some(SplatStorage::from_splats(splats)), object_to_world)
    }

    fn from_storage(storage: Option<SplatStorage>, object_to_world: Mat4) -> Self {
        Self {
            storage,
            selection: None,
            deletion: None,
            staged: None,
            sorter: DepthSorter::new(),
            view_data: Vec::new(),
            draw: None,
            modified: false,
            object_to_world,
            cutouts: Vec::new(),
            active: true,
            render_mode: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.storage.is_some()
    }

    pub fn count(&self) -> usize {
        self.storage.as_ref().map_or(0, SplatStorage::count)
    }

    pub fn storage(&self) -> Option<&SplatStorage> {
        self.storage.as_ref()
    }

    pub fn selection(&self) -> Option<&SelectionBits> {
        self.selection.as_ref()
    }

    pub fn deletion(&self) -> Option<&DeletionBits> {
        self.deletion.as_ref()
    }

    pub fn object_cutouts(&self) -> ObjectCutouts {
        ObjectCutouts::new(&self.cutouts, self.object_to_world)
    }

    /// Mutable access for edits. Allocates the selection and deletion bits on
    /// first use. `None` for invalid collections.
    pub fn edit_parts(&mut self) -> Option<EditParts<'_>> {
        let cutouts = self.object_cutouts();
        let storage = self.storage.as_mut()?;
        let count = storage.count();
        Some(EditParts {
            selection: self.selection.get_or_insert_with(|| SelectionBits::new(count)),
            deletion: self.deletion.get_or_insert_with(|| DeletionBits::new(count)),
            storage,
            cutouts,
            object_to_world: self.object_to_world,
        })
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Positions changed, sort again on the next frame.
    pub fn invalidate_order(&mut self) {
        self.sorter.invalidate();
    }

    pub fn stage(&mut self, staged: StagedSplats) {
        assert_eq!(staged.storage.count(), staged.selection.len(), "Staged selection size");
        assert_eq!(staged.storage.count(), staged.deletion.len(), "Staged deletion size");
        self.staged = Some(staged);
    }

    /// Swap in the staged buffers. Everything derived from the old splat count
    /// is dropped in the same step. Returns false when nothing was staged.
    pub fn commit_staged(&mut self) -> bool {
        let Some(staged) = self.staged.take() else {
            return false;
        };
        tracing::debug!(
            "Swapping in {} staged splats, replacing {}",
            staged.storage.count(),
            self.count()
        );
        self.storage = Some(staged.storage);
        self.selection = Some(staged.selection);
        self.deletion = Some(staged.deletion);
        self.sorter = DepthSorter::new();
        self.view_data = Vec::new();
        self.draw = None;
        self.modified = true;
        true
    }

    /// Sort and project for this frame, as far as the render mode needs.
    pub fn prepare_frame(&mut self, camera: &CameraParams, config: &RenderConfig) {
        self.draw = None;
        if !self.active {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };

        let mode = self.render_mode.unwrap_or(config.render_mode);
        let strategy = mode.strategy();

        if strategy.needs_sorted_order {
            let model_view = camera.view * self.object_to_world;
            self.sorter
                .update(storage, model_view, config.sort_every_n_frames.max(1));
        }

        if strategy.needs_view_data {
            let uniforms = ProjectUniforms::new(camera, self.object_to_world, config);
            let cutouts = self.object_cutouts();
            self.view_data = calc_view_data(storage, self.deletion.as_ref(), &cutouts, &uniforms);
        } else {
            self.view_data.clear();
        }

        // Without a chunk table the global bounds are drawn as a single chunk.
        let chunk_count = storage.chunk_count().max(1) as u32;
        self.draw = Some(strategy.draw_command(mode, storage.count() as u32, chunk_count));
    }

    /// Results of the last [`Self::prepare_frame`].
    pub fn frame_output(&self, index: usize) -> Option<FrameOutput<'_>> {
        let draw = self.draw?;
        let order = if draw.mode.strategy().needs_sorted_order {
            self.sorter.order()
        } else {
            &[]
        };
        Some(FrameOutput {
            collection: index,
            object_to_world: self.object_to_world,
            draw,
            view_data: &self.view_data,
            order,
        })
    }

    pub fn view_data(&self) -> &[ViewRecord] {
        &self.view_data
    }

    pub fn sorted_order(&self) -> &[u32] {
        self.sorter.order()
    }
}

/// What the rasterizer needs to draw one collection.
#[derive(Clone, Copy, Debug)]
pub struct FrameOutput<'a> {
    /// Index of the collection in the render system.
    pub collection: usize,
    pub object_to_world: Mat4,
    pub draw: DrawCommand,
    pub view_data: &'a [ViewRecord],
    /// Splat indices back to front, empty when the mode draws unsorted.
    pub order: &'a [u32],
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use super::{SplatCollection, StagedSplats};
    use crate::asset::{FORMAT_VERSION, SplatAsset};
    use crate::bitset::{DeletionBits, SelectionBits};
    use crate::camera::CameraParams;
    use crate::config::RenderConfig;
    use crate::format::FormatDescriptor;
    use crate::render_mode::RenderMode;
    use crate::splat::Splat;
    use glam::{Mat4, UVec2, Vec3};

    fn splats(n: usize) -> Vec<Splat> {
        (0..n)
            .map(|i| Splat {
                pos: Vec3::new(i as f32 * 0.1, 0.0, 0.0),
                scale: Vec3::splat(0.05),
                ..Default::default()
            })
            .collect()
    }

    fn camera() -> CameraParams {
        CameraParams::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            1.0,
            UVec2::new(256, 256),
        )
    }

    #[test]
    fn invalid_asset_is_skipped() -> anyhow::Result<()> {
        let mut asset = SplatAsset::encode(&splats(4), FormatDescriptor::FULL_PRECISION, false)?;
        asset.format_version = FORMAT_VERSION + 1;
        let mut collection = SplatCollection::new(&asset, Mat4::IDENTITY);
        assert!(!collection.is_valid());
        assert!(collection.edit_parts().is_none());
        collection.prepare_frame(&camera(), &RenderConfig::default());
        assert!(collection.frame_output(0).is_none());
        Ok(())
    }

    #[test]
    fn bits_allocated_lazily() {
        let mut collection = SplatCollection::from_splats(&splats(40), Mat4::IDENTITY);
        assert!(collection.selection().is_none());
        let parts = collection.edit_parts().expect("Valid collection");
        assert_eq!(parts.selection.len(), 40);
        assert_eq!(parts.deletion.len(), 40);
        assert!(collection.selection().is_some());
    }

    #[test]
    fn prepare_follows_render_mode() {
        let mut collection = SplatCollection::from_splats(&splats(10), Mat4::IDENTITY);
        let config = RenderConfig::default();
        collection.prepare_frame(&camera(), &config);
        let output = collection.frame_output(0).expect("Prepared");
        assert_eq!(output.view_data.len(), 10);
        assert_eq!(output.order.len(), 10);
        assert_eq!(output.draw.instance_count, 10);

        collection.render_mode = Some(RenderMode::DebugChunkBounds);
        collection.prepare_frame(&camera(), &config);
        let output = collection.frame_output(0).expect("Prepared");
        assert!(output.view_data.is_empty());
        assert!(output.order.is_empty());
        assert_eq!(output.draw.instance_count, 1);
        assert_eq!(output.draw.vertex_count, 36);
    }

    #[test]
    fn commit_swaps_everything() {
        let mut collection = SplatCollection::from_splats(&splats(10), Mat4::IDENTITY);
        collection.prepare_frame(&camera(), &RenderConfig::default());
        assert!(!collection.commit_staged());

        let storage = collection.storage().expect("Valid").with_count(25);
        collection.stage(StagedSplats {
            storage,
            selection: SelectionBits::new(25),
            deletion: DeletionBits::new(25),
        });
        assert_eq!(collection.count(), 10);
        assert!(collection.commit_staged());
        assert_eq!(collection.count(), 25);
        assert!(collection.is_modified());
        assert!(collection.frame_output(0).is_none());

        collection.prepare_frame(&camera(), &RenderConfig::default());
        let output = collection.frame_output(0).expect("Prepared");
        assert_eq!(output.view_data.len(), 25);
        assert_eq!(output.order.len(), 25);
    }
}
