use crate::camera::CameraParams;
use crate::collection::{FrameOutput, SplatCollection};
use crate::config::RenderConfig;

/// Owns every splat collection in a scene and prepares them for drawing.
#[derive(Debug, Default)]
pub struct SplatRenderSystem {
    collections: Vec<SplatCollection>,
    pub config: RenderConfig,
}

impl SplatRenderSystem {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            collections: Vec::new(),
            config,
        }
    }

    /// Add a collection, returning its index.
    pub fn add(&mut self, collection: SplatCollection) -> usize {
        self.collections.push(collection);
        self.collections.len() - 1
    }

    /// Remove a collection. Later collections shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<SplatCollection> {
        (index < self.collections.len()).then(|| self.collections.remove(index))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn collection(&self, index: usize) -> Option<&SplatCollection> {
        self.collections.get(index)
    }

    pub fn collection_mut(&mut self, index: usize) -> Option<&mut SplatCollection> {
        self.collections.get_mut(index)
    }

    /// Two different collections at once, eg. to copy splats between them.
    pub fn collection_pair_mut(
        &mut self,
        first: usize,
        second: usize,
    ) -> Option<(&mut SplatCollection, &mut SplatCollection)> {
        let [a, b] = self.collections.get_disjoint_mut([first, second]).ok()?;
        Some((a, b))
    }

    pub fn collections(&self) -> &[SplatCollection] {
        &self.collections
    }

    /// Sort and project every active, valid collection for this camera.
    ///
    /// Outputs are ordered back to front by the distance of each collection's
    /// origin to the camera.
    pub fn render_frame(&mut self, camera: &CameraParams) -> Vec<FrameOutput<'_>> {
        let _span = tracing::trace_span!("RenderFrame", collections = self.collections.len())
            .entered();

        let mut draw_order: Vec<(usize, f32)> = self
            .collections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active && c.is_valid())
            .map(|(i, c)| {
                let origin = c.object_to_world.w_axis.truncate();
                (i, origin.distance_squared(camera.position))
            })
            .collect();
        draw_order.sort_by(|a, b| b.1.total_cmp(&a.1));

        for &(i, _) in &draw_order {
            self.collections[i].prepare_frame(camera, &self.config);
        }

        draw_order
            .iter()
            .filter_map(|&(i, _)| self.collections[i].frame_output(i))
            .collect()
    }
}
