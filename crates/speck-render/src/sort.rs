use glam::Mat4;
use speck_kernel::{create_buffer, dispatch_1d, float_to_sortable_uint};
use speck_sort::radix_argsort;

use crate::storage::SplatStorage;

/// Sortable view space depth of every splat. Ascending keys go from the
/// farthest splat to the nearest for a camera looking down -Z.
pub fn calc_distances(storage: &SplatStorage, model_view: Mat4) -> Vec<u32> {
    let mut keys = create_buffer::<u32>(storage.count());
    dispatch_1d("CalcDistances", &mut keys, |i, key| {
        let depth = model_view.transform_point3(storage.position(i)).z;
        *key = float_to_sortable_uint(depth);
    });
    keys
}

/// Back to front ordering of a collection, refreshed every few frames.
#[derive(Debug, Default)]
pub struct DepthSorter {
    keys: Vec<u32>,
    order: Vec<u32>,
    frames_since_sort: Option<u32>,
}

impl DepthSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next frame has to sort, given how often sorting runs.
    pub fn sort_due(&self, sort_every_n_frames: u32) -> bool {
        match self.frames_since_sort {
            None => true,
            Some(frames) => frames + 1 >= sort_every_n_frames,
        }
    }

    /// Force a sort on the next frame.
    pub fn invalidate(&mut self) {
        self.frames_since_sort = None;
    }

    /// Throw away working buffers sized for another splat count.
    pub fn ensure_count(&mut self, count: usize) {
        if self.order.len() != count {
            self.keys = create_buffer(count);
            self.order = create_buffer(count);
            self.frames_since_sort = None;
        }
    }

    /// Sort if due, otherwise keep the previous order. Returns whether a sort ran.
    pub fn update(
        &mut self,
        storage: &SplatStorage,
        model_view: Mat4,
        sort_every_n_frames: u32,
    ) -> bool {
        self.ensure_count(storage.count());

        if !self.sort_due(sort_every_n_frames) {
            self.frames_since_sort = self.frames_since_sort.map(|f| f + 1);
            tracing::debug!("Reusing previous splat order");
            return false;
        }

        let _span = tracing::trace_span!("SortSplats", count = storage.count()).entered();
        self.keys = calc_distances(storage, model_view);
        let indices: Vec<u32> = (0..storage.count() as u32).collect();
        let (sorted_keys, order) = radix_argsort(std::mem::take(&mut self.keys), indices, 32);
        self.keys = sorted_keys;
        self.order = order;
        self.frames_since_sort = Some(0);
        true
    }

    /// Splat indices back to front.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Sorted keys matching [`Self::order`].
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }
}
