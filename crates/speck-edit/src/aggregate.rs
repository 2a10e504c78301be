use glam::Vec3;
use speck_kernel::{AtomicBounds, AtomicBuffer};
use speck_render::EditParts;

/// Size of the bounds reported for a selection with (close to) zero extent.
pub const MIN_EXTENT: f32 = 0.1;
// Below this size on every axis the selection bounds count as degenerate.
const DEGENERATE_SIZE: f32 = 1e-5;

const SELECTED: usize = 0;
const DELETED: usize = 1;
const CUT: usize = 2;

/// Counts and selection bounds of a collection, in object space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditAggregate {
    pub selected: u32,
    pub deleted: u32,
    pub cut: u32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Default for EditAggregate {
    fn default() -> Self {
        Self::with_bounds(0, 0, 0, Vec3::ZERO, Vec3::ZERO)
    }
}

impl EditAggregate {
    fn with_bounds(selected: u32, deleted: u32, cut: u32, min: Vec3, max: Vec3) -> Self {
        let (bounds_min, bounds_max) = if (max - min).max_element() < DEGENERATE_SIZE {
            let center = (min + max) * 0.5;
            (center - MIN_EXTENT * 0.5, center + MIN_EXTENT * 0.5)
        } else {
            (min, max)
        };
        Self {
            selected,
            deleted,
            cut,
            bounds_min,
            bounds_max,
        }
    }

    pub fn has_selection(&self) -> bool {
        self.selected > 0
    }

    pub fn center(&self) -> Vec3 {
        (self.bounds_min + self.bounds_max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.bounds_max - self.bounds_min
    }
}

/// Drop the selection of deleted and cut splats, then count every state and
/// measure the selection.
pub fn recompute_aggregate(parts: &mut EditParts<'_>) -> EditAggregate {
    let _span =
        tracing::trace_span!("UpdateEditData", count = parts.storage.count()).entered();

    let counts = AtomicBuffer::zeros(3);
    let bounds = AtomicBounds::new();
    let storage = &*parts.storage;
    let deletion = &*parts.deletion;
    let cutouts = &parts.cutouts;

    parts.selection.par_update(|i, selected| {
        if deletion.get(i) {
            counts.fetch_add(DELETED, 1);
            return false;
        }
        let pos = storage.position(i);
        if cutouts.is_cut(pos) {
            counts.fetch_add(CUT, 1);
            return false;
        }
        if selected {
            counts.fetch_add(SELECTED, 1);
            bounds.include(pos.to_array());
        }
        selected
    });

    let (min, max) = bounds
        .read()
        .map_or((Vec3::ZERO, Vec3::ZERO), |(min, max)| {
            (Vec3::from_array(min), Vec3::from_array(max))
        });
    let counts = counts.into_vec();
    EditAggregate::with_bounds(counts[SELECTED], counts[DELETED], counts[CUT], min, max)
}
