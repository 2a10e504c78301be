use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rayon::prelude::*;

use crate::splat::Splat;

/// Number of consecutive splats sharing one chunk record.
pub const CHUNK_SIZE: usize = 256;

/// Value ranges for a block of splats. Normalized formats store each value
/// relative to these ranges.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ChunkInfo {
    pub pos_min: [f32; 3],
    pub pos_max: [f32; 3],
    pub scale_min: [f32; 3],
    pub scale_max: [f32; 3],
    pub sh_min: [f32; 3],
    pub sh_max: [f32; 3],
    pub col_min: [f32; 4],
    pub col_max: [f32; 4],
}

impl Default for ChunkInfo {
    fn default() -> Self {
        Self::UNIT
    }
}

impl ChunkInfo {
    /// Identity ranges: normalized values decode to themselves.
    pub const UNIT: Self = Self {
        pos_min: [0.0; 3],
        pos_max: [1.0; 3],
        scale_min: [0.0; 3],
        scale_max: [1.0; 3],
        sh_min: [0.0; 3],
        sh_max: [1.0; 3],
        col_min: [0.0; 4],
        col_max: [1.0; 4],
    };

    /// Tight ranges over a set of splats.
    pub fn from_splats(splats: &[Splat]) -> Self {
        if splats.is_empty() {
            return Self::UNIT;
        }

        let mut pos = (Vec3::INFINITY, Vec3::NEG_INFINITY);
        let mut scale = (Vec3::INFINITY, Vec3::NEG_INFINITY);
        let mut sh = (Vec3::INFINITY, Vec3::NEG_INFINITY);
        let mut col = (Vec4::INFINITY, Vec4::NEG_INFINITY);

        for splat in splats {
            pos = (pos.0.min(splat.pos), pos.1.max(splat.pos));
            scale = (scale.0.min(splat.scale), scale.1.max(splat.scale));
            for c in &splat.sh[1..] {
                sh = (sh.0.min(*c), sh.1.max(*c));
            }
            let color = splat.color();
            col = (col.0.min(color), col.1.max(color));
        }

        Self {
            pos_min: pos.0.to_array(),
            pos_max: pos.1.to_array(),
            scale_min: scale.0.to_array(),
            scale_max: scale.1.to_array(),
            sh_min: sh.0.to_array(),
            sh_max: sh.1.to_array(),
            col_min: col.0.to_array(),
            col_max: col.1.to_array(),
        }
    }

    pub fn pos_range(&self) -> (Vec3, Vec3) {
        (self.pos_min.into(), self.pos_max.into())
    }

    pub fn scale_range(&self) -> (Vec3, Vec3) {
        (self.scale_min.into(), self.scale_max.into())
    }

    pub fn sh_range(&self) -> (Vec3, Vec3) {
        (self.sh_min.into(), self.sh_max.into())
    }

    pub fn col_range(&self) -> (Vec4, Vec4) {
        (self.col_min.into(), self.col_max.into())
    }
}

pub fn chunk_count(num_splats: usize) -> usize {
    num_splats.div_ceil(CHUNK_SIZE)
}

pub fn chunk_index(splat_index: usize) -> usize {
    splat_index / CHUNK_SIZE
}

/// One chunk record per `CHUNK_SIZE` splats.
pub fn compute_chunks(splats: &[Splat]) -> Vec<ChunkInfo> {
    let _span = tracing::trace_span!("ComputeChunks", len = splats.len()).entered();
    splats
        .par_chunks(CHUNK_SIZE)
        .map(ChunkInfo::from_splats)
        .collect()
}

/// Map `value` into `[0, 1]` over `[min, max]`. Empty ranges map to 0.
pub(crate) fn normalize3(value: Vec3, (min, max): (Vec3, Vec3)) -> Vec3 {
    let extent = max - min;
    let valid = extent.cmpgt(Vec3::splat(1e-20));
    let safe = Vec3::select(valid, extent, Vec3::ONE);
    Vec3::select(valid, (value - min) / safe, Vec3::ZERO)
}

pub(crate) fn denormalize3(value: Vec3, (min, max): (Vec3, Vec3)) -> Vec3 {
    min + (max - min) * value
}

pub(crate) fn normalize4(value: Vec4, (min, max): (Vec4, Vec4)) -> Vec4 {
    let extent = max - min;
    let valid = extent.cmpgt(Vec4::splat(1e-20));
    let safe = Vec4::select(valid, extent, Vec4::ONE);
    Vec4::select(valid, (value - min) / safe, Vec4::ZERO)
}

pub(crate) fn denormalize4(value: Vec4, (min, max): (Vec4, Vec4)) -> Vec4 {
    min + (max - min) * value
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use super::{CHUNK_SIZE, ChunkInfo, chunk_count, compute_chunks, normalize3};
    use crate::splat::Splat;
    use glam::{Quat, Vec3};

    #[test]
    fn chunk_bounds_cover_block() {
        let splats: Vec<Splat> = (0..CHUNK_SIZE + 10)
            .map(|i| {
                Splat::from_color(
                    Vec3::new(i as f32, -(i as f32), 1.0),
                    Quat::IDENTITY,
                    Vec3::splat(0.1 + i as f32 * 0.01),
                    Vec3::splat(0.5),
                    0.5,
                )
            })
            .collect();

        let chunks = compute_chunks(&splats);
        assert_eq!(chunks.len(), chunk_count(splats.len()));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].pos_min, [0.0, -255.0, 1.0]);
        assert_eq!(chunks[0].pos_max, [255.0, 0.0, 1.0]);
        assert_eq!(chunks[1].pos_min, [256.0, -265.0, 1.0]);
    }

    #[test]
    fn empty_range_normalizes_to_zero() {
        let v = normalize3(Vec3::splat(3.0), (Vec3::splat(3.0), Vec3::splat(3.0)));
        assert_eq!(v, Vec3::ZERO);
        assert_eq!(ChunkInfo::from_splats(&[]), ChunkInfo::UNIT);
    }
}
