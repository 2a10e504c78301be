use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(
    Default, ValueEnum, Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Sorted, alpha blended gaussians.
    #[default]
    Splats,
    /// One small quad per splat center.
    DebugPoints,
    /// Like points, colored by splat index.
    DebugPointIndices,
    /// An oriented box per splat.
    DebugBoxes,
    /// One box per quantization chunk.
    DebugChunkBounds,
}

/// How a render mode turns into draw calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderStrategy {
    pub vertices_per_instance: u32,
    /// Instances are splats, or chunks when false.
    pub per_splat: bool,
    pub needs_sorted_order: bool,
    pub needs_view_data: bool,
}

const QUAD: u32 = 6;
const BOX: u32 = 36;

impl RenderMode {
    pub fn strategy(self) -> RenderStrategy {
        match self {
            Self::Splats => RenderStrategy {
                vertices_per_instance: QUAD,
                per_splat: true,
                needs_sorted_order: true,
                needs_view_data: true,
            },
            Self::DebugPoints | Self::DebugPointIndices => RenderStrategy {
                vertices_per_instance: QUAD,
                per_splat: true,
                needs_sorted_order: false,
                needs_view_data: false,
            },
            Self::DebugBoxes => RenderStrategy {
                vertices_per_instance: BOX,
                per_splat: true,
                needs_sorted_order: true,
                needs_view_data: false,
            },
            Self::DebugChunkBounds => RenderStrategy {
                vertices_per_instance: BOX,
                per_splat: false,
                needs_sorted_order: false,
                needs_view_data: false,
            },
        }
    }
}

/// A single instanced draw, handed to the external rasterizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub mode: RenderMode,
    pub vertex_count: u32,
    pub instance_count: u32,
}

impl RenderStrategy {
    pub fn draw_command(&self, mode: RenderMode, splat_count: u32, chunk_count: u32) -> DrawCommand {
        let instance_count = if self.per_splat {
            splat_count
        } else {
            chunk_count
        };
        DrawCommand {
            mode,
            vertex_count: self.vertices_per_instance,
            instance_count,
        }
    }
}
