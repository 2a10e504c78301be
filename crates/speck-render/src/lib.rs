//! Storage, sorting and projection of gaussian splat collections.
//!
//! Splats live in byte buffers with a per group format. Every frame they are
//! sorted back to front and projected to screen space ellipses, ready for an
//! external rasterizer.

pub mod asset;
pub mod bitset;
pub mod camera;
pub mod chunk;
pub mod collection;
pub mod config;
pub mod cutout;
pub mod format;
pub mod project;
pub mod quant;
pub mod render_mode;
pub mod sh;
pub mod sort;
pub mod splat;
pub mod storage;
pub mod system;

mod codec;

pub use codec::{RawSplat, decode_splat, encode_splat};

pub use asset::{AssetError, MAX_SPLAT_COUNT, SplatAsset};
pub use camera::CameraParams;
pub use collection::{EditParts, FrameOutput, SplatCollection, StagedSplats};
pub use config::RenderConfig;
pub use project::ViewRecord;
pub use render_mode::{DrawCommand, RenderMode};
pub use splat::Splat;
pub use storage::SplatStorage;
pub use system::SplatRenderSystem;

#[cfg(all(test, not(target_family = "wasm")))]
mod tests;
