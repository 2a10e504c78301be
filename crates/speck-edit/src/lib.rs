pub mod aggregate;
pub mod copy;
pub mod engine;
pub mod error;
pub mod export;
pub mod state;
pub mod transform;

pub use aggregate::{EditAggregate, MIN_EXTENT};
pub use copy::copy_splats;
pub use engine::EditEngine;
pub use error::EditError;
pub use export::{ExportSplat, export_splats, ply_header};
pub use state::SplatState;
pub use transform::SplatTransform;
