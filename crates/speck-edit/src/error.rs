use speck_render::MAX_SPLAT_COUNT;
use speck_render::format::FormatDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Invalid splat count {0}, must be between 1 and {MAX_SPLAT_COUNT}")]
    InvalidSplatCount(usize),
    #[error("{operation} is not supported for {formats:?} storage (chunked: {chunked})")]
    UnsupportedFormat {
        operation: &'static str,
        formats: FormatDescriptor,
        chunked: bool,
    },
    #[error("Collection has no valid splat data")]
    InvalidAsset,
    #[error("Splat range {start}..{end} is out of bounds for {count} splats")]
    InvalidRange { start: usize, end: usize, count: usize },
}
