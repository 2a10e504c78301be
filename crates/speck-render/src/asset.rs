use crate::chunk::{ChunkInfo, chunk_count};
use crate::format::{CodecError, FormatDescriptor};
use crate::splat::Splat;
use crate::storage::SplatStorage;

/// Version of the binary layouts. Assets with any other version are rejected.
pub const FORMAT_VERSION: u32 = 1;

/// Largest number of splats a single collection may hold.
pub const MAX_SPLAT_COUNT: usize = 8_600_000;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset format version {found} is not the supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("Asset contains no splats")]
    Empty,
    #[error("Asset contains {0} splats, more than the maximum of {MAX_SPLAT_COUNT}")]
    TooManySplats(usize),
    #[error("Invalid asset formats: {0}")]
    Formats(#[from] CodecError),
    #[error("{group} buffer is {found} bytes, expected {expected}")]
    MissingData {
        group: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Chunk table has {found} entries, expected {expected}")]
    ChunkCount { expected: usize, found: usize },
}

/// An encoded splat asset as handed over by asset loading.
#[derive(Clone, Debug)]
pub struct SplatAsset {
    pub format_version: u32,
    pub count: u32,
    /// Packed [`FormatDescriptor`].
    pub formats: u32,
    pub pos_data: Vec<u8>,
    pub other_data: Vec<u8>,
    pub sh_data: Vec<u8>,
    pub color_data: Vec<u8>,
    pub chunks: Option<Vec<ChunkInfo>>,
    /// Ranges of the whole asset, used by normalized formats without a chunk table.
    pub bounds: ChunkInfo,
}

impl SplatAsset {
    pub fn encode(
        splats: &[Splat],
        formats: FormatDescriptor,
        chunked: bool,
    ) -> Result<Self, AssetError> {
        if splats.is_empty() {
            return Err(AssetError::Empty);
        }
        Ok(SplatStorage::encode(splats, formats, chunked)?.into_asset())
    }

    /// Check the asset can be used as is, returning its unpacked formats.
    pub fn validate(&self) -> Result<FormatDescriptor, AssetError> {
        if self.format_version != FORMAT_VERSION {
            return Err(AssetError::VersionMismatch {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let count = self.count as usize;
        if count == 0 {
            return Err(AssetError::Empty);
        }
        if count > MAX_SPLAT_COUNT {
            return Err(AssetError::TooManySplats(count));
        }

        let formats = FormatDescriptor::unpack(self.formats)?;
        for (group, data, stride) in [
            ("Position", &self.pos_data, formats.pos_stride()),
            ("Other", &self.other_data, formats.other_stride()),
            ("SH", &self.sh_data, formats.sh_stride()),
            ("Color", &self.color_data, formats.color_stride()),
        ] {
            if data.len() < count * stride {
                return Err(AssetError::MissingData {
                    group,
                    expected: count * stride,
                    found: data.len(),
                });
            }
        }

        if let Some(chunks) = &self.chunks
            && chunks.len() != chunk_count(count)
        {
            return Err(AssetError::ChunkCount {
                expected: chunk_count(count),
                found: chunks.len(),
            });
        }
        Ok(formats)
    }
}
