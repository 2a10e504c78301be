use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use rayon::prelude::*;

use crate::asset::{AssetError, SplatAsset};
use crate::chunk::{ChunkInfo, chunk_count, chunk_index, compute_chunks};
use crate::codec::{
    decode_color, decode_other, decode_position, decode_sh, encode_color, encode_other,
    encode_position, encode_sh,
};
use crate::format::{CodecError, DataFormat, FormatDescriptor};
use crate::sh::SH_COEFFS;
use crate::splat::Splat;

/// Bytes backed by `u32` words, so the buffer can be viewed as any 4-byte
/// aligned POD element type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    words: Vec<u32>,
    len: usize,
}

impl ByteBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(4)],
            len,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.bytes_mut().copy_from_slice(bytes);
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u32, u8>(&self.words)[..self.len]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.words)[..self.len]
    }

    pub fn cast<T: Pod>(&self) -> &[T] {
        bytemuck::cast_slice(self.bytes())
    }

    pub fn cast_mut<T: Pod>(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(self.bytes_mut())
    }

    /// A buffer of `len` bytes holding the start of this one, zero filled past it.
    pub fn resized(&self, len: usize) -> Self {
        let mut buffer = Self::zeroed(len);
        let keep = len.min(self.len);
        buffer.bytes_mut()[..keep].copy_from_slice(&self.bytes()[..keep]);
        buffer
    }
}

/// Rotation (xyzw) and scale of a full precision "other" record.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RotationScale {
    pub rot: [f32; 4],
    pub scale: [f32; 3],
}

impl RotationScale {
    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rot)
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }
}

// Run `kernel` over the records `[start, start + count)` of a group buffer.
fn par_group_records(
    buffer: &mut ByteBuffer,
    stride: usize,
    start: usize,
    count: usize,
    kernel: impl Fn(usize, &mut [u8]) + Sync + Send,
) {
    buffer.bytes_mut()[start * stride..(start + count) * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(i, record)| kernel(start + i, record));
}

/// Encoded splat data: one buffer per attribute group plus the ranges the
/// normalized formats are relative to.
#[derive(Clone, Debug)]
pub struct SplatStorage {
    count: usize,
    formats: FormatDescriptor,
    pos: ByteBuffer,
    other: ByteBuffer,
    sh: ByteBuffer,
    color: ByteBuffer,
    chunks: Option<Vec<ChunkInfo>>,
    bounds: ChunkInfo,
}

impl SplatStorage {
    fn zeroed(
        count: usize,
        formats: FormatDescriptor,
        chunks: Option<Vec<ChunkInfo>>,
        bounds: ChunkInfo,
    ) -> Self {
        Self {
            count,
            formats,
            pos: ByteBuffer::zeroed(count * formats.pos_stride()),
            other: ByteBuffer::zeroed(count * formats.other_stride()),
            sh: ByteBuffer::zeroed(count * formats.sh_stride()),
            color: ByteBuffer::zeroed(count * formats.color_stride()),
            chunks,
            bounds,
        }
    }

    /// Encode canonical splats. With `chunked`, normalized formats use one range
    /// record per [`crate::chunk::CHUNK_SIZE`] splats, otherwise the bounds of all
    /// splats.
    pub fn encode(
        splats: &[Splat],
        formats: FormatDescriptor,
        chunked: bool,
    ) -> Result<Self, CodecError> {
        formats.validate()?;
        let _span = tracing::trace_span!("EncodeSplats", len = splats.len()).entered();

        let chunks = chunked.then(|| compute_chunks(splats));
        let bounds = ChunkInfo::from_splats(splats);
        let mut storage = Self::zeroed(splats.len(), formats, chunks, bounds);
        storage.write_splats(0, splats);
        Ok(storage)
    }

    /// Full precision storage without a chunk table, the layout edits work on.
    pub fn from_splats(splats: &[Splat]) -> Self {
        let bounds = ChunkInfo::from_splats(splats);
        let formats = FormatDescriptor::FULL_PRECISION;
        let mut storage = Self::zeroed(splats.len(), formats, None, bounds);
        storage.write_splats(0, splats);
        storage
    }

    pub fn from_asset(asset: &SplatAsset) -> Result<Self, AssetError> {
        let formats = asset.validate()?;
        let count = asset.count as usize;
        let group = |data: &[u8], stride: usize| ByteBuffer::from_bytes(&data[..count * stride]);
        Ok(Self {
            count,
            formats,
            pos: group(&asset.pos_data, formats.pos_stride()),
            other: group(&asset.other_data, formats.other_stride()),
            sh: group(&asset.sh_data, formats.sh_stride()),
            color: group(&asset.color_data, formats.color_stride()),
            chunks: asset.chunks.clone(),
            bounds: asset.bounds,
        })
    }

    pub fn into_asset(self) -> SplatAsset {
        SplatAsset {
            format_version: crate::asset::FORMAT_VERSION,
            count: self.count as u32,
            formats: self.formats.pack(),
            pos_data: self.pos.bytes().to_vec(),
            other_data: self.other.bytes().to_vec(),
            sh_data: self.sh.bytes().to_vec(),
            color_data: self.color.bytes().to_vec(),
            chunks: self.chunks,
            bounds: self.bounds,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn formats(&self) -> FormatDescriptor {
        self.formats
    }

    pub fn chunks(&self) -> Option<&[ChunkInfo]> {
        self.chunks.as_deref()
    }

    pub fn has_chunks(&self) -> bool {
        self.chunks.is_some()
    }

    /// Range record used when no chunk table is present.
    pub fn bounds(&self) -> &ChunkInfo {
        &self.bounds
    }

    /// Every group is plain 32-bit floats and there's no chunk table, so splats
    /// can be edited in place.
    pub fn is_full_precision(&self) -> bool {
        self.formats.is_full_precision() && !self.has_chunks()
    }

    pub fn chunk_for(&self, index: usize) -> &ChunkInfo {
        match &self.chunks {
            Some(chunks) => &chunks[chunk_index(index)],
            None => &self.bounds,
        }
    }

    fn record(buffer: &ByteBuffer, stride: usize, index: usize) -> &[u8] {
        &buffer.bytes()[index * stride..(index + 1) * stride]
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let raw = Self::record(&self.pos, self.formats.pos_stride(), index);
        decode_position(raw, self.formats.pos, Some(self.chunk_for(index)))
    }

    pub fn rotation_scale(&self, index: usize) -> (Quat, Vec3) {
        let raw = Self::record(&self.other, self.formats.other_stride(), index);
        decode_other(raw, self.formats.other, Some(self.chunk_for(index)))
    }

    /// Fill the higher order coefficients `sh[1..]`.
    pub fn sh(&self, index: usize, sh: &mut [Vec3; SH_COEFFS]) {
        let raw = Self::record(&self.sh, self.formats.sh_stride(), index);
        decode_sh(raw, self.formats.sh, Some(self.chunk_for(index)), sh);
    }

    /// DC term and opacity.
    pub fn dc_opacity(&self, index: usize) -> (Vec3, f32) {
        let raw = Self::record(&self.color, self.formats.color_stride(), index);
        decode_color(raw, self.formats.color, Some(self.chunk_for(index)))
    }

    pub fn decode_splat(&self, index: usize) -> Splat {
        let (rot, scale) = self.rotation_scale(index);
        let mut splat = Splat {
            pos: self.position(index),
            rot,
            scale,
            ..Default::default()
        };
        self.sh(index, &mut splat.sh);
        (splat.sh[0], splat.opacity) = self.dc_opacity(index);
        splat
    }

    pub fn read_splats(&self) -> Vec<Splat> {
        let _span = tracing::trace_span!("ReadSplats", len = self.count).entered();
        (0..self.count)
            .into_par_iter()
            .map(|i| self.decode_splat(i))
            .collect()
    }

    pub fn encode_splat(&mut self, index: usize, splat: &Splat) {
        self.write_splats(index, std::slice::from_ref(splat));
    }

    /// Encode `splats` into the slots starting at `start`.
    pub fn write_splats(&mut self, start: usize, splats: &[Splat]) {
        assert!(
            start + splats.len() <= self.count,
            "Writing {} splats at {start} overflows storage of {}",
            splats.len(),
            self.count
        );
        let formats = self.formats;
        let chunks = self.chunks.as_deref();
        let bounds = &self.bounds;
        let chunk_for = |i: usize| Some(chunks.map_or(bounds, |c| &c[chunk_index(i)]));
        let count = splats.len();

        par_group_records(&mut self.pos, formats.pos_stride(), start, count, |i, out| {
            encode_position(splats[i - start].pos, formats.pos, chunk_for(i), out);
        });
        par_group_records(&mut self.other, formats.other_stride(), start, count, |i, out| {
            let s = &splats[i - start];
            encode_other(s.rot, s.scale, formats.other, chunk_for(i), out);
        });
        par_group_records(&mut self.sh, formats.sh_stride(), start, count, |i, out| {
            encode_sh(&splats[i - start].sh, formats.sh, chunk_for(i), out);
        });
        par_group_records(&mut self.color, formats.color_stride(), start, count, |i, out| {
            let s = &splats[i - start];
            encode_color(s.sh[0], s.opacity, formats.color, chunk_for(i), out);
        });
    }

    /// Positions as plain floats, if stored that way.
    pub fn positions(&self) -> Option<&[[f32; 3]]> {
        (self.formats.pos == DataFormat::Float32).then(|| self.pos.cast())
    }

    pub fn positions_mut(&mut self) -> Option<&mut [[f32; 3]]> {
        (self.formats.pos == DataFormat::Float32).then(|| self.pos.cast_mut())
    }

    pub fn rotation_scales(&self) -> Option<&[RotationScale]> {
        (self.formats.other == DataFormat::Float32).then(|| self.other.cast())
    }

    pub fn rotation_scales_mut(&mut self) -> Option<&mut [RotationScale]> {
        (self.formats.other == DataFormat::Float32).then(|| self.other.cast_mut())
    }

    /// New storage holding `count` splats: the first `min(old, new)` are copied
    /// byte for byte, the rest are zeroed.
    pub fn with_count(&self, count: usize) -> Self {
        let _span = tracing::trace_span!("ResizeStorage", from = self.count, to = count).entered();
        let chunks = self.chunks.as_ref().map(|chunks| {
            let mut chunks = chunks.clone();
            chunks.resize(chunk_count(count), self.bounds);
            chunks
        });
        Self {
            count,
            formats: self.formats,
            pos: self.pos.resized(count * self.formats.pos_stride()),
            other: self.other.resized(count * self.formats.other_stride()),
            sh: self.sh.resized(count * self.formats.sh_stride()),
            color: self.color.resized(count * self.formats.color_stride()),
            chunks,
            bounds: self.bounds,
        }
    }

    /// New storage with a byte copy of every splat in `sources` appended after
    /// the existing ones.
    pub fn append_copies(&self, sources: &[u32]) -> Self {
        let old_count = self.count;
        let mut grown = self.with_count(old_count + sources.len());
        let copy_group = |dst: &mut ByteBuffer, src: &ByteBuffer, stride: usize| {
            let src = src.bytes();
            par_group_records(dst, stride, old_count, sources.len(), |i, out| {
                let from = sources[i - old_count] as usize;
                out.copy_from_slice(&src[from * stride..(from + 1) * stride]);
            });
        };
        copy_group(&mut grown.pos, &self.pos, self.formats.pos_stride());
        copy_group(&mut grown.other, &self.other, self.formats.other_stride());
        copy_group(&mut grown.sh, &self.sh, self.formats.sh_stride());
        copy_group(&mut grown.color, &self.color, self.formats.color_stride());
        grown
    }

    /// Copy the raw records of `count` splats from `src` into `self`, both
    /// storages must share a layout.
    pub fn copy_raw_from(
        &mut self,
        source: &Self,
        src_start: usize,
        dst_start: usize,
        count: usize,
    ) {
        assert_eq!(self.formats, source.formats, "Raw copies need matching formats");
        let formats = self.formats;
        for (dst, src, stride) in [
            (&mut self.pos, &source.pos, formats.pos_stride()),
            (&mut self.other, &source.other, formats.other_stride()),
            (&mut self.sh, &source.sh, formats.sh_stride()),
            (&mut self.color, &source.color, formats.color_stride()),
        ] {
            dst.bytes_mut()[dst_start * stride..(dst_start + count) * stride]
                .copy_from_slice(&src.bytes()[src_start * stride..(src_start + count) * stride]);
        }
    }

    /// Number of chunk records covering this storage, zero without a table.
    pub fn chunk_count(&self) -> usize {
        self.chunks.as_ref().map_or(0, |c| c.len())
    }
}
