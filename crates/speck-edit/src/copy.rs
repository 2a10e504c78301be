use bytemuck::bytes_of;
use rayon::prelude::*;
use speck_render::{Splat, SplatCollection, SplatStorage};

use crate::error::EditError;
use crate::transform::SplatTransform;

fn check_range(start: usize, count: usize, len: usize) -> Result<(), EditError> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(EditError::InvalidRange {
            start,
            end: start.saturating_add(count),
            count: len,
        }),
    }
}

// Records decode to the same values in both storages.
fn same_encoding(a: &SplatStorage, b: &SplatStorage) -> bool {
    if a.formats() != b.formats() {
        return false;
    }
    if !a.formats().any_normalized() {
        return true;
    }
    !a.has_chunks() && !b.has_chunks() && bytes_of(a.bounds()) == bytes_of(b.bounds())
}

/// Copy `count` splats from `source` into the slots of `target` starting at
/// `dst_start`.
///
/// Splats keep their world space placement, so they're moved through the
/// relative transform of the two collections. Deletion bits travel along.
///
/// A target with normalized formats only accepts records that are already
/// encoded against the same ranges, anything else would be clamped into them.
pub fn copy_splats(
    source: &SplatCollection,
    src_start: usize,
    target: &mut SplatCollection,
    dst_start: usize,
    count: usize,
) -> Result<(), EditError> {
    let src_storage = source.storage().ok_or(EditError::InvalidAsset)?;
    check_range(src_start, count, src_storage.count())?;

    let transform = SplatTransform::new(target.object_to_world.inverse() * source.object_to_world);
    let src_deleted = source.deletion();

    let parts = target.edit_parts().ok_or(EditError::InvalidAsset)?;
    check_range(dst_start, count, parts.storage.count())?;
    let _span = tracing::trace_span!("CopySplats", count).entered();

    let raw_copy = transform.is_identity() && same_encoding(src_storage, parts.storage);
    if !raw_copy && parts.storage.formats().any_normalized() {
        let err = EditError::UnsupportedFormat {
            operation: "Copy",
            formats: parts.storage.formats(),
            chunked: parts.storage.has_chunks(),
        };
        tracing::warn!("{err}");
        return Err(err);
    }
    if raw_copy {
        parts
            .storage
            .copy_raw_from(src_storage, src_start, dst_start, count);
    } else {
        let splats: Vec<Splat> = (src_start..src_start + count)
            .into_par_iter()
            .map(|i| {
                let mut splat = src_storage.decode_splat(i);
                transform.apply(&mut splat);
                splat
            })
            .collect();
        parts.storage.write_splats(dst_start, &splats);
    }

    parts.deletion.par_update(|i, deleted| {
        if (dst_start..dst_start + count).contains(&i) {
            src_deleted.is_some_and(|bits| bits.get(i - dst_start + src_start))
        } else {
            deleted
        }
    });

    target.mark_modified();
    target.invalidate_order();
    Ok(())
}
