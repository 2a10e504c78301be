//! Speck kernel infrastructure for data-parallel splat passes.
//!
//! Every per-frame and per-edit pass in speck is written as a kernel: a function
//! invoked once per element (or once per workgroup of elements) over host
//! resident storage buffers, with no cross-element communication except through
//! atomics. This crate provides:
//!
//! - dispatch helpers that run kernels on the rayon pool, wrapped in tracing spans
//! - buffer allocation helpers for `bytemuck` POD element types
//! - atomic scatter buffers and sortable-float atomics for min/max reductions
//!
//! # Example
//!
//! ```
//! use speck_kernel::dispatch_1d;
//!
//! let mut doubled = vec![0u32; 1024];
//! dispatch_1d("Double", &mut doubled, |gid, out| *out = gid as u32 * 2);
//! assert_eq!(doubled[10], 20);
//! ```
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

// Re-export bytemuck for POD buffer element types.
pub use bytemuck;

mod sortable;

pub use sortable::{AtomicBounds, float_to_sortable_uint, sortable_uint_to_float};

/// Default number of elements a single workgroup processes.
pub const WORKGROUP_SIZE: usize = 256;

/// Calculate the number of workgroups needed to cover `num_elements`.
pub fn calc_workgroup_count_1d(num_elements: usize, workgroup_size: usize) -> usize {
    assert!(workgroup_size > 0, "Workgroup size must be non-zero");
    num_elements.div_ceil(workgroup_size)
}

/// Run `kernel` once per element of `output`. The kernel receives the global id
/// of the element and a mutable reference to its output slot.
pub fn dispatch_1d<T: Send>(
    name: &'static str,
    output: &mut [T],
    kernel: impl Fn(usize, &mut T) + Sync + Send,
) {
    let _span = tracing::trace_span!("dispatch_1d", kernel = name, len = output.len()).entered();
    output
        .par_iter_mut()
        .enumerate()
        .for_each(|(gid, out)| kernel(gid, out));
}

/// Run `kernel` once per workgroup of `output`. The kernel receives the workgroup
/// id and the slice of output owned by that workgroup. The last workgroup may be
/// shorter than `workgroup_size`.
pub fn dispatch_workgroups<T: Send>(
    name: &'static str,
    output: &mut [T],
    workgroup_size: usize,
    kernel: impl Fn(usize, &mut [T]) + Sync + Send,
) {
    assert!(workgroup_size > 0, "Workgroup size must be non-zero");
    let _span = tracing::trace_span!(
        "dispatch_workgroups",
        kernel = name,
        workgroups = calc_workgroup_count_1d(output.len(), workgroup_size)
    )
    .entered();
    output
        .par_chunks_mut(workgroup_size)
        .enumerate()
        .for_each(|(wid, group)| kernel(wid, group));
}

/// Reserve a buffer of `len` elements whose contents the caller promises to
/// fully overwrite.
///
/// In debug builds the buffer is filled with noise, so that passes never
/// accidentally rely on values being initialized to zero.
pub fn create_buffer<T: bytemuck::Pod>(len: usize) -> Vec<T> {
    let mut buffer = vec![T::zeroed(); len];
    if cfg!(debug_assertions) {
        bytemuck::cast_slice_mut::<T, u8>(&mut buffer).fill(0xA5);
    }
    buffer
}

/// A buffer of `u32` that many kernel invocations can write to concurrently,
/// e.g. for scatter passes where every invocation owns a distinct set of
/// destination indices.
pub struct AtomicBuffer {
    data: Vec<AtomicU32>,
}

impl AtomicBuffer {
    pub fn zeros(len: usize) -> Self {
        Self {
            data: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn store(&self, index: usize, value: u32) {
        self.data[index].store(value, Ordering::Relaxed);
    }

    pub fn fetch_add(&self, index: usize, value: u32) -> u32 {
        self.data[index].fetch_add(value, Ordering::Relaxed)
    }

    /// Read back the buffer once all writers are done.
    pub fn into_vec(self) -> Vec<u32> {
        self.data.into_iter().map(AtomicU32::into_inner).collect()
    }
}
