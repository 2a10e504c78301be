use rayon::prelude::*;
use speck_kernel::dispatch_workgroups;

/// Number of elements scanned by a single workgroup.
pub const THREADS_PER_GROUP: usize = 512;

// Scan each group in place and return the total of every group.
fn scan_groups(data: &mut [u32]) -> Vec<u32> {
    data.par_chunks_mut(THREADS_PER_GROUP)
        .map(|group| {
            let mut acc = 0u32;
            for v in group.iter_mut() {
                acc = acc.wrapping_add(*v);
                *v = acc;
            }
            acc
        })
        .collect()
}

fn add_scanned_sums(data: &mut [u32], scanned_sums: &[u32]) {
    dispatch_workgroups(
        "PrefixSumAddScannedSums",
        data,
        THREADS_PER_GROUP,
        |group_id, group| {
            if group_id == 0 {
                return;
            }
            let offset = scanned_sums[group_id - 1];
            for v in group.iter_mut() {
                *v = v.wrapping_add(offset);
            }
        },
    );
}

fn inclusive_scan_in_place(data: &mut [u32]) {
    if data.len() <= THREADS_PER_GROUP {
        scan_groups(data);
        return;
    }

    // Scan per group, then scan the group totals (recursing for as many levels as
    // needed) and add them back into every group.
    let mut group_sums = tracing::trace_span!("PrefixSumScan").in_scope(|| scan_groups(data));
    tracing::trace_span!("PrefixSumScanSums")
        .in_scope(|| inclusive_scan_in_place(&mut group_sums));
    add_scanned_sums(data, &group_sums);
}

/// Compute the inclusive prefix sum of the first `length` elements of `input`.
///
/// Elements past `length` are never read.
pub fn prefix_sum_with_length(input: &[u32], length: usize) -> Vec<u32> {
    assert!(
        length <= input.len(),
        "Length {length} exceeds input buffer of {}",
        input.len()
    );
    let mut outputs = input[..length].to_vec();
    inclusive_scan_in_place(&mut outputs);
    outputs
}

/// Compute the inclusive prefix sum over all elements in the input buffer.
pub fn prefix_sum(input: &[u32]) -> Vec<u32> {
    prefix_sum_with_length(input, input.len())
}

/// Compute the exclusive prefix sum over all elements in the input buffer, so
/// `output[i]` is the sum of `input[..i]`.
pub fn exclusive_prefix_sum(input: &[u32]) -> Vec<u32> {
    let inclusive = prefix_sum(input);
    let mut outputs = Vec::with_capacity(inclusive.len());
    if !inclusive.is_empty() {
        outputs.push(0);
        outputs.extend_from_slice(&inclusive[..inclusive.len() - 1]);
    }
    outputs
}
