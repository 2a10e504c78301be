use rayon::prelude::*;
use speck_kernel::{AtomicBuffer, calc_workgroup_count_1d};
use speck_prefix_sum::exclusive_prefix_sum;

pub const WG: usize = 256;
pub const ELEMENTS_PER_THREAD: usize = 4;
pub const BLOCK_SIZE: usize = WG * ELEMENTS_PER_THREAD;
pub const BITS_PER_PASS: u32 = 4;
pub const BIN_COUNT: usize = 1 << BITS_PER_PASS;

fn bin_of(key: u32, shift: u32) -> usize {
    ((key >> shift) as usize) & (BIN_COUNT - 1)
}

// Histogram per block, laid out bin-major (`counts[bin * num_blocks + block]`) so
// that an exclusive scan over the whole buffer yields every block's scatter
// offset for every bin.
fn sort_count(keys: &[u32], shift: u32, num_blocks: usize) -> Vec<u32> {
    let block_hists: Vec<[u32; BIN_COUNT]> = keys
        .par_chunks(BLOCK_SIZE)
        .map(|block| {
            let mut hist = [0u32; BIN_COUNT];
            for &key in block {
                hist[bin_of(key, shift)] += 1;
            }
            hist
        })
        .collect();

    let mut counts = vec![0u32; num_blocks * BIN_COUNT];
    for (block, hist) in block_hists.iter().enumerate() {
        for (bin, &count) in hist.iter().enumerate() {
            counts[bin * num_blocks + block] = count;
        }
    }
    counts
}

fn sort_scatter(
    keys: &[u32],
    values: &[u32],
    offsets: &[u32],
    shift: u32,
    num_blocks: usize,
) -> (Vec<u32>, Vec<u32>) {
    let output_keys = AtomicBuffer::zeros(keys.len());
    let output_values = AtomicBuffer::zeros(values.len());

    keys.par_chunks(BLOCK_SIZE)
        .zip(values.par_chunks(BLOCK_SIZE))
        .enumerate()
        .for_each(|(block, (block_keys, block_values))| {
            let mut cursor: [u32; BIN_COUNT] =
                std::array::from_fn(|bin| offsets[bin * num_blocks + block]);
            // Elements within a block keep their relative order, which makes every
            // pass stable.
            for (&key, &value) in block_keys.iter().zip(block_values) {
                let bin = bin_of(key, shift);
                let dst = cursor[bin] as usize;
                cursor[bin] += 1;
                output_keys.store(dst, key);
                output_values.store(dst, value);
            }
        });

    (output_keys.into_vec(), output_values.into_vec())
}

/// Perform a radix argsort on the input keys and values.
///
/// Sorts by the lowest `sorting_bits` bits of the keys, four bits per pass. Each
/// pass counts digits per block, scans the counts, and scatters. Every pass is
/// stable, so equal keys keep the order they had in the input.
pub fn radix_argsort(
    input_keys: Vec<u32>,
    input_values: Vec<u32>,
    sorting_bits: u32,
) -> (Vec<u32>, Vec<u32>) {
    assert_eq!(
        input_keys.len(),
        input_values.len(),
        "Input keys and values must have the same number of elements"
    );
    assert!(sorting_bits <= 32, "Can only sort up to 32 bits");

    let _span = tracing::trace_span!("Radix sort", len = input_keys.len()).entered();

    let num_blocks = calc_workgroup_count_1d(input_keys.len(), BLOCK_SIZE);

    let mut cur_keys = input_keys;
    let mut cur_vals = input_values;

    for pass in 0..sorting_bits.div_ceil(BITS_PER_PASS) {
        let shift = pass * BITS_PER_PASS;

        let counts =
            tracing::trace_span!("SortCount").in_scope(|| sort_count(&cur_keys, shift, num_blocks));
        let offsets = tracing::trace_span!("SortScan").in_scope(|| exclusive_prefix_sum(&counts));
        let (output_keys, output_values) = tracing::trace_span!("SortScatter").in_scope(|| {
            sort_scatter(&cur_keys, &cur_vals, &offsets, shift, num_blocks)
        });

        cur_keys = output_keys;
        cur_vals = output_values;
    }
    (cur_keys, cur_vals)
}

#[cfg(all(test, not(target_family = "wasm")))]
mod tests {
    use crate::radix_argsort;
    use rand::Rng;

    pub fn argsort<T: Ord>(data: &[T]) -> Vec<usize> {
        let mut indices = (0..data.len()).collect::<Vec<_>>();
        indices.sort_by_key(|&i| &data[i]);
        indices
    }

    #[test]
    fn test_sorting() {
        for i in 0..128 {
            let keys_inp = [
                5 + i * 4,
                i,
                6,
                123,
                74657,
                123,
                999,
                2u32.pow(24) + 123,
                6,
                7,
                8,
                0,
                i * 2,
                16 + i,
                128 * i,
            ];

            let values_inp: Vec<_> = keys_inp.iter().copied().map(|x| x * 2 + 5).collect();

            let (ret_keys, ret_values) = radix_argsort(keys_inp.to_vec(), values_inp.clone(), 32);

            let inds = argsort(&keys_inp);

            let ref_keys: Vec<u32> = inds.iter().map(|&i| keys_inp[i]).collect();
            let ref_values: Vec<u32> = inds.iter().map(|&i| values_inp[i]).collect();

            assert_eq!(ret_keys, ref_keys);
            assert_eq!(ret_values, ref_values);
        }
    }

    #[test]
    fn test_sorting_empty() {
        let (keys, values) = radix_argsort(vec![], vec![], 32);
        assert!(keys.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn test_sorting_is_stable() {
        // Values are the original indices, equal keys must keep index order.
        let keys: Vec<u32> = (0..5000).map(|i| (i * 7919) % 13).collect();
        let values: Vec<u32> = (0..5000).collect();
        let (ret_keys, ret_values) = radix_argsort(keys, values, 32);
        for i in 1..ret_keys.len() {
            assert!(ret_keys[i - 1] <= ret_keys[i], "Keys not sorted at {i}");
            if ret_keys[i - 1] == ret_keys[i] {
                assert!(ret_values[i - 1] < ret_values[i], "Ties not ordered by index at {i}");
            }
        }
    }

    #[test]
    fn test_sorting_big() {
        // Simulate some data as one might find for a bunch of gaussians.
        let mut rng = rand::rng();
        let mut keys_inp = Vec::new();
        for i in 0..10000 {
            let start = rng.random_range(i..i + 150);
            let end = rng.random_range(start..start + 250);

            for j in start..end {
                if rng.random::<f32>() < 0.5 {
                    keys_inp.push(j);
                }
            }
        }

        let values_inp: Vec<_> = keys_inp.iter().map(|&x| x * 2 + 5).collect();
        let (ret_keys, ret_values) = radix_argsort(keys_inp.clone(), values_inp.clone(), 32);

        let inds = argsort(&keys_inp);
        let ref_keys: Vec<u32> = inds.iter().map(|&i| keys_inp[i]).collect();
        let ref_values: Vec<u32> = inds.iter().map(|&i| values_inp[i]).collect();

        assert_eq!(ret_keys, ref_keys);
        assert_eq!(ret_values, ref_values);
    }

    #[test]
    fn test_sorting_large() {
        const NUM_ELEMENTS: usize = 4_000_000;

        let mut rng = rand::rng();

        let keys_inp: Vec<u32> = (0..NUM_ELEMENTS).map(|_| rng.random()).collect();
        let values_inp: Vec<u32> = (0..NUM_ELEMENTS).map(|i| i as u32).collect();

        let (ret_keys, ret_values) = radix_argsort(keys_inp.clone(), values_inp, 32);

        assert_eq!(ret_keys.len(), NUM_ELEMENTS);
        assert_eq!(ret_values.len(), NUM_ELEMENTS);

        for i in 1..NUM_ELEMENTS {
            assert!(
                ret_keys[i - 1] <= ret_keys[i],
                "Keys not sorted at index {i}: {} > {}",
                ret_keys[i - 1],
                ret_keys[i]
            );
        }

        // Every index shows up exactly once.
        let mut seen = vec![false; NUM_ELEMENTS];
        for &v in &ret_values {
            assert!(!seen[v as usize], "Index {v} appears twice");
            seen[v as usize] = true;
        }

        let check_indices = [0, 1000, 10_000, 100_000, 1_000_000, 3_999_999];
        for &idx in &check_indices {
            let original_idx = ret_values[idx] as usize;
            assert_eq!(
                keys_inp[original_idx], ret_keys[idx],
                "Value at index {idx} points to wrong original index"
            );
        }
    }

    #[test]
    fn test_partial_bits() {
        // Only the low 8 bits take part in the ordering.
        let keys = vec![0x1_02, 0x2_01, 0x3_03, 0x0_01];
        let values = vec![0, 1, 2, 3];
        let (_, ret_values) = radix_argsort(keys, values, 8);
        assert_eq!(ret_values, [1, 3, 0, 2]);
    }
}
