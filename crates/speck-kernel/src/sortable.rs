use std::sync::atomic::{AtomicU32, Ordering};

/// Reinterpret a float as an unsigned integer such that unsigned integer
/// ordering matches float ordering.
///
/// Non-negative floats get their sign bit flipped, negative floats get all
/// their bits inverted.
pub fn float_to_sortable_uint(f: f32) -> u32 {
    let bits = f.to_bits();
    let mask = (-((bits >> 31) as i32)) as u32 | 0x8000_0000;
    bits ^ mask
}

/// Inverse of [`float_to_sortable_uint`].
pub fn sortable_uint_to_float(u: u32) -> f32 {
    let mask = ((u >> 31).wrapping_sub(1)) | 0x8000_0000;
    f32::from_bits(u ^ mask)
}

/// Axis aligned bounds accumulated with atomic min/max over sortable float bits.
///
/// Min and max are associative and commutative, so the result does not depend
/// on which invocation gets there first.
pub struct AtomicBounds {
    min: [AtomicU32; 3],
    max: [AtomicU32; 3],
}

impl AtomicBounds {
    pub fn new() -> Self {
        Self {
            min: std::array::from_fn(|_| AtomicU32::new(u32::MAX)),
            max: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    pub fn include(&self, point: [f32; 3]) {
        for axis in 0..3 {
            let key = float_to_sortable_uint(point[axis]);
            self.min[axis].fetch_min(key, Ordering::Relaxed);
            self.max[axis].fetch_max(key, Ordering::Relaxed);
        }
    }

    /// Read back the bounds, `None` if nothing was included.
    pub fn read(&self) -> Option<([f32; 3], [f32; 3])> {
        let min = self.min.each_ref().map(|a| a.load(Ordering::Relaxed));
        let max = self.max.each_ref().map(|a| a.load(Ordering::Relaxed));
        if min[0] > max[0] {
            return None;
        }
        Some((min.map(sortable_uint_to_float), max.map(sortable_uint_to_float)))
    }
}

impl Default for AtomicBounds {
    fn default() -> Self {
        Self::new()
    }
}
