//! Size class table.
//!
//! Powers of two from [`ALIGNMENT`] up to [`MAX_SMALL_SIZE`]
//! (8, 16, 32, ..., 1024), plus a class at 1.5x every power of two from 16
//! on (24, 48, 96, ...) to cut internal fragmentation. Intermediates above
//! the maximum are dropped, so the table is:
//!
//! 8, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024

use crate::config::{ALIGNMENT, MAX_SMALL_SIZE};

/// Round `size` up to a multiple of `alignment` (a power of two).
///
/// Returns `None` if the result does not fit in `usize`.
#[must_use]
pub fn align_up(size: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    size.checked_add(alignment - 1).map(|padded| padded & !(alignment - 1))
}

/// Strictly increasing, immutable list of class sizes in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeClassTable {
    sizes: Box<[usize]>,
}

impl SizeClassTable {
    /// Build the default table.
    #[must_use]
    pub fn build() -> Self {
        let mut sizes = Vec::new();
        let mut size = ALIGNMENT;
        while size <= MAX_SMALL_SIZE {
            sizes.push(size);
            size *= 2;
        }

        let intermediates: Vec<usize> = sizes
            .iter()
            .filter(|&&base| base >= 16)
            .map(|&base| base + base / 2)
            .filter(|&mid| mid <= MAX_SMALL_SIZE)
            .collect();
        sizes.extend(intermediates);
        sizes.sort_unstable();
        sizes.dedup();

        Self {
            sizes: sizes.into_boxed_slice(),
        }
    }

    /// Index of the smallest class that holds `size` bytes.
    ///
    /// `None` for a zero-byte request and for anything above the largest
    /// class.
    #[must_use]
    pub fn size_class(&self, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        // First index whose class is >= size; `len()` when none is.
        let index = self.sizes.partition_point(|&class| class < size);
        (index < self.sizes.len()).then_some(index)
    }

    /// Size in bytes of class `index`.
    #[must_use]
    pub fn class_size(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).copied()
    }

    /// Largest class size.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.sizes.last().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.sizes.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.sizes
    }
}

impl Default for SizeClassTable {
    fn default() -> Self {
        Self::build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_contents() {
        let table = SizeClassTable::build();
        assert_eq!(
            table.as_slice(),
            &[8, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024]
        );
    }

    #[test]
    fn table_is_strictly_increasing_and_bounded() {
        let table = SizeClassTable::build();
        assert!(table.as_slice().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(table.class_size(0), Some(ALIGNMENT));
        assert_eq!(table.max_size(), MAX_SMALL_SIZE);
        assert!(table.iter().all(|s| s % ALIGNMENT == 0));
    }

    #[test]
    fn zero_and_oversize_have_no_class() {
        let table = SizeClassTable::build();
        assert_eq!(table.size_class(0), None);
        assert_eq!(table.size_class(MAX_SMALL_SIZE + 1), None);
        assert_eq!(table.size_class(usize::MAX), None);
    }

    #[test]
    fn exact_and_rounded_lookups() {
        let table = SizeClassTable::build();
        assert_eq!(table.size_class(1), Some(0));
        assert_eq!(table.size_class(8), Some(0));
        assert_eq!(table.size_class(9), Some(1));
        assert_eq!(table.size_class(17), Some(2)); // 24
        assert_eq!(table.size_class(100), Some(7)); // 128
        assert_eq!(table.size_class(700), Some(12)); // 768
        assert_eq!(table.size_class(1024), Some(13));
    }

    #[test]
    fn lookup_is_monotonic_and_tight() {
        let table = SizeClassTable::build();
        let mut previous = 0;
        for size in 1..=MAX_SMALL_SIZE {
            let index = table.size_class(size).unwrap();
            assert!(index >= previous, "size {size} went backwards");
            previous = index;

            let class = table.class_size(index).unwrap();
            assert!(class >= size);
            if index > 0 {
                assert!(table.class_size(index - 1).unwrap() < size);
            }
        }
    }

    #[test]
    fn align_up_rounds_and_detects_overflow() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(1017, 8), Some(1024));
        assert_eq!(align_up(usize::MAX, 8), None);
    }
}
