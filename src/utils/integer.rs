//! Integer functions.

use num::traits::{PrimInt, Unsigned};

/// Computes the ceiling of the base-2 log of `x`. Panics if `x` is zero.
pub fn ceil_log2<T>(x: T) -> u32
where
    T: PrimInt + Unsigned,
{
    assert!(!x.is_zero());

    T::zero().count_zeros() - T::leading_zeros(x - T::one())
}

/// Number of selector bits needed to distinguish `count` symbols. A single
/// symbol needs no selector.
pub fn selector_width(count: usize) -> u32 {
    ceil_log2(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(1u32), 0);
        assert_eq!(ceil_log2(2u32), 1);
        assert_eq!(ceil_log2(3u32), 2);
        assert_eq!(ceil_log2(4u64), 2);
        assert_eq!(ceil_log2(5usize), 3);
        assert_eq!(ceil_log2(1024usize), 10);
        assert_eq!(ceil_log2(1025usize), 11);
    }

    #[test]
    #[should_panic]
    fn ceil_log2_of_zero() {
        ceil_log2(0u32);
    }

    #[test]
    fn selector_widths() {
        assert_eq!(selector_width(1), 0);
        assert_eq!(selector_width(2), 1);
        assert_eq!(selector_width(3), 2);
        assert_eq!(selector_width(64), 6);
    }
}
