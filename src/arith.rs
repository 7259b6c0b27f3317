//! Overflow-checked size arithmetic.
//!
//! [`checked_product`] is the only place `count * size` is ever computed for
//! [`crate::zero_allocate`]. It folds "overflow" and "a zero factor" into the
//! same `0` result, which is exactly what the caller wants: both mean
//! "refuse the request", and neither is distinguishable from a legitimate
//! zero-byte request that the allocator also refuses.

/// Compute `a * b`, returning `0` if either factor is `0` or the product
/// overflows `usize`.
pub fn checked_product(a: usize, b: usize) -> usize {
    a.checked_mul(b).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::checked_product;

    #[test]
    fn ordinary_product() {
        assert_eq!(checked_product(4, 8), 32);
    }

    #[test]
    fn zero_factor_yields_zero() {
        assert_eq!(checked_product(0, 8), 0);
        assert_eq!(checked_product(8, 0), 0);
    }

    #[test]
    fn overflow_yields_zero() {
        assert_eq!(checked_product(usize::MAX, 2), 0);
        assert_eq!(checked_product(usize::MAX / 2 + 2, 2), 0);
    }

    #[test]
    fn exact_boundary_does_not_overflow() {
        assert_eq!(checked_product(usize::MAX, 1), usize::MAX);
    }
}
