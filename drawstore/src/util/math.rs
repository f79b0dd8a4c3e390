//! Math utilities.

use num_traits::PrimInt;

/// Performs integer division between a and b rounding up, instead of down
pub fn round_up_div<T: PrimInt>(a: T, b: T) -> T {
    (a + (b - T::one())) / b
}

/// Checks that `value` is an exact multiple of `factor`.
pub fn is_multiple_of<T: PrimInt>(value: T, factor: T) -> bool {
    value % factor == T::zero()
}
