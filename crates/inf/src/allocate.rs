/// Create a vec with the requested capacity without initializing the elements.
pub fn vec_with_capacity<T>(capacity: usize) -> Vec<T> {
    Vec::with_capacity(capacity)
}

/// Create a vec of `len` elements, every element set to `val`.
pub fn vec_filled_with<T: Copy>(val: T, len: usize) -> Vec<T> {
    vec![val; len]
}

/// Create a zero initialized vec of `len` elements.
pub fn zeroed_vec<T: Copy + num::Zero>(len: usize) -> Vec<T> {
    vec![T::zero(); len]
}
