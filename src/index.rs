//! Flat-offset mapping for row-major dense blocks
//!
//! Every primitive in this crate addresses its operands through these two
//! functions. Neither checks its arguments in release builds: keeping `i` and
//! `j` inside the block is the caller's contract.

/// Offset of element `(i, j)` in a row-major block with row stride `stride`
#[inline(always)]
pub fn dense_index(stride: usize, i: usize, j: usize) -> usize {
    i * stride + j
}

/// Offset of element `(i, j)` of a logical `rows x cols` matrix.
///
/// With `TRANSPOSE = false` the block is read row-major. With `TRANSPOSE = true`
/// the same logical matrix is read from a buffer holding its transpose, i.e.
/// column-major, so no transposed copy has to be materialized.
///
/// # Example
///
/// ```
/// use trueno_dense::index::dense_index_t;
///
/// // Buffer holds [[1, 2, 3], [4, 5, 6]] (2x3). Read as its 3x2 transpose:
/// let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// assert_eq!(data[dense_index_t::<true>(3, 2, 2, 0)], 3.0);
/// assert_eq!(data[dense_index_t::<false>(2, 3, 1, 2)], 6.0);
/// ```
#[inline(always)]
pub fn dense_index_t<const TRANSPOSE: bool>(rows: usize, cols: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < rows && j < cols, "({i}, {j}) outside {rows}x{cols}");
    if TRANSPOSE {
        j * rows + i
    } else {
        i * cols + j
    }
}
