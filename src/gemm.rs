//! General matrix multiply and its adjoint
//!
//! Computes `C = op(A) * op(B)` over row-major `f32` blocks, where `op(X)` is
//! either `X` or `X^T`. Transposition is a per-call flag: the operand is read
//! column-major through [`dense_index_t`] rather than copied.
//!
//! The kernel is a plain O(m·n·p) triple loop with no tiling; per-batch
//! matrices are expected to be small.
//!
//! # Example
//!
//! ```
//! use trueno_dense::gemm::{gemm, GemmMode, Transpose};
//!
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [5.0, 6.0, 7.0, 8.0];
//! let mut c = [0.0; 4];
//!
//! gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
//! assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
//!
//! gemm(2, 2, 2, Transpose::Yes, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
//! assert_eq!(c, [26.0, 30.0, 38.0, 44.0]);
//! ```

use crate::batch::{GemmBatch, LaneMap};
use crate::index::dense_index_t;

/// Whether an operand is read as stored or as its transpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transpose {
    /// Read the block as stored
    #[default]
    No,
    /// Read the block as its transpose
    Yes,
}

impl Transpose {
    /// The opposite flag
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Transpose::No => Transpose::Yes,
            Transpose::Yes => Transpose::No,
        }
    }

    /// `true` for [`Transpose::Yes`]
    #[inline]
    pub fn is_transposed(self) -> bool {
        self == Transpose::Yes
    }
}

impl From<bool> for Transpose {
    fn from(transposed: bool) -> Self {
        if transposed {
            Transpose::Yes
        } else {
            Transpose::No
        }
    }
}

/// Whether the product replaces or is added into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GemmMode {
    /// `C = op(A) * op(B)`
    #[default]
    Overwrite,
    /// `C += op(A) * op(B)`
    Accumulate,
}

/// Specialized kernel writing output row `i` into `row` for every `(i, row)` pair
#[inline]
fn gemm_impl<'r, const T1: bool, const T2: bool, const ADD: bool>(
    rows: impl IntoIterator<Item = (usize, &'r mut [f32])>,
    m: usize,
    n: usize,
    p: usize,
    a: &[f32],
    b: &[f32],
) {
    for (i, row) in rows {
        for (j, dst) in row.iter_mut().enumerate().take(n) {
            let mut sum = 0.0f32;

            for k in 0..p {
                sum += a[dense_index_t::<T1>(m, p, i, k)] * b[dense_index_t::<T2>(p, n, k, j)];
            }

            if ADD {
                *dst += sum;
            } else {
                *dst = sum;
            }
        }
    }
}

/// Multiply `op(A)` (m x p) by `op(B)` (p x n) into `C` (m x n).
///
/// `a` holds A as stored: `m x p` when `t1` is `No`, `p x m` when `Yes`
/// (likewise `b` is `p x n` or `n x p`). `c` must not alias `a` or `b`.
///
/// With [`GemmMode::Accumulate`] the product is added into the existing
/// contents of `c`, which is how the adjoint accumulates gradients.
#[allow(clippy::too_many_arguments)]
pub fn gemm(
    m: usize,
    n: usize,
    p: usize,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    mode: GemmMode,
) {
    gemm_rows(0, 1, m, n, p, t1, t2, a, b, c, mode);
}

/// Compute only output rows `row_start, row_start + row_step, ...` of [`gemm`].
///
/// This is the unit of work of one lane when a group of lanes shares a single
/// product: lane `r` of a group of `g` calls `gemm_rows(r, g, ...)`. The union
/// over `r in 0..g` equals one full `gemm` call. A `row_step` of zero is
/// treated as one.
#[allow(clippy::too_many_arguments)]
pub fn gemm_rows(
    row_start: usize,
    row_step: usize,
    m: usize,
    n: usize,
    p: usize,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    mode: GemmMode,
) {
    if n == 0 {
        return;
    }
    let rows = c[..m * n]
        .chunks_mut(n)
        .enumerate()
        .skip(row_start)
        .step_by(row_step.max(1));
    gemm_into_rows(rows, m, n, p, t1, t2, a, b, mode);
}

/// Compute the output rows named by `rows`, each written into its own slice.
///
/// Every item is `(i, row)` where `row` receives row `i` of `op(A) * op(B)`
/// (its first `n` entries). Rows may come from different places in memory,
/// which lets a grouped launch hand each lane a disjoint set of row slices.
///
/// # Example
///
/// ```
/// use trueno_dense::gemm::{gemm_into_rows, GemmMode, Transpose};
///
/// let a = [1.0, 2.0, 3.0, 4.0];
/// let b = [5.0, 6.0, 7.0, 8.0];
/// let mut second_row = [0.0; 2];
/// gemm_into_rows([(1, &mut second_row[..])], 2, 2, 2, Transpose::No, Transpose::No,
///                &a, &b, GemmMode::Overwrite);
/// assert_eq!(second_row, [43.0, 50.0]);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn gemm_into_rows<'r>(
    rows: impl IntoIterator<Item = (usize, &'r mut [f32])>,
    m: usize,
    n: usize,
    p: usize,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    mode: GemmMode,
) {
    use GemmMode::{Accumulate, Overwrite};
    use Transpose::{No, Yes};

    match (t1, t2, mode) {
        (No, No, Overwrite) => gemm_impl::<false, false, false>(rows, m, n, p, a, b),
        (Yes, No, Overwrite) => gemm_impl::<true, false, false>(rows, m, n, p, a, b),
        (No, Yes, Overwrite) => gemm_impl::<false, true, false>(rows, m, n, p, a, b),
        (Yes, Yes, Overwrite) => gemm_impl::<true, true, false>(rows, m, n, p, a, b),
        (No, No, Accumulate) => gemm_impl::<false, false, true>(rows, m, n, p, a, b),
        (Yes, No, Accumulate) => gemm_impl::<true, false, true>(rows, m, n, p, a, b),
        (No, Yes, Accumulate) => gemm_impl::<false, true, true>(rows, m, n, p, a, b),
        (Yes, Yes, Accumulate) => gemm_impl::<true, true, true>(rows, m, n, p, a, b),
    }
}

/// Batched GEMM for batch element `batch`, writing into the shared `c` buffer
#[allow(clippy::too_many_arguments)]
pub fn gemm_batched(
    batch: usize,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    mode: GemmMode,
) {
    let (m, n, _) = desc.dims(batch);
    let c_start = desc.c_start[batch];
    gemm_batched_block(batch, desc, t1, t2, a, b, &mut c[c_start..c_start + m * n], mode);
}

/// Batched GEMM for batch element `batch`, writing into its already-split C block
#[allow(clippy::too_many_arguments)]
pub fn gemm_batched_block(
    batch: usize,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c_block: &mut [f32],
    mode: GemmMode,
) {
    let (m, n, p) = desc.dims(batch);
    gemm(
        m,
        n,
        p,
        t1,
        t2,
        &a[desc.a_start[batch]..],
        &b[desc.b_start[batch]..],
        c_block,
        mode,
    );
}

/// Batched GEMM as executed by one lane of a grouped launch.
///
/// The lane's batch element is `map.batch_of(lane)`; within it the lane
/// computes the output rows congruent to `map.lane_in_group(lane)` modulo the
/// group size. Running every lane of `map.lane_count(batches)` reproduces
/// [`gemm_batched`] for every element.
#[allow(clippy::too_many_arguments)]
pub fn gemm_batched_lane(
    lane: usize,
    map: LaneMap,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    mode: GemmMode,
) {
    let batch = map.batch_of(lane);
    let (m, n, p) = desc.dims(batch);
    let c_start = desc.c_start[batch];
    gemm_rows(
        map.lane_in_group(lane),
        map.lanes_per_batch(),
        m,
        n,
        p,
        t1,
        t2,
        &a[desc.a_start[batch]..],
        &b[desc.b_start[batch]..],
        &mut c[c_start..c_start + m * n],
        mode,
    );
}

/// Adjoint of [`gemm`].
///
/// Given `adj_c = dL/dC`, accumulates
/// `dL/d op(A) = adj_C * op(B)^T` into `adj_a` and
/// `dL/d op(B) = op(A)^T * adj_C` into `adj_b`, each written in the stored
/// layout of its primal operand (so a transposed operand receives the
/// transposed gradient). Both targets are added into, never overwritten.
#[allow(clippy::too_many_arguments)]
pub fn adj_gemm(
    m: usize,
    n: usize,
    p: usize,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_c: &[f32],
) {
    let acc = GemmMode::Accumulate;

    if t1.is_transposed() {
        // A is stored p x m: adj_A = op(B) * adj_C^T
        gemm(p, m, n, t2, Transpose::Yes, b, adj_c, adj_a, acc);
    } else {
        gemm(m, p, n, Transpose::No, t2.flip(), adj_c, b, adj_a, acc);
    }

    if t2.is_transposed() {
        // B is stored n x p: adj_B = adj_C^T * op(A)
        gemm(n, p, m, Transpose::Yes, t1, adj_c, a, adj_b, acc);
    } else {
        gemm(p, n, m, t1.flip(), Transpose::No, a, adj_c, adj_b, acc);
    }
}

/// Adjoint of [`gemm_batched`] for batch element `batch`
#[allow(clippy::too_many_arguments)]
pub fn adj_gemm_batched(
    batch: usize,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_c: &[f32],
) {
    let (a_len, b_len, _) = desc.block_lens(batch);
    let a_start = desc.a_start[batch];
    let b_start = desc.b_start[batch];
    adj_gemm_batched_block(
        batch,
        desc,
        t1,
        t2,
        a,
        b,
        &mut adj_a[a_start..a_start + a_len],
        &mut adj_b[b_start..b_start + b_len],
        adj_c,
    );
}

/// Adjoint of [`gemm_batched`] writing into already-split gradient blocks
#[allow(clippy::too_many_arguments)]
pub fn adj_gemm_batched_block(
    batch: usize,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    adj_a_block: &mut [f32],
    adj_b_block: &mut [f32],
    adj_c: &[f32],
) {
    let (m, n, p) = desc.dims(batch);
    adj_gemm(
        m,
        n,
        p,
        t1,
        t2,
        &a[desc.a_start[batch]..],
        &b[desc.b_start[batch]..],
        adj_a_block,
        adj_b_block,
        &adj_c[desc.c_start[batch]..],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Materialized transpose of a stored `rows x cols` block
    fn transposed(rows: usize, cols: usize, data: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                out[j * rows + i] = data[i * cols + j];
            }
        }
        out
    }

    fn reference(m: usize, n: usize, p: usize, a: &[f32], b: &[f32]) -> Vec<f32> {
        let mut c = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                for k in 0..p {
                    c[i * n + j] += a[i * p + k] * b[k * n + j];
                }
            }
        }
        c
    }

    fn sample(len: usize, seed: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (((i * 7 + seed * 13) % 17) as f32 - 8.0) * 0.25)
            .collect()
    }

    #[test]
    fn test_gemm_2x2_scenario() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [0.0; 4];

        gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);

        gemm(2, 2, 2, Transpose::Yes, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        assert_eq!(c, [26.0, 30.0, 38.0, 44.0]);
    }

    #[test]
    fn test_gemm_non_square() {
        // (2x3) x (3x1)
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [1.0, 0.0, -1.0];
        let mut c = [0.0; 2];
        gemm(2, 1, 3, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        assert_eq!(c, [-2.0, -2.0]);
    }

    #[test]
    fn test_gemm_all_transpose_combinations() {
        let (m, n, p) = (3, 4, 5);
        let a = sample(m * p, 1);
        let b = sample(p * n, 2);
        let expected = reference(m, n, p, &a, &b);

        let a_t = transposed(m, p, &a);
        let b_t = transposed(p, n, &b);

        for (t1, t2, lhs, rhs) in [
            (Transpose::No, Transpose::No, &a, &b),
            (Transpose::Yes, Transpose::No, &a_t, &b),
            (Transpose::No, Transpose::Yes, &a, &b_t),
            (Transpose::Yes, Transpose::Yes, &a_t, &b_t),
        ] {
            let mut c = vec![0.0; m * n];
            gemm(m, n, p, t1, t2, lhs, rhs, &mut c, GemmMode::Overwrite);
            for (got, want) in c.iter().zip(&expected) {
                assert!((got - want).abs() < 1e-5, "{t1:?}/{t2:?}: {got} vs {want}");
            }
        }
    }

    #[test]
    fn test_gemm_overwrite_ignores_existing_contents() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [100.0; 4];
        gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_gemm_accumulate_adds_to_existing() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [1.0, -1.0, 0.5, 2.0];
        gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Accumulate);
        assert_eq!(c, [20.0, 21.0, 43.5, 52.0]);
    }

    #[test]
    fn test_gemm_rows_partition_equals_full() {
        let (m, n, p) = (7, 3, 4);
        let a = sample(m * p, 3);
        let b = sample(p * n, 4);

        let mut full = vec![0.0; m * n];
        gemm(m, n, p, Transpose::No, Transpose::Yes, &a, &b, &mut full, GemmMode::Overwrite);

        let mut striped = vec![0.0; m * n];
        for r in 0..3 {
            gemm_rows(r, 3, m, n, p, Transpose::No, Transpose::Yes, &a, &b, &mut striped, GemmMode::Overwrite);
        }
        assert_eq!(full, striped);
    }

    #[test]
    fn test_gemm_rows_zero_step_is_full() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [0.0; 4];
        gemm_rows(0, 0, 2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_gemm_batched_matches_single_calls() {
        let desc = GemmBatch {
            m: &[2, 3],
            n: &[2, 1],
            p: &[3, 2],
            a_start: &[0, 6],
            b_start: &[0, 6],
            c_start: &[0, 4],
        };
        let a = sample(12, 5);
        let b = sample(8, 6);
        let mut c = vec![0.0; 7];
        for batch in 0..desc.len() {
            gemm_batched(batch, &desc, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        }

        let mut c0 = vec![0.0; 4];
        gemm(2, 2, 3, Transpose::No, Transpose::No, &a[0..6], &b[0..6], &mut c0, GemmMode::Overwrite);
        let mut c1 = vec![0.0; 3];
        gemm(3, 1, 2, Transpose::No, Transpose::No, &a[6..], &b[6..], &mut c1, GemmMode::Overwrite);

        assert_eq!(&c[0..4], c0.as_slice());
        assert_eq!(&c[4..7], c1.as_slice());
    }

    #[test]
    fn test_gemm_batched_lane_matches_batched() {
        let desc = GemmBatch {
            m: &[5, 3],
            n: &[2, 2],
            p: &[2, 3],
            a_start: &[0, 10],
            b_start: &[0, 4],
            c_start: &[0, 10],
        };
        let a = sample(19, 7);
        let b = sample(10, 8);

        let mut expected = vec![0.0; 16];
        for batch in 0..desc.len() {
            gemm_batched(batch, &desc, Transpose::No, Transpose::No, &a, &b, &mut expected, GemmMode::Overwrite);
        }

        let map = LaneMap::grouped(4);
        let mut c = vec![0.0; 16];
        for lane in 0..map.lane_count(desc.len()) {
            gemm_batched_lane(lane, map, &desc, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
        }
        assert_eq!(c, expected);
    }

    #[test]
    fn test_adj_gemm_matches_closed_form() {
        // C = A B, A 2x3, B 3x2: adj_A = adj_C B^T, adj_B = A^T adj_C
        let (m, n, p) = (2, 2, 3);
        let a = sample(m * p, 9);
        let b = sample(p * n, 10);
        let adj_c = sample(m * n, 11);

        let mut adj_a = vec![0.0; m * p];
        let mut adj_b = vec![0.0; p * n];
        adj_gemm(m, n, p, Transpose::No, Transpose::No, &a, &b, &mut adj_a, &mut adj_b, &adj_c);

        let want_a = reference(m, p, n, &adj_c, &transposed(p, n, &b));
        let want_b = reference(p, n, m, &transposed(m, p, &a), &adj_c);
        for (g, w) in adj_a.iter().zip(&want_a) {
            assert!((g - w).abs() < 1e-5);
        }
        for (g, w) in adj_b.iter().zip(&want_b) {
            assert!((g - w).abs() < 1e-5);
        }
    }

    #[test]
    fn test_adj_gemm_transposed_operands_receive_transposed_gradients() {
        let (m, n, p) = (3, 2, 4);
        let a = sample(m * p, 12);
        let b = sample(p * n, 13);
        let adj_c = sample(m * n, 14);

        let mut adj_a = vec![0.0; m * p];
        let mut adj_b = vec![0.0; p * n];
        adj_gemm(m, n, p, Transpose::No, Transpose::No, &a, &b, &mut adj_a, &mut adj_b, &adj_c);

        let a_t = transposed(m, p, &a);
        let b_t = transposed(p, n, &b);
        let mut adj_a_t = vec![0.0; m * p];
        let mut adj_b_t = vec![0.0; p * n];
        adj_gemm(m, n, p, Transpose::Yes, Transpose::Yes, &a_t, &b_t, &mut adj_a_t, &mut adj_b_t, &adj_c);

        for (g, w) in adj_a_t.iter().zip(&transposed(m, p, &adj_a)) {
            assert!((g - w).abs() < 1e-5);
        }
        for (g, w) in adj_b_t.iter().zip(&transposed(p, n, &adj_b)) {
            assert!((g - w).abs() < 1e-5);
        }
    }

    #[test]
    fn test_adj_gemm_accumulates() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let adj_c = [1.0, 0.0, 0.0, 0.0];
        let mut adj_a = [10.0; 4];
        let mut adj_b = [10.0; 4];
        adj_gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut adj_a, &mut adj_b, &adj_c);
        // dC00/dA0k = B[k,0]; dC00/dBk0 = A[0,k]
        assert_eq!(adj_a, [15.0, 17.0, 10.0, 10.0]);
        assert_eq!(adj_b, [11.0, 10.0, 12.0, 10.0]);
    }

    #[test]
    fn test_adj_gemm_batched_matches_single() {
        let desc = GemmBatch {
            m: &[2, 1],
            n: &[1, 2],
            p: &[2, 2],
            a_start: &[0, 4],
            b_start: &[0, 2],
            c_start: &[0, 2],
        };
        let a = sample(6, 15);
        let b = sample(6, 16);
        let adj_c = sample(4, 17);

        let mut adj_a = vec![0.0; 6];
        let mut adj_b = vec![0.0; 6];
        for batch in 0..desc.len() {
            adj_gemm_batched(batch, &desc, Transpose::No, Transpose::No, &a, &b, &mut adj_a, &mut adj_b, &adj_c);
        }

        let mut a1 = vec![0.0; 2];
        let mut b1 = vec![0.0; 4];
        adj_gemm(1, 2, 2, Transpose::No, Transpose::No, &a[4..], &b[2..], &mut a1, &mut b1, &adj_c[2..]);
        assert_eq!(&adj_a[4..6], a1.as_slice());
        assert_eq!(&adj_b[2..6], b1.as_slice());
    }

    #[test]
    fn test_transpose_flags() {
        assert_eq!(Transpose::No.flip(), Transpose::Yes);
        assert_eq!(Transpose::Yes.flip(), Transpose::No);
        assert_eq!(Transpose::from(true), Transpose::Yes);
        assert!(!Transpose::default().is_transposed());
        assert_eq!(GemmMode::default(), GemmMode::Overwrite);
    }
}
