//! Cholesky factorization of regularized symmetric matrices
//!
//! Computes the lower-triangular factor `L` with `L L^T = A + diag(reg)`.
//! There is no pivoting and no failure path: an indefinite or
//! under-regularized input yields a NaN pivot that propagates into every later
//! column and into whatever consumes `L`. Callers that need a guaranteed
//! factorization must supply enough regularization.
//!
//! # Gradients
//!
//! The adjoints here are intentionally empty. Every consumer of `L` only uses
//! it to solve `A x = b`, and [`crate::solve::adj_solve`] differentiates that
//! solve directly through `A^-1`. Back-propagating through the factorization as
//! well would count the same gradient twice.

use crate::batch::CholeskyBatch;
use crate::index::dense_index;

/// Factor `A + diag(regularization)` into `l` (both `n x n`, row-major).
///
/// Only the lower triangle of `a` is read. Every entry of `l` is written:
/// the strict upper triangle is set to zero so `l` is a complete factor even
/// when the buffer was not cleared beforehand.
///
/// # Example
///
/// ```
/// use trueno_dense::cholesky::chol;
///
/// let a = [4.0, 2.0, 2.0, 3.0];
/// let mut l = [0.0; 4];
/// chol(2, &a, &[0.0, 0.0], &mut l);
/// assert_eq!(l, [2.0, 0.0, 1.0, 2.0f32.sqrt()]);
/// ```
pub fn chol(n: usize, a: &[f32], regularization: &[f32], l: &mut [f32]) {
    for j in 0..n {
        let mut s = a[dense_index(n, j, j)] + regularization[j];

        for k in 0..j {
            let r = l[dense_index(n, j, k)];
            s -= r * r;
        }

        // NaN for a non-positive pivot, by contract
        let s = s.sqrt();
        let inv_s = 1.0 / s;

        l[dense_index(n, j, j)] = s;

        for i in (j + 1)..n {
            let mut t = a[dense_index(n, i, j)];

            for k in 0..j {
                t -= l[dense_index(n, i, k)] * l[dense_index(n, j, k)];
            }

            l[dense_index(n, i, j)] = t * inv_s;
        }

        for k in (j + 1)..n {
            l[dense_index(n, j, k)] = 0.0;
        }
    }
}

/// Batched factorization of batch element `batch`, writing into the shared `l` buffer
pub fn chol_batched(
    batch: usize,
    desc: &CholeskyBatch<'_>,
    a: &[f32],
    regularization: &[f32],
    l: &mut [f32],
) {
    let n = desc.dim[batch];
    let start = desc.start[batch];
    chol_batched_block(batch, desc, a, regularization, &mut l[start..start + n * n]);
}

/// Batched factorization of batch element `batch` into its already-split L block
pub fn chol_batched_block(
    batch: usize,
    desc: &CholeskyBatch<'_>,
    a: &[f32],
    regularization: &[f32],
    l_block: &mut [f32],
) {
    chol(
        desc.dim[batch],
        &a[desc.start[batch]..],
        &regularization[desc.reg_offset(batch)..],
        l_block,
    );
}

/// Adjoint of [`chol`]: deliberately a no-op.
///
/// Gradient flow through factorize-then-solve goes entirely through
/// [`crate::solve::adj_solve`]. Do not fill this in.
#[inline(always)]
pub fn adj_chol(
    _n: usize,
    _a: &[f32],
    _regularization: &[f32],
    _l: &[f32],
    _adj_a: &mut [f32],
    _adj_regularization: &mut [f32],
    _adj_l: &[f32],
) {
}

/// Adjoint of [`chol_batched`]: deliberately a no-op, see [`adj_chol`]
#[allow(clippy::too_many_arguments)]
#[inline(always)]
pub fn adj_chol_batched(
    _batch: usize,
    _desc: &CholeskyBatch<'_>,
    _a: &[f32],
    _regularization: &[f32],
    _l: &[f32],
    _adj_a: &mut [f32],
    _adj_regularization: &mut [f32],
    _adj_l: &[f32],
) {
}
