//! Triangular substitution and the factor-based linear solve
//!
//! Given the Cholesky factor `L` of `A` (see [`crate::cholesky::chol`]),
//! [`subst`] solves `L L^T x = b` by forward substitution (`L y = b`) followed
//! by backward substitution (`L^T x = y`), each O(n²).
//!
//! [`adj_solve`] is the one adjoint in the factorize/substitute/solve family
//! that does real work. Since `A` is symmetric, `dL/db = A^-T adj_x = A^-1 adj_x`,
//! which is one more substitution through the same factor, and
//! `dL/dA = -(dL/db) x^T`. [`adj_subst`] and the factorization adjoints are
//! no-ops so that this rule is the only path gradients take.

use crate::batch::SolveBatch;
use crate::index::dense_index;

/// Solve `L L^T x = b` for `x` given the lower-triangular factor `l` (`n x n`).
///
/// `x` is used as the intermediate `y` of the forward pass, so no scratch is
/// needed. `x` must not alias `b`.
///
/// # Example
///
/// ```
/// use trueno_dense::solve::subst;
///
/// // A = [[4, 2], [2, 3]] = L L^T with L = [[2, 0], [1, sqrt(2)]]
/// let l = [2.0, 0.0, 1.0, 2.0f32.sqrt()];
/// let b = [8.0, 7.0];
/// let mut x = [0.0; 2];
/// subst(2, &l, &b, &mut x);
/// assert!((x[0] - 1.25).abs() < 1e-6);
/// assert!((x[1] - 1.5).abs() < 1e-6);
/// ```
pub fn subst(n: usize, l: &[f32], b: &[f32], x: &mut [f32]) {
    // forward: L y = b
    for i in 0..n {
        let mut s = b[i];

        for j in 0..i {
            s -= l[dense_index(n, i, j)] * x[j];
        }

        x[i] = s / l[dense_index(n, i, i)];
    }

    // backward: L^T x = y
    for i in (0..n).rev() {
        let mut s = x[i];

        for j in (i + 1)..n {
            s -= l[dense_index(n, j, i)] * x[j];
        }

        x[i] = s / l[dense_index(n, i, i)];
    }
}

/// Adjoint of [`subst`]: deliberately a no-op.
///
/// Gradients through factorize-then-solve are produced by [`adj_solve`] alone.
#[inline(always)]
pub fn adj_subst(
    _n: usize,
    _l: &[f32],
    _b: &[f32],
    _x: &[f32],
    _adj_l: &mut [f32],
    _adj_b: &mut [f32],
    _adj_x: &[f32],
) {
}

/// Solve `A x = b` given `l`, the Cholesky factor of `A`.
///
/// `a` and `tmp` are not read by the forward pass; they are part of the
/// signature so that it mirrors [`adj_solve`], which needs both.
pub fn solve(n: usize, _a: &[f32], l: &[f32], b: &[f32], _tmp: &mut [f32], x: &mut [f32]) {
    subst(n, l, b, x);
}

/// Batched solve for batch element `batch`, writing into the shared `x` buffer
pub fn solve_batched(
    batch: usize,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    x: &mut [f32],
) {
    let n = desc.dim[batch];
    let b_start = desc.b_start[batch];
    solve_batched_block(batch, desc, a, l, b, &mut x[b_start..b_start + n]);
}

/// Batched solve for batch element `batch`, writing into its already-split `x` block
pub fn solve_batched_block(
    batch: usize,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    x_block: &mut [f32],
) {
    let a_start = desc.a_start[batch];
    // `a` is never read, so callers may pass an empty buffer
    solve(
        desc.dim[batch],
        a.get(a_start..).unwrap_or(&[]),
        &l[a_start..],
        &b[desc.b_start[batch]..],
        &mut [],
        x_block,
    );
}

/// Adjoint of [`solve`].
///
/// Overwrites `tmp` (length `n`) with `A^-1 adj_x`, then accumulates
/// `adj_b += tmp` and `adj_a[i, j] += -tmp[i] * x[j]`. `x` must be the primal
/// solution from the forward pass and `l` the same factor it used.
#[allow(clippy::too_many_arguments)]
pub fn adj_solve(
    n: usize,
    _a: &[f32],
    l: &[f32],
    _b: &[f32],
    tmp: &mut [f32],
    x: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_x: &[f32],
) {
    tmp[..n].fill(0.0);

    subst(n, l, adj_x, tmp);

    for i in 0..n {
        adj_b[i] += tmp[i];
    }

    for i in 0..n {
        for j in 0..n {
            adj_a[dense_index(n, i, j)] -= tmp[i] * x[j];
        }
    }
}

/// Adjoint of [`solve_batched`] for batch element `batch`, over shared buffers.
///
/// `tmp`, `x`, `adj_b` and `adj_x` are addressed by `b_start`, `adj_a` by
/// `a_start`.
#[allow(clippy::too_many_arguments)]
pub fn adj_solve_batched(
    batch: usize,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    tmp: &mut [f32],
    x: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_x: &[f32],
) {
    let n = desc.dim[batch];
    let a_start = desc.a_start[batch];
    let b_start = desc.b_start[batch];
    adj_solve_batched_block(
        batch,
        desc,
        a,
        l,
        b,
        &mut tmp[b_start..b_start + n],
        x,
        &mut adj_a[a_start..a_start + n * n],
        &mut adj_b[b_start..b_start + n],
        adj_x,
    );
}

/// Adjoint of [`solve_batched`] writing into already-split scratch and gradient blocks
#[allow(clippy::too_many_arguments)]
pub fn adj_solve_batched_block(
    batch: usize,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    tmp_block: &mut [f32],
    x: &[f32],
    adj_a_block: &mut [f32],
    adj_b_block: &mut [f32],
    adj_x: &[f32],
) {
    let a_start = desc.a_start[batch];
    let b_start = desc.b_start[batch];
    adj_solve(
        desc.dim[batch],
        a.get(a_start..).unwrap_or(&[]),
        &l[a_start..],
        b.get(b_start..).unwrap_or(&[]),
        tmp_block,
        &x[b_start..],
        adj_a_block,
        adj_b_block,
        &adj_x[b_start..],
    );
}
