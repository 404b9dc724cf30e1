//! Host-side launch drivers for batched primitives
//!
//! A hosting runtime normally decides how batch elements map to execution
//! lanes. These drivers are the in-crate version of that runtime: each one
//! validates its descriptors once, splits every per-element output into a
//! disjoint block (see [`crate::arena`]), and then runs the batched primitive
//! for every element, either in order on the calling thread or as one rayon
//! task per element. GEMM goes one step further and runs one task per lane of
//! each element's lane group.
//!
//! Sequential launches are bit-identical to calling the single-instance
//! primitive per element. Parallel launches are too, except for the MLP
//! adjoint, whose shared weight and bias gradients are summed through
//! [`AtomicGrad`] and are therefore equal only up to floating-point rounding.
//!
//! # Example
//!
//! ```
//! use trueno_dense::batch::GemmBatch;
//! use trueno_dense::config::LaunchConfig;
//! use trueno_dense::gemm::{GemmMode, Transpose};
//! use trueno_dense::launch::launch_gemm;
//!
//! // Two 1x1 products packed side by side
//! let desc = GemmBatch {
//!     m: &[1, 1],
//!     n: &[1, 1],
//!     p: &[1, 1],
//!     a_start: &[0, 1],
//!     b_start: &[0, 1],
//!     c_start: &[0, 1],
//! };
//! let mut c = [0.0; 2];
//! launch_gemm(&LaunchConfig::new(), &desc, Transpose::No, Transpose::No,
//!             &[2.0, 3.0], &[4.0, 5.0], &mut c, GemmMode::Overwrite).unwrap();
//! assert_eq!(c, [8.0, 15.0]);
//! ```

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::arena::split_blocks_mut;
use crate::batch::{CholeskyBatch, GemmBatch, SolveBatch};
use crate::cholesky::chol_batched_block;
use crate::config::{LaunchConfig, Schedule};
use crate::error::{DenseError, Result};
use crate::gemm::{adj_gemm_batched_block, gemm_into_rows, GemmMode, Transpose};
#[cfg(feature = "parallel")]
use crate::grad::AtomicGrad;
#[cfg(feature = "parallel")]
use crate::mlp::preactivation;
use crate::mlp::{adj_mlp_with_layout, mlp_with_layout, Activation, SampleLayout};
use crate::solve::{adj_solve_batched_block, solve_batched_block};
use crate::view::{ArrayView, ArrayViewMut};

/// Run `f(index, item)` for every item, in order or on the rayon pool
fn for_each_batch<T, F>(schedule: Schedule, items: Vec<T>, f: F)
where
    T: Send,
    F: Fn(usize, T) + Send + Sync,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(?schedule, batches = items.len(), "dispatch");

    match schedule {
        #[cfg(feature = "parallel")]
        Schedule::Parallel => {
            use rayon::prelude::*;
            items
                .into_par_iter()
                .enumerate()
                .for_each(|(batch, item)| f(batch, item));
        }
        _ => {
            for (batch, item) in items.into_iter().enumerate() {
                f(batch, item);
            }
        }
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(DenseError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Batched GEMM over every element of `desc`.
///
/// Each element is shared by a group of `config.gemm_lanes_per_group` lanes:
/// lane `r` of the group owns the output rows congruent to `r` modulo the
/// group size, matching [`crate::gemm::gemm_batched_lane`]. Lanes whose group
/// index is at least the element's row count have no work and are not
/// scheduled. The result is bit-identical for every group size.
///
/// # Errors
///
/// Descriptor validation errors, plus `OverlappingBlocks` when two C blocks
/// share storage.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batches = desc.len(), t1 = ?t1, t2 = ?t2, mode = ?mode)))]
#[allow(clippy::too_many_arguments)]
pub fn launch_gemm(
    config: &LaunchConfig,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    mode: GemmMode,
) -> Result<()> {
    desc.validate(a.len(), b.len(), c.len())?;
    let lens: Vec<usize> = (0..desc.len()).map(|k| desc.block_lens(k).2).collect();
    let blocks = split_blocks_mut(c, desc.c_start, &lens)?;

    let map = config.gemm_lane_map();
    let group = map.lanes_per_batch();
    let mut lanes = Vec::with_capacity(desc.len());
    for (batch, block) in blocks.into_iter().enumerate() {
        let (m, n, _) = desc.dims(batch);
        if n == 0 {
            continue;
        }
        let mut rows: Vec<Vec<(usize, &mut [f32])>> = (0..group.min(m)).map(|_| Vec::new()).collect();
        for (i, row) in block.chunks_mut(n).enumerate() {
            rows[i % group].push((i, row));
        }
        lanes.extend(rows.into_iter().map(|lane_rows| (batch, lane_rows)));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(lanes_per_group = group, lanes = lanes.len(), "gemm lanes");

    for_each_batch(config.schedule_for(desc.len()), lanes, |_, (batch, lane_rows)| {
        let (m, n, p) = desc.dims(batch);
        gemm_into_rows(
            lane_rows,
            m,
            n,
            p,
            t1,
            t2,
            &a[desc.a_start[batch]..],
            &b[desc.b_start[batch]..],
            mode,
        );
    });
    Ok(())
}

/// Batched GEMM adjoint over every element of `desc`.
///
/// # Errors
///
/// Descriptor validation errors, plus `OutOfBounds`/`OverlappingBlocks` for
/// the gradient buffers.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batches = desc.len(), t1 = ?t1, t2 = ?t2)))]
#[allow(clippy::too_many_arguments)]
pub fn launch_adj_gemm(
    config: &LaunchConfig,
    desc: &GemmBatch<'_>,
    t1: Transpose,
    t2: Transpose,
    a: &[f32],
    b: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_c: &[f32],
) -> Result<()> {
    desc.validate(a.len(), b.len(), adj_c.len())?;
    let (a_lens, b_lens): (Vec<usize>, Vec<usize>) = (0..desc.len())
        .map(|k| {
            let (a_len, b_len, _) = desc.block_lens(k);
            (a_len, b_len)
        })
        .unzip();
    let adj_a_blocks = split_blocks_mut(adj_a, desc.a_start, &a_lens)?;
    let adj_b_blocks = split_blocks_mut(adj_b, desc.b_start, &b_lens)?;
    let items: Vec<_> = adj_a_blocks.into_iter().zip(adj_b_blocks).collect();

    for_each_batch(config.schedule_for(desc.len()), items, |batch, (ga, gb)| {
        adj_gemm_batched_block(batch, desc, t1, t2, a, b, ga, gb, adj_c);
    });
    Ok(())
}

/// Batched Cholesky factorization over every element of `desc`.
///
/// # Errors
///
/// Descriptor validation errors, plus `OutOfBounds`/`OverlappingBlocks` for
/// the L buffer.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batches = desc.len())))]
pub fn launch_chol(
    config: &LaunchConfig,
    desc: &CholeskyBatch<'_>,
    a: &[f32],
    regularization: &[f32],
    l: &mut [f32],
) -> Result<()> {
    desc.validate(a.len(), regularization.len())?;
    let lens: Vec<usize> = desc.dim.iter().map(|&n| n * n).collect();
    let blocks = split_blocks_mut(l, desc.start, &lens)?;

    for_each_batch(config.schedule_for(desc.len()), blocks, |batch, block| {
        chol_batched_block(batch, desc, a, regularization, block);
    });
    Ok(())
}

/// Batched solve over every element of `desc`.
///
/// # Errors
///
/// Descriptor validation errors (against both `a` and `l`), plus
/// `OutOfBounds`/`OverlappingBlocks` for the x buffer.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batches = desc.len())))]
pub fn launch_solve(
    config: &LaunchConfig,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    x: &mut [f32],
) -> Result<()> {
    desc.validate(a.len(), b.len())?;
    desc.validate(l.len(), b.len())?;
    let blocks = split_blocks_mut(x, desc.b_start, desc.dim)?;

    for_each_batch(config.schedule_for(desc.len()), blocks, |batch, block| {
        solve_batched_block(batch, desc, a, l, b, block);
    });
    Ok(())
}

/// Batched solve adjoint over every element of `desc`.
///
/// `tmp` is per-element scratch laid out like `b`.
///
/// # Errors
///
/// Descriptor validation errors, plus `OutOfBounds`/`OverlappingBlocks` for
/// the scratch and gradient buffers.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batches = desc.len())))]
#[allow(clippy::too_many_arguments)]
pub fn launch_adj_solve(
    config: &LaunchConfig,
    desc: &SolveBatch<'_>,
    a: &[f32],
    l: &[f32],
    b: &[f32],
    tmp: &mut [f32],
    x: &[f32],
    adj_a: &mut [f32],
    adj_b: &mut [f32],
    adj_x: &[f32],
) -> Result<()> {
    desc.validate(l.len(), b.len())?;
    desc.validate(a.len(), x.len())?;
    desc.validate(a.len(), adj_x.len())?;
    let a_lens: Vec<usize> = desc.dim.iter().map(|&n| n * n).collect();
    let tmp_blocks = split_blocks_mut(tmp, desc.b_start, desc.dim)?;
    let adj_a_blocks = split_blocks_mut(adj_a, desc.a_start, &a_lens)?;
    let adj_b_blocks = split_blocks_mut(adj_b, desc.b_start, desc.dim)?;
    let items: Vec<_> = tmp_blocks
        .into_iter()
        .zip(adj_a_blocks)
        .zip(adj_b_blocks)
        .collect();

    for_each_batch(
        config.schedule_for(desc.len()),
        items,
        |batch, ((t, ga), gb)| {
            adj_solve_batched_block(batch, desc, a, l, b, t, x, ga, gb, adj_x);
        },
    );
    Ok(())
}

/// Shape checks shared by the MLP drivers; returns `(m, n, batch)`
fn check_mlp_shapes(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    x: &ArrayView<'_>,
    out_shape: [usize; 2],
    layout: SampleLayout,
) -> Result<(usize, usize, usize)> {
    let [m, n] = weights.shape();
    check_len(m, bias.data().len())?;

    let (features, batch) = match layout {
        SampleLayout::Strided => (x.rows(), x.cols()),
        SampleLayout::Contiguous => (x.cols(), x.rows()),
    };
    if features != n {
        return Err(DenseError::InvalidInput(format!(
            "layer input has {features} features, weights expect {n}"
        )));
    }

    let expected_out = match layout {
        SampleLayout::Strided => [m, batch],
        SampleLayout::Contiguous => [batch, m],
    };
    if out_shape != expected_out {
        return Err(DenseError::InvalidInput(format!(
            "layer output is {}x{}, expected {}x{}",
            out_shape[0], out_shape[1], expected_out[0], expected_out[1]
        )));
    }
    Ok((m, n, batch))
}

/// Evaluate a fully-connected layer for every sample of `x`.
///
/// Under a parallel schedule each sample's output is computed on its own task
/// and scattered into `out` afterwards.
///
/// # Errors
///
/// `SizeMismatch` for a short bias, `InvalidInput` when `x` or `out` do not
/// match the weight shape.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(shape = ?weights.shape(), layout = ?layout)))]
pub fn launch_mlp<A>(
    config: &LaunchConfig,
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    x: &ArrayView<'_>,
    out: &mut ArrayViewMut<'_>,
    layout: SampleLayout,
) -> Result<()>
where
    A: Activation + Sync + ?Sized,
{
    let (m, _, batch) = check_mlp_shapes(weights, bias, x, out.shape(), layout)?;

    let schedule = config.schedule_for(batch);
    #[cfg(feature = "tracing")]
    tracing::debug!(?schedule, batch, "mlp forward");

    match schedule {
        #[cfg(feature = "parallel")]
        Schedule::Parallel => {
            use rayon::prelude::*;
            let columns: Vec<Vec<f32>> = (0..batch)
                .into_par_iter()
                .map(|k| {
                    (0..m)
                        .map(|i| activation.forward(preactivation(weights, bias, k, x, layout, i)))
                        .collect()
                })
                .collect();

            let data = out.data_mut();
            for (k, column) in columns.iter().enumerate() {
                for (i, &v) in column.iter().enumerate() {
                    data[layout.offset(batch, m, k, i)] = v;
                }
            }
        }
        _ => {
            for k in 0..batch {
                mlp_with_layout(weights, bias, activation, k, x, out, layout);
            }
        }
    }
    Ok(())
}

/// Adjoint of [`launch_mlp`] over every sample of `x`.
///
/// Each present gradient buffer is accumulated into. Under a parallel schedule
/// the samples run concurrently against [`AtomicGrad`] accumulators, which are
/// folded into the caller's buffers once every task has finished.
///
/// # Errors
///
/// Shape errors as for [`launch_mlp`], plus `SizeMismatch` for a gradient or
/// `adj_out` buffer shorter than its primal.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(shape = ?weights.shape(), layout = ?layout)))]
#[allow(clippy::too_many_arguments)]
pub fn launch_adj_mlp<A>(
    config: &LaunchConfig,
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    x: &ArrayView<'_>,
    mut adj_weights: Option<&mut [f32]>,
    mut adj_bias: Option<&mut [f32]>,
    mut adj_x: Option<&mut [f32]>,
    adj_out: Option<&[f32]>,
    layout: SampleLayout,
) -> Result<()>
where
    A: Activation + Sync + ?Sized,
{
    let out_shape = match layout {
        SampleLayout::Strided => [weights.rows(), layout.batch_size(x)],
        SampleLayout::Contiguous => [layout.batch_size(x), weights.rows()],
    };
    let (m, n, batch) = check_mlp_shapes(weights, bias, x, out_shape, layout)?;

    if let Some(g) = adj_weights.as_deref() {
        check_len(m * n, g.len())?;
    }
    if let Some(g) = adj_bias.as_deref() {
        check_len(m, g.len())?;
    }
    if let Some(g) = adj_x.as_deref() {
        check_len(n * batch, g.len())?;
    }
    if let Some(g) = adj_out {
        check_len(m * batch, g.len())?;
    }

    let schedule = config.schedule_for(batch);
    #[cfg(feature = "tracing")]
    tracing::debug!(?schedule, batch, "mlp adjoint");

    match schedule {
        #[cfg(feature = "parallel")]
        Schedule::Parallel => {
            use rayon::prelude::*;
            let shared_w = adj_weights.as_ref().map(|_| AtomicGrad::zeros(m * n));
            let shared_b = adj_bias.as_ref().map(|_| AtomicGrad::zeros(m));
            let shared_x = adj_x.as_ref().map(|_| AtomicGrad::zeros(n * batch));

            (0..batch).into_par_iter().for_each(|k| {
                adj_mlp_with_layout(
                    weights,
                    bias,
                    activation,
                    k,
                    x,
                    shared_w.as_ref(),
                    shared_b.as_ref(),
                    shared_x.as_ref(),
                    adj_out,
                    layout,
                );
            });

            fold(shared_w.as_ref(), adj_weights);
            fold(shared_b.as_ref(), adj_bias);
            fold(shared_x.as_ref(), adj_x);
        }
        _ => {
            for k in 0..batch {
                adj_mlp_with_layout(
                    weights,
                    bias,
                    activation,
                    k,
                    x,
                    adj_weights.as_deref_mut(),
                    adj_bias.as_deref_mut(),
                    adj_x.as_deref_mut(),
                    adj_out,
                    layout,
                );
            }
        }
    }
    Ok(())
}

/// Add a parallel pass's accumulated gradient into the caller's buffer
#[cfg(feature = "parallel")]
fn fold(shared: Option<&AtomicGrad>, dst: Option<&mut [f32]>) {
    if let (Some(shared), Some(dst)) = (shared, dst) {
        shared.accumulate_into(dst);
    }
}
