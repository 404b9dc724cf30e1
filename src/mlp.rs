//! Fully-connected layer evaluation and its adjoint
//!
//! `out[:, k] = activation(W x[:, k] + bias)` for one batch sample `k`, with the
//! bias add and activation fused into the row loop.
//!
//! The forward pass stores nothing besides `out`; the adjoint recomputes each
//! pre-activation.
//!
//! # Sample layouts
//!
//! - [`SampleLayout::Strided`]: samples are columns. `x` is `n x batch`,
//!   `out` is `m x batch`, and feature `j` of sample `k` lives at `k + batch * j`.
//! - [`SampleLayout::Contiguous`]: samples are rows. `x` is `batch x n`,
//!   `out` is `batch x m`, and feature `j` of sample `k` lives at `k * n + j`.

use crate::grad::GradSink;
use crate::index::dense_index;
use crate::view::{ArrayView, ArrayViewMut};

/// Scalar activation with a hand-written derivative
pub trait Activation {
    /// `post = f(pre)`
    fn forward(&self, pre: f32) -> f32;

    /// Accumulate `adj_post * f'(pre)` into `adj_pre`
    fn adjoint(&self, pre: f32, adj_pre: &mut f32, adj_post: f32);
}

/// `f(x) = x`
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

/// `f(x) = max(0, x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

/// `f(x) = tanh(x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

/// `f(x) = 1 / (1 + e^-x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Identity {
    #[inline]
    fn forward(&self, pre: f32) -> f32 {
        pre
    }

    #[inline]
    fn adjoint(&self, _pre: f32, adj_pre: &mut f32, adj_post: f32) {
        *adj_pre += adj_post;
    }
}

impl Activation for Relu {
    #[inline]
    fn forward(&self, pre: f32) -> f32 {
        pre.max(0.0)
    }

    #[inline]
    fn adjoint(&self, pre: f32, adj_pre: &mut f32, adj_post: f32) {
        if pre > 0.0 {
            *adj_pre += adj_post;
        }
    }
}

impl Activation for Tanh {
    #[inline]
    fn forward(&self, pre: f32) -> f32 {
        pre.tanh()
    }

    #[inline]
    fn adjoint(&self, pre: f32, adj_pre: &mut f32, adj_post: f32) {
        let t = pre.tanh();
        *adj_pre += adj_post * (1.0 - t * t);
    }
}

impl Activation for Sigmoid {
    #[inline]
    fn forward(&self, pre: f32) -> f32 {
        1.0 / (1.0 + (-pre).exp())
    }

    #[inline]
    fn adjoint(&self, pre: f32, adj_pre: &mut f32, adj_post: f32) {
        let s = self.forward(pre);
        *adj_pre += adj_post * s * (1.0 - s);
    }
}

/// Activation built from a pair of closures
///
/// # Example
///
/// ```
/// use trueno_dense::mlp::{Activation, FnActivation};
///
/// let square = FnActivation::new(|x| x * x, |x, adj_x: &mut f32, adj_y| *adj_x += 2.0 * x * adj_y);
/// assert_eq!(square.forward(3.0), 9.0);
///
/// let mut adj = 1.0;
/// square.adjoint(3.0, &mut adj, 0.5);
/// assert_eq!(adj, 4.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnActivation<F, G> {
    forward: F,
    adjoint: G,
}

impl<F, G> FnActivation<F, G>
where
    F: Fn(f32) -> f32,
    G: Fn(f32, &mut f32, f32),
{
    /// Wrap `forward` and its adjoint `adjoint(pre, &mut adj_pre, adj_post)`
    pub fn new(forward: F, adjoint: G) -> Self {
        Self { forward, adjoint }
    }
}

impl<F, G> Activation for FnActivation<F, G>
where
    F: Fn(f32) -> f32,
    G: Fn(f32, &mut f32, f32),
{
    #[inline]
    fn forward(&self, pre: f32) -> f32 {
        (self.forward)(pre)
    }

    #[inline]
    fn adjoint(&self, pre: f32, adj_pre: &mut f32, adj_post: f32) {
        (self.adjoint)(pre, adj_pre, adj_post)
    }
}

/// How batch samples are laid out in the layer's input and output buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleLayout {
    /// One sample per column (`features x batch`)
    #[default]
    Strided,
    /// One sample per row (`batch x features`)
    Contiguous,
}

impl SampleLayout {
    /// Number of samples held by a view in this layout
    #[inline]
    pub fn batch_size(self, view: &ArrayView<'_>) -> usize {
        match self {
            SampleLayout::Strided => view.cols(),
            SampleLayout::Contiguous => view.rows(),
        }
    }

    /// Flat offset of feature `j` of sample `index`
    #[inline]
    pub fn offset(self, batch: usize, features: usize, index: usize, j: usize) -> usize {
        match self {
            SampleLayout::Strided => index + batch * j,
            SampleLayout::Contiguous => dense_index(features, index, j),
        }
    }
}

/// `bias[i] + W[i, :] . x[:, index]` for output row `i`
#[inline]
pub(crate) fn preactivation(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    index: usize,
    x: &ArrayView<'_>,
    layout: SampleLayout,
    i: usize,
) -> f32 {
    let n = weights.cols();
    let batch = layout.batch_size(x);
    let w = weights.data();
    let xs = x.data();

    let mut tmp = bias.data()[i];
    for j in 0..n {
        tmp += w[dense_index(n, i, j)] * xs[layout.offset(batch, n, index, j)];
    }
    tmp
}

/// Evaluate the layer for sample `index` with samples stored as columns.
///
/// `weights` is `m x n`, `bias` has `m` entries, `x` is `n x batch` and `out`
/// is `m x batch`. Only column `index` of `out` is written.
///
/// # Example
///
/// ```
/// use trueno_dense::mlp::{mlp, Identity};
/// use trueno_dense::{ArrayView, ArrayViewMut};
///
/// let w = [1.0, 2.0, 3.0, 4.0];
/// let bias = [0.5, -0.5];
/// let x = [1.0, 1.0]; // one sample
/// let mut out = [0.0; 2];
///
/// let weights = ArrayView::new(2, 2, &w).unwrap();
/// let x_view = ArrayView::new(2, 1, &x).unwrap();
/// let mut out_view = ArrayViewMut::new(2, 1, &mut out).unwrap();
/// mlp(&weights, &ArrayView::vector(&bias), &Identity, 0, &x_view, &mut out_view);
///
/// assert_eq!(out, [3.5, 6.5]);
/// ```
pub fn mlp<A: Activation + ?Sized>(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    index: usize,
    x: &ArrayView<'_>,
    out: &mut ArrayViewMut<'_>,
) {
    mlp_with_layout(weights, bias, activation, index, x, out, SampleLayout::Strided);
}

/// [`mlp`] with an explicit [`SampleLayout`]
pub fn mlp_with_layout<A: Activation + ?Sized>(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    index: usize,
    x: &ArrayView<'_>,
    out: &mut ArrayViewMut<'_>,
    layout: SampleLayout,
) {
    let m = weights.rows();
    let batch = layout.batch_size(x);
    let out = out.data_mut();

    for i in 0..m {
        let pre = preactivation(weights, bias, index, x, layout, i);
        out[layout.offset(batch, m, index, i)] = activation.forward(pre);
    }
}

/// Adjoint of [`mlp`] for sample `index` with samples stored as columns.
///
/// Gradients are accumulated into whichever of `adj_weights` (`m x n`),
/// `adj_bias` (`m`) and `adj_x` (`n x batch`) are present; a `None` target
/// is skipped. With `adj_out` absent the local gradient is zero and nothing
/// is accumulated.
///
/// Different samples add into the same `adj_weights` and `adj_bias`
/// entries, so a parallel caller must pass shared sinks such as
/// [`crate::AtomicGrad`].
#[allow(clippy::too_many_arguments)]
pub fn adj_mlp<A, W, B, X>(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    index: usize,
    x: &ArrayView<'_>,
    adj_weights: Option<W>,
    adj_bias: Option<B>,
    adj_x: Option<X>,
    adj_out: Option<&[f32]>,
) where
    A: Activation + ?Sized,
    W: GradSink,
    B: GradSink,
    X: GradSink,
{
    adj_mlp_with_layout(
        weights,
        bias,
        activation,
        index,
        x,
        adj_weights,
        adj_bias,
        adj_x,
        adj_out,
        SampleLayout::Strided,
    );
}

/// [`adj_mlp`] with an explicit [`SampleLayout`]
#[allow(clippy::too_many_arguments)]
pub fn adj_mlp_with_layout<A, W, B, X>(
    weights: &ArrayView<'_>,
    bias: &ArrayView<'_>,
    activation: &A,
    index: usize,
    x: &ArrayView<'_>,
    mut adj_weights: Option<W>,
    mut adj_bias: Option<B>,
    mut adj_x: Option<X>,
    adj_out: Option<&[f32]>,
    layout: SampleLayout,
) where
    A: Activation + ?Sized,
    W: GradSink,
    B: GradSink,
    X: GradSink,
{
    let m = weights.rows();
    let n = weights.cols();
    let batch = layout.batch_size(x);
    let w = weights.data();
    let xs = x.data();

    for i in 0..m {
        let pre = preactivation(weights, bias, index, x, layout, i);

        let mut adj_f = 0.0f32;
        if let Some(adj_out) = adj_out {
            activation.adjoint(pre, &mut adj_f, adj_out[layout.offset(batch, m, index, i)]);
        }

        for j in 0..n {
            let x_idx = layout.offset(batch, n, index, j);

            if let Some(sink) = adj_weights.as_mut() {
                sink.accumulate(dense_index(n, i, j), xs[x_idx] * adj_f);
            }

            if let Some(sink) = adj_x.as_mut() {
                sink.accumulate(x_idx, w[dense_index(n, i, j)] * adj_f);
            }
        }

        if let Some(sink) = adj_bias.as_mut() {
            sink.accumulate(i, adj_f);
        }
    }
}
