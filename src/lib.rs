//! Trueno Dense: Batched Dense Linear Algebra with Adjoints
//!
//! **Trueno Dense** provides small dense-matrix primitives meant to run once per
//! batch element inside a larger data-parallel computation, each paired with a
//! reverse-mode adjoint:
//!
//! 1. **GEMM** - `C = op(A) * op(B)` with independent transposes, overwrite or accumulate
//! 2. **Cholesky** - `L L^T = A + diag(reg)` without pivoting
//! 3. **Solve** - `A x = b` from a precomputed Cholesky factor
//! 4. **MLP layer** - `out = activation(W x + bias)` per sample
//!
//! # Design Principles
//!
//! - **Flat row-major buffers**: blocks are located by offset tables, never copied
//! - **Kernels don't allocate**: scratch space is supplied by the caller
//! - **Accumulating adjoints**: gradients are added into, never overwritten
//! - **Safe parallelism**: per-element outputs are split into disjoint blocks,
//!   shared gradients go through atomic sinks
//!
//! # Quick Start
//!
//! ```rust
//! use trueno_dense::cholesky::chol;
//! use trueno_dense::gemm::{gemm, GemmMode, Transpose};
//! use trueno_dense::solve::solve;
//!
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [5.0, 6.0, 7.0, 8.0];
//! let mut c = [0.0; 4];
//! gemm(2, 2, 2, Transpose::No, Transpose::No, &a, &b, &mut c, GemmMode::Overwrite);
//! assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
//!
//! // Solve [[4, 2], [2, 3]] x = [2, 1]
//! let spd = [4.0, 2.0, 2.0, 3.0];
//! let mut l = [0.0; 4];
//! chol(2, &spd, &[0.0, 0.0], &mut l);
//! let mut x = [0.0; 2];
//! solve(2, &spd, &l, &[2.0, 1.0], &mut [], &mut x);
//! assert!((x[0] - 0.5).abs() < 1e-6 && x[1].abs() < 1e-6);
//! ```

pub mod arena;
pub mod batch;
pub mod cholesky;
pub mod config;
pub mod error;
pub mod gemm;
pub mod grad;
pub mod index;
pub mod launch;
pub mod mlp;
pub mod solve;
pub mod view;

pub use batch::{CholeskyBatch, GemmBatch, LaneMap, SolveBatch};
pub use config::{LaunchConfig, Schedule};
pub use error::{DenseError, Result};
pub use gemm::{GemmMode, Transpose};
pub use grad::{AtomicGrad, GradSink};
pub use mlp::{Activation, SampleLayout};
pub use view::{ArrayView, ArrayViewMut};
