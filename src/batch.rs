//! Batch descriptor tables and lane-to-batch mapping
//!
//! A batch packs independently sized dense blocks into shared flat buffers. The
//! descriptors here are parallel tables (one entry per batch element) giving
//! each element's dimensions and the start offset of each of its blocks.
//!
//! Descriptors borrow their tables from the caller. The kernels trust them
//! completely; `validate` is provided for callers (and the launch drivers) that
//! want to check them once up front.

use crate::error::{DenseError, Result};

/// Number of lanes that cooperate on one GEMM batch element
pub const GEMM_LANES_PER_GROUP: usize = 256;

/// Explicit ratio between execution lanes and batch elements
///
/// Most primitives run one batch element per lane; GEMM runs one batch element
/// per group of [`GEMM_LANES_PER_GROUP`] lanes, each lane computing a strided
/// subset of the output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneMap {
    lanes_per_batch: usize,
}

impl LaneMap {
    /// One lane per batch element
    pub const PER_LANE: LaneMap = LaneMap { lanes_per_batch: 1 };

    /// One group of `GEMM_LANES_PER_GROUP` lanes per batch element
    pub const GEMM: LaneMap = LaneMap {
        lanes_per_batch: GEMM_LANES_PER_GROUP,
    };

    /// Custom ratio. A ratio of zero is treated as one.
    pub fn grouped(lanes_per_batch: usize) -> Self {
        Self {
            lanes_per_batch: lanes_per_batch.max(1),
        }
    }

    /// Lanes assigned to each batch element
    pub fn lanes_per_batch(&self) -> usize {
        self.lanes_per_batch
    }

    /// Batch element that `lane` works on
    #[inline]
    pub fn batch_of(&self, lane: usize) -> usize {
        lane / self.lanes_per_batch
    }

    /// Position of `lane` within its group
    #[inline]
    pub fn lane_in_group(&self, lane: usize) -> usize {
        lane % self.lanes_per_batch
    }

    /// Total lanes needed to cover `batches` elements
    pub fn lane_count(&self, batches: usize) -> usize {
        batches * self.lanes_per_batch
    }
}

fn check_table(name: &str, table: &[usize], expected: usize) -> Result<()> {
    if table.len() != expected {
        return Err(DenseError::InvalidInput(format!(
            "descriptor table `{name}` has {} entries, expected {expected}",
            table.len()
        )));
    }
    Ok(())
}

/// `len` is `None` when the block size itself overflowed `usize`
fn check_extent(batch: usize, start: usize, len: Option<usize>, buffer_len: usize) -> Result<()> {
    match len.and_then(|len| start.checked_add(len)) {
        Some(end) if end <= buffer_len => Ok(()),
        end => Err(DenseError::OutOfBounds {
            batch,
            end: end.unwrap_or(usize::MAX),
            len: buffer_len,
        }),
    }
}

/// Descriptor for batched GEMM: `C[k] (m x n) = op(A[k]) (m x p) * op(B[k]) (p x n)`
#[derive(Debug, Clone, Copy)]
pub struct GemmBatch<'a> {
    /// Rows of each output block
    pub m: &'a [usize],
    /// Columns of each output block
    pub n: &'a [usize],
    /// Inner dimension of each product
    pub p: &'a [usize],
    /// Start of each A block
    pub a_start: &'a [usize],
    /// Start of each B block
    pub b_start: &'a [usize],
    /// Start of each C block
    pub c_start: &'a [usize],
}

impl GemmBatch<'_> {
    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    /// `(m, n, p)` of batch element `batch`
    #[inline]
    pub fn dims(&self, batch: usize) -> (usize, usize, usize) {
        (self.m[batch], self.n[batch], self.p[batch])
    }

    /// Element counts of the A, B and C blocks of `batch`
    pub fn block_lens(&self, batch: usize) -> (usize, usize, usize) {
        let (m, n, p) = self.dims(batch);
        (m * p, p * n, m * n)
    }

    /// Check table lengths and that every block fits its buffer.
    ///
    /// # Errors
    ///
    /// `EmptyBatch`, `InvalidInput` for ragged tables, `OutOfBounds` for blocks
    /// past the end of `a_len`, `b_len` or `c_len`.
    pub fn validate(&self, a_len: usize, b_len: usize, c_len: usize) -> Result<()> {
        let count = self.len();
        if count == 0 {
            return Err(DenseError::EmptyBatch);
        }
        check_table("n", self.n, count)?;
        check_table("p", self.p, count)?;
        check_table("a_start", self.a_start, count)?;
        check_table("b_start", self.b_start, count)?;
        check_table("c_start", self.c_start, count)?;

        for batch in 0..count {
            let (m, n, p) = self.dims(batch);
            check_extent(batch, self.a_start[batch], m.checked_mul(p), a_len)?;
            check_extent(batch, self.b_start[batch], p.checked_mul(n), b_len)?;
            check_extent(batch, self.c_start[batch], m.checked_mul(n), c_len)?;
        }
        Ok(())
    }
}

/// Descriptor for batched Cholesky factorization of square blocks
#[derive(Debug, Clone, Copy)]
pub struct CholeskyBatch<'a> {
    /// Order of each block
    pub dim: &'a [usize],
    /// Start of each A (and L) block
    pub start: &'a [usize],
    /// Start of each element's regularization vector.
    ///
    /// When `None`, element `k` reads its regularization at `dim[k] * k`,
    /// which is only meaningful when every block has the same order.
    pub reg_start: Option<&'a [usize]>,
}

impl CholeskyBatch<'_> {
    pub fn len(&self) -> usize {
        self.dim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dim.is_empty()
    }

    /// Offset of batch element `batch`'s regularization vector
    #[inline]
    pub fn reg_offset(&self, batch: usize) -> usize {
        match self.reg_start {
            Some(starts) => starts[batch],
            None => self.dim[batch] * batch,
        }
    }

    /// Check table lengths and that every block fits its buffer.
    ///
    /// # Errors
    ///
    /// `EmptyBatch`, `InvalidInput` for ragged tables, `OutOfBounds` for blocks
    /// past the end of `a_len` or regularization vectors past `reg_len`.
    pub fn validate(&self, a_len: usize, reg_len: usize) -> Result<()> {
        let count = self.len();
        if count == 0 {
            return Err(DenseError::EmptyBatch);
        }
        check_table("start", self.start, count)?;
        if let Some(reg) = self.reg_start {
            check_table("reg_start", reg, count)?;
        }

        for batch in 0..count {
            let n = self.dim[batch];
            check_extent(batch, self.start[batch], n.checked_mul(n), a_len)?;
            let reg = match self.reg_start {
                Some(starts) => Some(starts[batch]),
                None => n.checked_mul(batch),
            };
            match reg {
                Some(offset) => check_extent(batch, offset, Some(n), reg_len)?,
                None => check_extent(batch, usize::MAX, None, reg_len)?,
            }
        }
        Ok(())
    }
}

/// Descriptor for batched solves `A[k] x[k] = b[k]`
#[derive(Debug, Clone, Copy)]
pub struct SolveBatch<'a> {
    /// Order of each system
    pub dim: &'a [usize],
    /// Start of each A (and L) block
    pub a_start: &'a [usize],
    /// Start of each right-hand side (and solution, and scratch) vector
    pub b_start: &'a [usize],
}

impl SolveBatch<'_> {
    pub fn len(&self) -> usize {
        self.dim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dim.is_empty()
    }

    /// Check table lengths and that every block fits its buffer.
    ///
    /// # Errors
    ///
    /// `EmptyBatch`, `InvalidInput` for ragged tables, `OutOfBounds` for blocks
    /// past the end of `a_len` or vectors past `b_len`.
    pub fn validate(&self, a_len: usize, b_len: usize) -> Result<()> {
        let count = self.len();
        if count == 0 {
            return Err(DenseError::EmptyBatch);
        }
        check_table("a_start", self.a_start, count)?;
        check_table("b_start", self.b_start, count)?;

        for batch in 0..count {
            let n = self.dim[batch];
            check_extent(batch, self.a_start[batch], n.checked_mul(n), a_len)?;
            check_extent(batch, self.b_start[batch], Some(n), b_len)?;
        }
        Ok(())
    }
}
