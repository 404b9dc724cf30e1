//! Gradient accumulation targets
//!
//! Adjoint primitives never overwrite a gradient, they add into it. Where that
//! addition happens depends on who else is writing:
//!
//! - `&mut [f32]`: exclusive access, plain `+=` (sequential schedule)
//! - `&AtomicGrad`: shared across tasks, atomic add (parallel schedule)
//!
//! Both implement [`GradSink`], so an adjoint is written once and works with
//! either. Optional targets are passed as `Option<S>`; `None` skips the
//! accumulation entirely.

use std::sync::atomic::{AtomicU32, Ordering};

/// Destination for accumulated partial derivatives
pub trait GradSink {
    /// Add `value` to the entry at `index`
    fn accumulate(&mut self, index: usize, value: f32);
}

impl GradSink for &mut [f32] {
    #[inline(always)]
    fn accumulate(&mut self, index: usize, value: f32) {
        self[index] += value;
    }
}

impl GradSink for &AtomicGrad {
    #[inline(always)]
    fn accumulate(&mut self, index: usize, value: f32) {
        self.add(index, value);
    }
}

/// A gradient buffer that many tasks can add into concurrently.
///
/// Each entry stores the bits of an `f32` in an `AtomicU32`; `add` is a
/// compare-and-swap loop, so concurrent additions to the same address are never
/// lost. The final value is independent of the order of additions up to
/// floating-point rounding.
///
/// # Example
///
/// ```
/// use trueno_dense::AtomicGrad;
///
/// let grad = AtomicGrad::zeros(3);
/// grad.add(1, 0.5);
/// grad.add(1, 0.25);
/// assert_eq!(grad.to_vec(), vec![0.0, 0.75, 0.0]);
/// ```
#[derive(Debug, Default)]
pub struct AtomicGrad {
    cells: Vec<AtomicU32>,
}

impl AtomicGrad {
    /// Zero-initialized buffer of `len` entries
    pub fn zeros(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
        }
    }

    /// Buffer seeded with existing gradient values
    pub fn from_slice(values: &[f32]) -> Self {
        Self {
            cells: values.iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Atomically add `value` to entry `index`
    #[inline]
    pub fn add(&self, index: usize, value: f32) {
        let cell = &self.cells[index];
        let mut current = cell.load(Ordering::Acquire);
        loop {
            let sum = (f32::from_bits(current) + value).to_bits();
            match cell.compare_exchange_weak(current, sum, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self, index: usize) -> f32 {
        f32::from_bits(self.cells[index].load(Ordering::Acquire))
    }

    /// Snapshot of every entry
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells
            .iter()
            .map(|c| f32::from_bits(c.load(Ordering::Acquire)))
            .collect()
    }

    /// Add every entry into `dst` (used to fold a parallel pass back into a
    /// caller-owned gradient buffer)
    pub fn accumulate_into(&self, dst: &mut [f32]) {
        for (d, c) in dst.iter_mut().zip(&self.cells) {
            *d += f32::from_bits(c.load(Ordering::Acquire));
        }
    }
}
