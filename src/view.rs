//! Array views - shape plus borrowed storage
//!
//! An `ArrayView` is how a hosting runtime hands a buffer to the dense
//! primitives: a 2D shape descriptor and a reference to contiguous `f32`
//! storage. Views never own, reallocate or resize their data.
//!
//! Vectors are represented as `len x 1` views.

use std::fmt;

use crate::error::{DenseError, Result};
use crate::index::dense_index;

/// Read-only view over a contiguous row-major block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayView<'a> {
    shape: [usize; 2],
    data: &'a [f32],
}

/// Mutable view over a contiguous row-major block
#[derive(Debug, PartialEq)]
pub struct ArrayViewMut<'a> {
    shape: [usize; 2],
    data: &'a mut [f32],
}

fn check_len(rows: usize, cols: usize, len: usize) -> Result<()> {
    let expected = rows * cols;
    if len < expected {
        return Err(DenseError::SizeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

impl<'a> ArrayView<'a> {
    /// Create a `rows x cols` view over `data`.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `data.len() < rows * cols`.
    ///
    /// # Example
    ///
    /// ```
    /// use trueno_dense::ArrayView;
    ///
    /// let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    /// let v = ArrayView::new(2, 3, &data).unwrap();
    /// assert_eq!(v.shape(), [2, 3]);
    /// assert_eq!(v.get(1, 0), Some(4.0));
    /// ```
    pub fn new(rows: usize, cols: usize, data: &'a [f32]) -> Result<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            shape: [rows, cols],
            data,
        })
    }

    /// View a slice as a column vector (`len x 1`)
    pub fn vector(data: &'a [f32]) -> Self {
        Self {
            shape: [data.len(), 1],
            data,
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    /// Bounds-checked element access
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.shape[0] || j >= self.shape[1] {
            return None;
        }
        self.data.get(dense_index(self.shape[1], i, j)).copied()
    }
}

impl<'a> ArrayViewMut<'a> {
    /// Create a mutable `rows x cols` view over `data`.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `data.len() < rows * cols`.
    pub fn new(rows: usize, cols: usize, data: &'a mut [f32]) -> Result<Self> {
        check_len(rows, cols, data.len())?;
        Ok(Self {
            shape: [rows, cols],
            data,
        })
    }

    /// View a mutable slice as a column vector (`len x 1`)
    pub fn vector(data: &'a mut [f32]) -> Self {
        Self {
            shape: [data.len(), 1],
            data,
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn data(&self) -> &[f32] {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        self.data
    }

    /// Reborrow as a read-only view
    pub fn as_view(&self) -> ArrayView<'_> {
        ArrayView {
            shape: self.shape,
            data: self.data,
        }
    }

    /// Bounds-checked mutable element access
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut f32> {
        if i >= self.shape[0] || j >= self.shape[1] {
            return None;
        }
        self.data.get_mut(dense_index(self.shape[1], i, j))
    }
}

impl fmt::Display for ArrayView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rows, cols] = self.shape;
        write!(f, "[")?;
        for i in 0..rows {
            for j in 0..cols {
                write!(f, "{} ", self.data[dense_index(cols, i, j)])?;
            }
            write!(f, ";")?;
            if i + 1 < rows {
                writeln!(f)?;
            }
        }
        write!(f, "]")
    }
}

impl fmt::Display for ArrayViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_view(), f)
    }
}
