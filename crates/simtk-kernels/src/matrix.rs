//! Host-side column-major matrix.
//!
//! Element (r, c) of an R-row matrix lives at `c * R + r`. The sequential
//! helpers here are the reference the kernels are checked against.

use std::fmt;

use simtk_core::{DeviceBuffer, Result, SimtError};

#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self { rows, cols, data: vec![value; rows * cols] }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    pub fn from_col_major(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SimtError::LengthMismatch {
                left: "rows * cols",
                left_len: rows * cols,
                right: "data",
                right_len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from row-major data, e.g. a literal written row by row.
    pub fn from_row_major(rows: usize, cols: usize, data: &[f32]) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SimtError::LengthMismatch {
                left: "rows * cols",
                left_len: rows * cols,
                right: "data",
                right_len: data.len(),
            });
        }
        let mut m = Self::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, data[r * cols + c]);
            }
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[col * self.rows + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[col * self.rows + row] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn to_row_major(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.push(self.get(r, c));
            }
        }
        out
    }

    /// Copy into a new device buffer.
    pub fn upload(&self) -> DeviceBuffer<f32> {
        DeviceBuffer::from_host(&self.data)
    }

    /// Copy the first `rows * cols` elements of `buf` back into a matrix.
    pub fn download(buf: &DeviceBuffer<f32>, rows: usize, cols: usize) -> Result<Self> {
        let needed = rows * cols;
        if buf.len() < needed {
            return Err(SimtError::BufferTooSmall { name: "matrix", len: buf.len(), needed });
        }
        let mut data = buf.to_host();
        data.truncate(needed);
        Ok(Self { rows, cols, data })
    }

    /// Sequential transpose.
    pub fn transposed(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for c in 0..self.cols {
            for r in 0..self.rows {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Triple-loop product, accumulated in f64.
    pub fn matmul_naive(&self, other: &Matrix) -> Result<Self> {
        if self.cols != other.rows {
            return Err(SimtError::LengthMismatch {
                left: "lhs cols",
                left_len: self.cols,
                right: "rhs rows",
                right_len: other.rows,
            });
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for c in 0..other.cols {
            for r in 0..self.rows {
                let mut acc = 0.0f64;
                for p in 0..self.cols {
                    acc += self.get(r, p) as f64 * other.get(p, c) as f64;
                }
                out.set(r, c, acc as f32);
            }
        }
        Ok(out)
    }

    /// Largest element-wise absolute difference; infinite on shape mismatch.
    pub fn max_abs_diff(&self, other: &Matrix) -> f32 {
        if self.rows != other.rows || self.cols != other.cols {
            return f32::INFINITY;
        }
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{})", self.rows, self.cols)?;
        if self.data.len() <= 64 {
            f.write_str(" [")?;
            for r in 0..self.rows {
                if r > 0 {
                    f.write_str("; ")?;
                }
                for c in 0..self.cols {
                    if c > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.get(r, c))?;
                }
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
