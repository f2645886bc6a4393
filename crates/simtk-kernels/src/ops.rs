//! One call per kernel on host matrices: upload, launch, download.

use simtk_core::{DeviceBuffer, Executor, Result, SimtError};

use crate::activation;
use crate::elementwise::{self, BinaryOp};
use crate::gemm::{self, GemmDims};
use crate::matrix::Matrix;
use crate::scalar::{self, ScalarOperand};
use crate::transpose::{self, MatrixDims};

fn same_shape(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.rows() != b.rows() || a.cols() != b.cols() {
        return Err(SimtError::LengthMismatch {
            left: "lhs",
            left_len: a.len(),
            right: "rhs",
            right_len: b.len(),
        });
    }
    Ok(())
}

fn binary(exec: &Executor, op: BinaryOp, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    same_shape(a, b)?;
    let out = DeviceBuffer::zeros(a.len());
    elementwise::binary(exec, op, &a.upload(), &b.upload(), &out)?;
    Matrix::download(&out, a.rows(), a.cols())
}

pub fn add(exec: &Executor, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    binary(exec, BinaryOp::Add, a, b)
}

pub fn sub(exec: &Executor, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    binary(exec, BinaryOp::Sub, a, b)
}

/// Element-wise (Hadamard) product.
pub fn mul(exec: &Executor, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    binary(exec, BinaryOp::Mul, a, b)
}

pub fn mul_scalar(exec: &Executor, a: &Matrix, s: f32) -> Result<Matrix> {
    let out = DeviceBuffer::zeros(a.len());
    scalar::mul_scalar(exec, &a.upload(), &ScalarOperand::new(s), &out)?;
    Matrix::download(&out, a.rows(), a.cols())
}

/// `s - b` element-wise.
pub fn scalar_sub(exec: &Executor, s: f32, b: &Matrix) -> Result<Matrix> {
    let out = DeviceBuffer::zeros(b.len());
    scalar::scalar_sub(exec, &ScalarOperand::new(s), &b.upload(), &out)?;
    Matrix::download(&out, b.rows(), b.cols())
}

/// `a - s` element-wise.
pub fn sub_scalar(exec: &Executor, a: &Matrix, s: f32) -> Result<Matrix> {
    let out = DeviceBuffer::zeros(a.len());
    scalar::sub_scalar(exec, &a.upload(), &ScalarOperand::new(s), &out)?;
    Matrix::download(&out, a.rows(), a.cols())
}

pub fn sigmoid(exec: &Executor, a: &Matrix) -> Result<Matrix> {
    let out = DeviceBuffer::zeros(a.len());
    activation::sigmoid(exec, &a.upload(), &out)?;
    Matrix::download(&out, a.rows(), a.cols())
}

pub fn transpose(exec: &Executor, a: &Matrix) -> Result<Matrix> {
    let out = DeviceBuffer::zeros(a.len());
    transpose::transpose(exec, &a.upload(), &MatrixDims::new(a.rows(), a.cols()), &out)?;
    Matrix::download(&out, a.cols(), a.rows())
}

/// Matrix product. `a.rows()` and `b.cols()` must be multiples of 128 and
/// the inner dimension a multiple of 16.
pub fn matmul(exec: &Executor, a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(SimtError::LengthMismatch {
            left: "lhs cols",
            left_len: a.cols(),
            right: "rhs rows",
            right_len: b.rows(),
        });
    }
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let out = DeviceBuffer::zeros(m * n);
    gemm::matmul(exec, &a.upload(), &b.upload(), &out, &GemmDims::new(m, k, n))?;
    Matrix::download(&out, m, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementwise_ops() {
        let exec = Executor::default();
        let a = Matrix::from_row_major(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::filled(2, 2, 2.0);
        assert_eq!(add(&exec, &a, &b).unwrap().to_row_major(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sub(&exec, &a, &b).unwrap().to_row_major(), vec![-1.0, 0.0, 1.0, 2.0]);
        assert_eq!(mul(&exec, &a, &b).unwrap().to_row_major(), vec![2.0, 4.0, 6.0, 8.0]);
        assert!(add(&exec, &a, &Matrix::zeros(4, 1)).is_err());
    }

    #[test]
    fn test_scalar_ops() {
        let exec = Executor::default();
        let a = Matrix::from_row_major(1, 3, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(mul_scalar(&exec, &a, 3.0).unwrap().as_slice(), &[3.0, 6.0, 9.0]);
        assert_eq!(scalar_sub(&exec, 1.0, &a).unwrap().as_slice(), &[0.0, -1.0, -2.0]);
        assert_eq!(sub_scalar(&exec, &a, 1.0).unwrap().as_slice(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_transpose_shape() {
        let exec = Executor::default();
        let a = Matrix::from_row_major(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let t = transpose(&exec, &a).unwrap();
        assert_eq!((t.rows(), t.cols()), (2, 3));
        assert_eq!(t.to_row_major(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert_eq!(t, a.transposed());
    }

    #[test]
    fn test_matmul_identity() {
        let exec = Executor::default();
        let x = Matrix::from_col_major(128, 128, (0..128 * 128).map(|i| (i % 17) as f32).collect()).unwrap();
        let y = matmul(&exec, &Matrix::identity(128), &x).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn test_matmul_shape_errors() {
        let exec = Executor::default();
        assert!(matches!(
            matmul(&exec, &Matrix::zeros(128, 16), &Matrix::zeros(32, 128)),
            Err(SimtError::LengthMismatch { .. })
        ));
        assert!(matches!(
            matmul(&exec, &Matrix::zeros(64, 16), &Matrix::zeros(16, 128)),
            Err(SimtError::NotTileAligned { dim: "M", .. })
        ));
    }

    #[test]
    fn test_sigmoid_matrix() {
        let exec = Executor::default();
        let s = sigmoid(&exec, &Matrix::zeros(4, 4)).unwrap();
        assert!(s.as_slice().iter().all(|&v| v == 0.5));
    }
}
