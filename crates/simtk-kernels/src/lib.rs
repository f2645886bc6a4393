//! # simtk-kernels
//!
//! Dense matrix/vector kernels on the simtk SIMT execution model.
//!
//! Provides:
//! - Element-wise add, subtract and multiply
//! - Scalar-broadcast multiply and subtract (both operand orders)
//! - Tiled transpose through shared memory
//! - Register-blocked tiled GEMM
//! - Sigmoid activation
//! - A column-major host `Matrix` with one call per kernel (`ops`)
//! - CUDA dispatch of the same kernels (behind `cuda` feature flag)

pub mod activation;
pub mod elementwise;
pub mod gemm;
pub mod geometry;
pub mod matrix;
pub mod ops;
pub mod scalar;
pub mod transpose;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use activation::{sigmoid, sigmoid_f32, SigmoidKernel};
pub use elementwise::{add, binary, mul, sub, BinaryOp, ElementwiseKernel};
pub use gemm::{gemm, matmul, GemmDims, GemmKernel};
pub use matrix::Matrix;
pub use scalar::{mul_scalar, scalar_sub, sub_scalar, ScalarKernel, ScalarOp, ScalarOperand};
pub use transpose::{transpose, MatrixDims, TransposeKernel};
