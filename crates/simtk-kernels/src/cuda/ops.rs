//! CUDA dispatch for the kernel set.
//!
//! Buffers are owned by the caller. Each call checks the host-known sizes
//! against the same launch contract the emulated kernels use, then launches
//! with the geometry that contract produces.

use std::sync::Arc;

use cudarc::driver::{CudaDevice, CudaSlice, DeviceSlice, LaunchAsync};

use simtk_core::SimtError;

use super::context::CudaError;
use super::launch::{get_or_load_func, to_cuda_config};
use crate::elementwise::BinaryOp;
use crate::geometry::{elementwise_config, gemm_config, transpose_config};
use crate::scalar::ScalarOp;

const MATRIX_CU: &str = include_str!("kernels/matrix.cu");
const MODULE: &str = "simtk_matrix";

/// Every entry point in `matrix.cu`.
pub const KERNEL_NAMES: &[&str] = &[
    "add_f32",
    "sub_f32",
    "mul_f32",
    "mul_scalar_f32",
    "scalar_sub_f32",
    "sub_scalar_f32",
    "sigmoid_f32",
    "transpose_f32",
    "gemm_f32",
];

fn func(dev: &Arc<CudaDevice>, dev_idx: usize, name: &str) -> Result<cudarc::driver::CudaFunction, CudaError> {
    get_or_load_func(dev, dev_idx, MODULE, name, MATRIX_CU, KERNEL_NAMES)
}

fn check_len<T>(name: &'static str, buf: &CudaSlice<T>, needed: usize) -> Result<(), CudaError> {
    if buf.len() < needed {
        return Err(SimtError::BufferTooSmall { name, len: buf.len(), needed }.into());
    }
    Ok(())
}

fn launch_err(e: impl std::fmt::Display) -> CudaError {
    CudaError::LaunchError(e.to_string())
}

pub fn cuda_binary_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    op: BinaryOp,
    a: &CudaSlice<f32>,
    b: &CudaSlice<f32>,
    c: &mut CudaSlice<f32>,
    n: usize,
) -> Result<(), CudaError> {
    check_len("a", a, n)?;
    check_len("b", b, n)?;
    check_len("c", c, n)?;
    let cfg = elementwise_config(op.kernel_name(), n)?;
    let name = match op {
        BinaryOp::Add => "add_f32",
        BinaryOp::Sub => "sub_f32",
        BinaryOp::Mul => "mul_f32",
    };
    let f = func(dev, dev_idx, name)?;
    unsafe { f.launch(to_cuda_config(cfg), (a, b, c)) }.map_err(launch_err)
}

/// `array` is `a` for the `a op s` variants and `b` for `s - b`.
pub fn cuda_scalar_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    op: ScalarOp,
    array: &CudaSlice<f32>,
    scalar: &CudaSlice<f32>,
    out: &mut CudaSlice<f32>,
    n: usize,
) -> Result<(), CudaError> {
    check_len("array", array, n)?;
    check_len("scalar", scalar, 1)?;
    check_len("out", out, n)?;
    let cfg = to_cuda_config(elementwise_config(op.kernel_name(), n)?);
    let launched = match op {
        ScalarOp::MulByScalar => {
            let f = func(dev, dev_idx, "mul_scalar_f32")?;
            unsafe { f.launch(cfg, (array, scalar, out)) }
        }
        ScalarOp::ScalarMinusArray => {
            let f = func(dev, dev_idx, "scalar_sub_f32")?;
            unsafe { f.launch(cfg, (scalar, array, out)) }
        }
        ScalarOp::ArrayMinusScalar => {
            let f = func(dev, dev_idx, "sub_scalar_f32")?;
            unsafe { f.launch(cfg, (array, scalar, out)) }
        }
    };
    launched.map_err(launch_err)
}

pub fn cuda_sigmoid_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    input: &CudaSlice<f32>,
    output: &mut CudaSlice<f32>,
    n: usize,
) -> Result<(), CudaError> {
    check_len("input", input, n)?;
    check_len("output", output, n)?;
    let cfg = elementwise_config("sigmoid", n)?;
    let f = func(dev, dev_idx, "sigmoid_f32")?;
    unsafe { f.launch(to_cuda_config(cfg), (input, output)) }.map_err(launch_err)
}

/// `dims` holds `[rows]` and `[cols]` of the input on the device.
#[allow(clippy::too_many_arguments)]
pub fn cuda_transpose_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    rows_buf: &CudaSlice<u32>,
    cols_buf: &CudaSlice<u32>,
    input: &CudaSlice<f32>,
    output: &mut CudaSlice<f32>,
    rows: usize,
    cols: usize,
) -> Result<(), CudaError> {
    check_len("rows", rows_buf, 1)?;
    check_len("cols", cols_buf, 1)?;
    check_len("input", input, rows * cols)?;
    check_len("output", output, rows * cols)?;
    let cfg = transpose_config(rows, cols)?;
    let f = func(dev, dev_idx, "transpose_f32")?;
    unsafe { f.launch(to_cuda_config(cfg), (rows_buf, cols_buf, input, output)) }.map_err(launch_err)
}

/// `c = a * b` with the right operand as `b_t` (N x K column-major).
#[allow(clippy::too_many_arguments)]
pub fn cuda_gemm_f32(
    dev: &Arc<CudaDevice>,
    dev_idx: usize,
    dims: [&CudaSlice<u32>; 3],
    a: &CudaSlice<f32>,
    b_t: &CudaSlice<f32>,
    c: &mut CudaSlice<f32>,
    m: usize,
    k: usize,
    n: usize,
) -> Result<(), CudaError> {
    let cfg = gemm_config(m, k, n)?;
    let [dm, dk, dn] = dims;
    check_len("M", dm, 1)?;
    check_len("K", dk, 1)?;
    check_len("N", dn, 1)?;
    check_len("a", a, m * k)?;
    check_len("b_t", b_t, k * n)?;
    check_len("c", c, m * n)?;
    tracing::debug!(m, k, n, grid = ?cfg.grid_dim, "cuda gemm");
    let f = func(dev, dev_idx, "gemm_f32")?;
    unsafe { f.launch(to_cuda_config(cfg), (dm, dk, dn, a, b_t, c)) }.map_err(launch_err)
}
