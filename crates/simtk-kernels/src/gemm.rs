//! Register-blocked tiled GEMM.
//!
//! Each block owns one `TSM` x `TSN` tile of the column-major M x N output
//! and runs `RTSM` x `RTSN` threads, each accumulating a `WPTM` x `WPTN`
//! micro-tile in registers. K is consumed in chunks of `TSK`: the block
//! stages one chunk of A and of the right operand in shared memory,
//! synchronises, runs the outer-product updates out of shared memory, and
//! synchronises again before the next chunk overwrites the tiles.
//!
//! The right operand is read at `k * N + n`, that is as the N x K
//! column-major transpose of B. [`gemm`] takes it in that form; [`matmul`]
//! produces it from an ordinary column-major B with a transpose launch first.

use simtk_core::{Block, DeviceBuffer, Executor, Kernel, LaunchConfig, LaunchStats, Result, SimtError};

use crate::geometry::{gemm_config, B_TILE_PAD, LPTA, RTSM, RTSN, TSK, TSM, TSN, WPTM, WPTN};
use crate::transpose::{transpose, MatrixDims};

/// GEMM shape held in device memory, one integer per buffer.
#[derive(Debug)]
pub struct GemmDims {
    pub m: DeviceBuffer<u32>,
    pub k: DeviceBuffer<u32>,
    pub n: DeviceBuffer<u32>,
}

impl GemmDims {
    pub fn new(m: usize, k: usize, n: usize) -> Self {
        Self {
            m: DeviceBuffer::scalar(m as u32),
            k: DeviceBuffer::scalar(k as u32),
            n: DeviceBuffer::scalar(n as u32),
        }
    }

    pub fn m(&self) -> usize {
        self.m.load(0) as usize
    }

    pub fn k(&self) -> usize {
        self.k.load(0) as usize
    }

    pub fn n(&self) -> usize {
        self.n.load(0) as usize
    }

    fn check_present(&self) -> Result<()> {
        for (name, buf) in [("M", &self.m), ("K", &self.k), ("N", &self.n)] {
            if buf.is_empty() {
                return Err(SimtError::BufferTooSmall { name, len: 0, needed: 1 });
            }
        }
        Ok(())
    }
}

/// Shared-memory tiles for one reduction chunk.
pub struct GemmTiles {
    a: [[f32; TSM]; TSK],
    b: [[f32; TSK + B_TILE_PAD]; TSN],
}

impl Default for GemmTiles {
    fn default() -> Self {
        Self {
            a: [[0.0; TSM]; TSK],
            b: [[0.0; TSK + B_TILE_PAD]; TSN],
        }
    }
}

#[derive(Default)]
pub struct GemmRegs {
    acc: [[f32; WPTN]; WPTM],
    b_reg: [f32; WPTN],
}

pub struct GemmKernel<'a> {
    /// M x K, column-major.
    pub a: &'a DeviceBuffer<f32>,
    /// N x K, column-major (the transpose of the K x N operand).
    pub b_t: &'a DeviceBuffer<f32>,
    /// M x N, column-major.
    pub c: &'a DeviceBuffer<f32>,
    pub dims: &'a GemmDims,
}

impl Kernel for GemmKernel<'_> {
    type Shared = GemmTiles;
    type Regs = GemmRegs;
    const SHARED_BYTES: usize = (TSK * TSM + TSN * (TSK + B_TILE_PAD)) * 4;

    fn name(&self) -> &'static str {
        "gemm"
    }

    fn geometry(&self) -> Result<LaunchConfig> {
        self.dims.check_present()?;
        let (m, k, n) = (self.dims.m(), self.dims.k(), self.dims.n());
        let cfg = gemm_config(m, k, n)?;
        for (name, buf, needed) in [("a", self.a, m * k), ("b_t", self.b_t, k * n), ("c", self.c, m * n)] {
            if buf.len() < needed {
                return Err(SimtError::BufferTooSmall { name, len: buf.len(), needed });
            }
        }
        Ok(cfg)
    }

    fn run_block(&self, block: &mut Block<GemmTiles, GemmRegs>) {
        let m = self.dims.m.load(0) as usize;
        let k = self.dims.k.load(0) as usize;
        let n = self.dims.n.load(0) as usize;
        let offset_m = TSM * block.block_idx().x as usize;
        let offset_n = TSN * block.block_idx().y as usize;

        for t in 0..k / TSK {
            block.phase(|th, tiles, _| {
                let tidm = th.thread_idx.x as usize;
                let tidn = th.thread_idx.y as usize;
                for la in 0..LPTA {
                    let tid = tidn * RTSM + tidm;
                    let id = la * RTSN * RTSM + tid;
                    let row = id % TSM;
                    let col = id / TSM;
                    let tiled = TSK * t + col;
                    tiles.a[col][row] = self.a.load(tiled * m + offset_m + row);
                    tiles.b[row][col] = self.b_t.load(tiled * n + offset_n + row);
                }
            });

            block.phase(|th, tiles, regs| {
                let tidm = th.thread_idx.x as usize;
                let tidn = th.thread_idx.y as usize;
                for kk in 0..TSK {
                    for wn in 0..WPTN {
                        regs.b_reg[wn] = tiles.b[tidn + wn * RTSN][kk];
                    }
                    for wm in 0..WPTM {
                        let a_reg = tiles.a[kk][tidm + wm * RTSM];
                        for wn in 0..WPTN {
                            regs.acc[wm][wn] += a_reg * regs.b_reg[wn];
                        }
                    }
                }
            });
        }

        block.phase(|th, _, regs| {
            let tidm = th.thread_idx.x as usize;
            let tidn = th.thread_idx.y as usize;
            for wm in 0..WPTM {
                let global_row = offset_m + tidm + wm * RTSM;
                for wn in 0..WPTN {
                    let global_col = offset_n + tidn + wn * RTSN;
                    self.c.store(global_col * m + global_row, regs.acc[wm][wn]);
                }
            }
        });
    }
}

/// `c = a * b` with the right operand already given as `b_t` (N x K column-major).
pub fn gemm(
    exec: &Executor,
    a: &DeviceBuffer<f32>,
    b_t: &DeviceBuffer<f32>,
    c: &DeviceBuffer<f32>,
    dims: &GemmDims,
) -> Result<LaunchStats> {
    exec.launch(&GemmKernel { a, b_t, c, dims })
}

/// `c = a * b` for column-major A (M x K) and B (K x N).
///
/// Transposes B into a scratch buffer, then runs [`gemm`]. Returns the GEMM
/// launch statistics.
pub fn matmul(
    exec: &Executor,
    a: &DeviceBuffer<f32>,
    b: &DeviceBuffer<f32>,
    c: &DeviceBuffer<f32>,
    dims: &GemmDims,
) -> Result<LaunchStats> {
    // Validate against B before spending a launch on the transpose.
    GemmKernel { a, b_t: b, c, dims }.geometry()?;

    let (k, n) = (dims.k(), dims.n());
    let b_t = DeviceBuffer::zeros(k * n);
    transpose(exec, b, &MatrixDims::new(k, n), &b_t)?;
    gemm(exec, a, &b_t, c, dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col_major(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f32) -> Vec<f32> {
        let mut out = Vec::with_capacity(rows * cols);
        for c in 0..cols {
            for r in 0..rows {
                out.push(f(r, c));
            }
        }
        out
    }

    fn naive(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        col_major(m, n, |r, c| (0..k).map(|p| a[p * m + r] * b[c * k + p]).sum())
    }

    #[test]
    fn test_ones_k16() {
        let exec = Executor::default();
        let a = DeviceBuffer::from_host(&vec![1.0f32; 128 * 16]);
        let b = DeviceBuffer::from_host(&vec![1.0f32; 16 * 128]);
        let c = DeviceBuffer::zeros(128 * 128);
        let stats = matmul(&exec, &a, &b, &c, &GemmDims::new(128, 16, 128)).unwrap();
        assert_eq!(stats.blocks, 1);
        assert_eq!(stats.threads_per_block, 256);
        assert_eq!(stats.barriers_per_block, 2);
        assert!(c.to_host().iter().all(|&v| v == 16.0));
    }

    #[test]
    fn test_against_naive_multi_tile() {
        let (m, k, n) = (256, 48, 128);
        let a_host = col_major(m, k, |r, c| ((r * 7 + c * 3) % 11) as f32 - 5.0);
        let b_host = col_major(k, n, |r, c| ((r * 5 + c) % 13) as f32 * 0.25);
        let exec = Executor::default();
        let a = DeviceBuffer::from_host(&a_host);
        let b = DeviceBuffer::from_host(&b_host);
        let c = DeviceBuffer::zeros(m * n);
        let stats = matmul(&exec, &a, &b, &c, &GemmDims::new(m, k, n)).unwrap();
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.barriers_per_block, 2 * k / TSK);

        let expected = naive(&a_host, &b_host, m, k, n);
        // Small integers and quarters: every partial sum is exact.
        assert_eq!(c.to_host(), expected);
    }

    #[test]
    fn test_raw_gemm_reads_transposed_operand() {
        let (m, k, n) = (128, 16, 128);
        let a_host = col_major(m, k, |r, c| if r == c { 1.0 } else { 0.0 });
        // b_t is N x K: element (n, k).
        let b_t_host = col_major(n, k, |r, c| (r * 100 + c) as f32);
        let exec = Executor::default();
        let a = DeviceBuffer::from_host(&a_host);
        let b_t = DeviceBuffer::from_host(&b_t_host);
        let c = DeviceBuffer::zeros(m * n);
        gemm(&exec, &a, &b_t, &c, &GemmDims::new(m, k, n)).unwrap();
        let out = c.to_host();
        // C(r, c) = sum_p [r == p] * B(p, c) = B_t(c, r) for r < K.
        for col in 0..n {
            for row in 0..m {
                let expected = if row < k { (col * 100 + row) as f32 } else { 0.0 };
                assert_eq!(out[col * m + row], expected);
            }
        }
    }

    #[test]
    fn test_unaligned_rejected_before_launch() {
        let exec = Executor::default();
        let a = DeviceBuffer::<f32>::zeros(128 * 20);
        let b = DeviceBuffer::<f32>::zeros(20 * 128);
        let c = DeviceBuffer::from_host(&vec![7.0f32; 128 * 128]);
        let err = matmul(&exec, &a, &b, &c, &GemmDims::new(128, 20, 128)).unwrap_err();
        assert!(matches!(err, SimtError::NotTileAligned { dim: "K", .. }));
        assert!(c.to_host().iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_short_operand_rejected() {
        let exec = Executor::default();
        let a = DeviceBuffer::<f32>::zeros(128 * 16);
        let b = DeviceBuffer::<f32>::zeros(16 * 128 - 1);
        let c = DeviceBuffer::<f32>::zeros(128 * 128);
        assert!(matches!(
            matmul(&exec, &a, &b, &c, &GemmDims::new(128, 16, 128)),
            Err(SimtError::BufferTooSmall { name: "b_t", .. })
        ));
    }

    #[test]
    fn test_shared_fits_default_limit() {
        assert!(<GemmKernel<'static> as Kernel>::SHARED_BYTES <= 48 * 1024);
    }
}
