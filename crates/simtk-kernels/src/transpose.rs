//! Tiled transpose through a 16x16 shared-memory tile.
//!
//! Each block reads a tile of the P x Q input with consecutive threads on
//! consecutive input addresses, synchronises, and writes it to the mirrored
//! tile position of the Q x P output, again with consecutive threads on
//! consecutive output addresses. Both sides are bounds-guarded, so partial
//! edge tiles need no separate pass.

use simtk_core::{Block, DeviceBuffer, Executor, Kernel, LaunchConfig, LaunchStats, Result, SimtError};

use crate::geometry::{transpose_config, TRANSPOSE_TILE};

type Tile = [[f32; TRANSPOSE_TILE]; TRANSPOSE_TILE];

/// Matrix shape held in device memory, one integer per buffer.
#[derive(Debug)]
pub struct MatrixDims {
    pub rows: DeviceBuffer<u32>,
    pub cols: DeviceBuffer<u32>,
}

impl MatrixDims {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: DeviceBuffer::scalar(rows as u32),
            cols: DeviceBuffer::scalar(cols as u32),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows.load(0) as usize
    }

    pub fn cols(&self) -> usize {
        self.cols.load(0) as usize
    }
}

pub struct TransposeKernel<'a> {
    pub input: &'a DeviceBuffer<f32>,
    pub dims: &'a MatrixDims,
    pub output: &'a DeviceBuffer<f32>,
}

impl Kernel for TransposeKernel<'_> {
    type Shared = Tile;
    type Regs = ();
    const SHARED_BYTES: usize = TRANSPOSE_TILE * TRANSPOSE_TILE * 4;

    fn name(&self) -> &'static str {
        "transpose"
    }

    fn geometry(&self) -> Result<LaunchConfig> {
        if self.dims.rows.is_empty() || self.dims.cols.is_empty() {
            return Err(SimtError::BufferTooSmall { name: "dims", len: 0, needed: 1 });
        }
        let (p, q) = (self.dims.rows(), self.dims.cols());
        let needed = p * q;
        if self.input.len() < needed {
            return Err(SimtError::BufferTooSmall { name: "input", len: self.input.len(), needed });
        }
        if self.output.len() < needed {
            return Err(SimtError::BufferTooSmall { name: "output", len: self.output.len(), needed });
        }
        transpose_config(p, q)
    }

    fn run_block(&self, block: &mut Block<Tile, ()>) {
        let g0 = block.block_idx().x as usize * TRANSPOSE_TILE;
        let g1 = block.block_idx().y as usize * TRANSPOSE_TILE;

        block.phase(|t, tile, _| {
            let p = self.dims.rows.load(0) as usize;
            let q = self.dims.cols.load(0) as usize;
            let (tx, ty) = (t.thread_idx.x as usize, t.thread_idx.y as usize);
            let (id0, id1) = (g0 + tx, g1 + ty);
            if id0 < p && id1 < q {
                tile[ty][tx] = self.input.load(id1 * p + id0);
            }
        });

        block.phase(|t, tile, _| {
            let p = self.dims.rows.load(0) as usize;
            let q = self.dims.cols.load(0) as usize;
            let (tx, ty) = (t.thread_idx.x as usize, t.thread_idx.y as usize);
            let (id0, id1) = (g1 + tx, g0 + ty);
            if id0 < q && id1 < p {
                self.output.store(id1 * q + id0, tile[tx][ty]);
            }
        });
    }
}

/// Write the Q x P transpose of the P x Q column-major `input` into `output`.
pub fn transpose(
    exec: &Executor,
    input: &DeviceBuffer<f32>,
    dims: &MatrixDims,
    output: &DeviceBuffer<f32>,
) -> Result<LaunchStats> {
    exec.launch(&TransposeKernel { input, dims, output })
}
