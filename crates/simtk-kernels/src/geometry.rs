//! Tile constants and the launch geometry each kernel requires.
//!
//! Block shapes follow directly from the constants below, so a launch built by
//! these helpers always matches what the kernel bodies index into.

use simtk_core::launch::{exact_1d, grid_2d};
use simtk_core::{LaunchConfig, Result, SimtError};

/// Side length of the transpose staging tile.
pub const TRANSPOSE_TILE: usize = 16;

/// GEMM output tile rows (M direction).
pub const TSM: usize = 128;
/// GEMM output tile columns (N direction).
pub const TSN: usize = 128;
/// GEMM reduction chunk depth (K direction).
pub const TSK: usize = 16;
/// Output rows computed by one thread.
pub const WPTM: usize = 8;
/// Output columns computed by one thread.
pub const WPTN: usize = 8;
/// Threads per block along x.
pub const RTSM: usize = TSM / WPTM;
/// Threads per block along y.
pub const RTSN: usize = TSN / WPTN;
/// Elements of the A tile each thread loads per chunk.
pub const LPTA: usize = (TSK * WPTM * WPTN) / TSN;
/// Elements of the B tile each thread loads per chunk.
pub const LPTB: usize = (TSK * WPTM * WPTN) / TSM;
/// Extra columns in the staged B tile.
pub const B_TILE_PAD: usize = 2;

/// Largest block used by the one-thread-per-element kernels.
pub const ELEMENTWISE_MAX_BLOCK: usize = 256;

// The GEMM loader shares one flattened index between the A and B tiles.
const _: () = assert!(TSM == TSN);
const _: () = assert!(TSM % WPTM == 0 && TSN % WPTN == 0);
const _: () = assert!(LPTA * RTSM * RTSN == TSK * TSM);
const _: () = assert!(LPTB * RTSM * RTSN == TSK * TSN);
const _: () = assert!(RTSM * RTSN <= 1024);
const _: () = assert!(TRANSPOSE_TILE * TRANSPOSE_TILE <= 1024);

/// Exactly `len` threads, in blocks of at most [`ELEMENTWISE_MAX_BLOCK`].
pub fn elementwise_config(kernel: &'static str, len: usize) -> Result<LaunchConfig> {
    if len == 0 {
        return Err(SimtError::EmptyLaunch { kernel });
    }
    Ok(exact_1d(len, ELEMENTWISE_MAX_BLOCK))
}

/// 16x16 blocks over a `rows` x `cols` input; edge tiles are partial.
pub fn transpose_config(rows: usize, cols: usize) -> Result<LaunchConfig> {
    if rows == 0 || cols == 0 {
        return Err(SimtError::EmptyLaunch { kernel: "transpose" });
    }
    Ok(grid_2d(rows, cols, TRANSPOSE_TILE, TRANSPOSE_TILE))
}

/// One `RTSM` x `RTSN` block per `TSM` x `TSN` output tile.
///
/// No dimension has a tail path in the kernel, so `m` and `n` must be whole
/// output tiles and `k` a whole number of reduction chunks.
pub fn gemm_config(m: usize, k: usize, n: usize) -> Result<LaunchConfig> {
    check_aligned("M", m, TSM)?;
    check_aligned("K", k, TSK)?;
    check_aligned("N", n, TSN)?;
    Ok(LaunchConfig {
        grid_dim: ((m / TSM) as u32, (n / TSN) as u32, 1),
        block_dim: (RTSM as u32, RTSN as u32, 1),
        shared_mem_bytes: 0,
    })
}

fn check_aligned(dim: &'static str, value: usize, tile: usize) -> Result<()> {
    if value == 0 || value % tile != 0 {
        return Err(SimtError::NotTileAligned { dim, value, tile });
    }
    Ok(())
}
