//! Launch geometry.
//!
//! `LaunchConfig` has the same shape as the CUDA driver's launch configuration
//! so a geometry computed here can be handed to a real device unchanged.

use crate::device::Dim3;

/// Grid and block dimensions for one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid_dim: (u32, u32, u32),
    pub block_dim: (u32, u32, u32),
    /// Dynamic shared memory requested on top of the kernel's static tiles.
    pub shared_mem_bytes: u32,
}

impl LaunchConfig {
    pub fn grid(&self) -> Dim3 {
        self.grid_dim.into()
    }

    pub fn block(&self) -> Dim3 {
        self.block_dim.into()
    }

    pub fn num_blocks(&self) -> usize {
        self.grid().volume()
    }

    pub fn threads_per_block(&self) -> usize {
        self.block().volume()
    }

    pub fn total_threads(&self) -> usize {
        self.num_blocks() * self.threads_per_block()
    }
}

/// Compute grid dimensions for a 1D kernel launch.
pub fn grid_1d(n: usize, block_size: usize) -> LaunchConfig {
    let grid = (n + block_size - 1) / block_size;
    LaunchConfig {
        grid_dim: (grid as u32, 1, 1),
        block_dim: (block_size as u32, 1, 1),
        shared_mem_bytes: 0,
    }
}

/// Compute grid dimensions for a 2D kernel launch.
pub fn grid_2d(rows: usize, cols: usize, block_x: usize, block_y: usize) -> LaunchConfig {
    let grid_x = (rows + block_x - 1) / block_x;
    let grid_y = (cols + block_y - 1) / block_y;
    LaunchConfig {
        grid_dim: (grid_x as u32, grid_y as u32, 1),
        block_dim: (block_x as u32, block_y as u32, 1),
        shared_mem_bytes: 0,
    }
}

/// 1D launch with exactly `n` threads.
///
/// The block size is the largest divisor of `n` not exceeding `max_block`
/// that also divides `max_block`, so `grid * block == n` with no tail threads.
pub fn exact_1d(n: usize, max_block: usize) -> LaunchConfig {
    let block = gcd(n, max_block).max(1);
    LaunchConfig {
        grid_dim: ((n / block) as u32, 1, 1),
        block_dim: (block as u32, 1, 1),
        shared_mem_bytes: 0,
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_1d_rounds_up() {
        let cfg = grid_1d(1000, 256);
        assert_eq!(cfg.grid_dim, (4, 1, 1));
        assert_eq!(cfg.block_dim, (256, 1, 1));
        assert_eq!(cfg.total_threads(), 1024);
    }

    #[test]
    fn test_grid_2d_covers_edges() {
        let cfg = grid_2d(33, 17, 16, 16);
        assert_eq!(cfg.grid_dim, (3, 2, 1));
        assert_eq!(cfg.threads_per_block(), 256);
    }

    #[test]
    fn test_exact_1d_has_no_tail() {
        for n in [1usize, 7, 256, 1000, 4096, 16384, 65537] {
            let cfg = exact_1d(n, 256);
            assert_eq!(cfg.total_threads(), n, "n = {}", n);
            assert!(cfg.threads_per_block() <= 256);
        }
        assert_eq!(exact_1d(1000, 256).block_dim, (8, 1, 1));
        assert_eq!(exact_1d(4096, 256).block_dim, (256, 1, 1));
        assert_eq!(exact_1d(7, 256).block_dim, (1, 1, 1));
    }
}
