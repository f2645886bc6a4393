use std::fmt;

/// Three-dimensional extent or index, as used by grids, blocks and threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Number of points covered by this extent.
    pub fn volume(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }
}

impl From<(u32, u32, u32)> for Dim3 {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self { x, y, z }
    }
}

impl From<Dim3> for (u32, u32, u32) {
    fn from(d: Dim3) -> Self {
        (d.x, d.y, d.z)
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Identifiers visible to a single thread of a launch.
///
/// Equivalent to CUDA's `threadIdx`/`blockIdx`/`blockDim`/`gridDim` (or OpenCL's
/// local id, group id, local size and group count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadCtx {
    pub thread_idx: Dim3,
    pub block_idx: Dim3,
    pub block_dim: Dim3,
    pub grid_dim: Dim3,
}

impl ThreadCtx {
    /// Global index along x: `block_idx.x * block_dim.x + thread_idx.x`.
    #[inline]
    pub fn global_x(&self) -> usize {
        self.block_idx.x as usize * self.block_dim.x as usize + self.thread_idx.x as usize
    }

    /// Global index along y.
    #[inline]
    pub fn global_y(&self) -> usize {
        self.block_idx.y as usize * self.block_dim.y as usize + self.thread_idx.y as usize
    }

    /// Flattened thread index within its block (x fastest, then y, then z).
    #[inline]
    pub fn local_linear(&self) -> usize {
        let bx = self.block_dim.x as usize;
        let by = self.block_dim.y as usize;
        self.thread_idx.x as usize
            + self.thread_idx.y as usize * bx
            + self.thread_idx.z as usize * bx * by
    }

    /// Total number of threads in the launch.
    pub fn grid_threads(&self) -> usize {
        self.grid_dim.volume() * self.block_dim.volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(thread: (u32, u32, u32), block: (u32, u32, u32), bdim: (u32, u32, u32)) -> ThreadCtx {
        ThreadCtx {
            thread_idx: thread.into(),
            block_idx: block.into(),
            block_dim: bdim.into(),
            grid_dim: Dim3::new(4, 4, 1),
        }
    }

    #[test]
    fn test_global_ids() {
        let t = ctx((3, 5, 0), (2, 1, 0), (16, 16, 1));
        assert_eq!(t.global_x(), 2 * 16 + 3);
        assert_eq!(t.global_y(), 16 + 5);
    }

    #[test]
    fn test_local_linear_is_x_fastest() {
        let t = ctx((3, 2, 1), (0, 0, 0), (4, 8, 2));
        assert_eq!(t.local_linear(), 3 + 2 * 4 + 4 * 8);
    }

    #[test]
    fn test_dim3_conversions() {
        let d: Dim3 = (7, 3, 2).into();
        assert_eq!(d.volume(), 42);
        let back: (u32, u32, u32) = d.into();
        assert_eq!(back, (7, 3, 2));
        assert_eq!(format!("{}", d), "(7, 3, 2)");
    }

    #[test]
    fn test_grid_threads() {
        let t = ctx((0, 0, 0), (0, 0, 0), (16, 16, 1));
        assert_eq!(t.grid_threads(), 16 * 256);
    }
}
