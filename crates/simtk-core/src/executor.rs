//! Kernel execution.
//!
//! A launch is a grid of independent blocks. The executor hands each block to
//! a rayon worker; inside a block, threads are stepped in local-linear order
//! one *phase* at a time. A phase ends only after every thread of the block has
//! run it, so the boundary between two phases is a block-wide barrier: no
//! thread observes shared memory from phase `p + 1` before all threads have
//! finished phase `p`.
//!
//! Per-thread state that must survive a barrier lives in the kernel's `Regs`
//! type; block-private on-chip memory lives in its `Shared` type. Both are
//! default-initialised at the start of every block and dropped at its end.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use rayon::prelude::*;

use crate::config::{DeviceLimits, ExecutorConfig};
use crate::device::{Dim3, ThreadCtx};
use crate::launch::LaunchConfig;
use crate::{Result, SimtError};

/// A compute kernel bound to its operands.
pub trait Kernel: Sync {
    /// Block-private shared memory.
    type Shared: Default + Send;
    /// Per-thread private registers, preserved across barriers.
    type Regs: Default + Send;

    /// Bytes of statically sized shared memory one block uses.
    const SHARED_BYTES: usize = 0;

    fn name(&self) -> &'static str;

    /// Launch geometry for the bound operands.
    ///
    /// Fails if the operands violate the kernel's preconditions.
    fn geometry(&self) -> Result<LaunchConfig>;

    /// Body of one thread block, expressed as a sequence of [`Block::phase`] calls.
    fn run_block(&self, block: &mut Block<Self::Shared, Self::Regs>);
}

/// One thread block in flight.
pub struct Block<S, R> {
    block_idx: Dim3,
    block_dim: Dim3,
    grid_dim: Dim3,
    shared: S,
    regs: Vec<R>,
    phases: usize,
}

impl<S: Default, R: Default> Block<S, R> {
    fn new(block_idx: Dim3, block_dim: Dim3, grid_dim: Dim3) -> Self {
        let regs = (0..block_dim.volume()).map(|_| R::default()).collect();
        Self {
            block_idx,
            block_dim,
            grid_dim,
            shared: S::default(),
            regs,
            phases: 0,
        }
    }
}

impl<S, R> Block<S, R> {
    /// Run `f` once for every thread of the block, then synchronise.
    pub fn phase<F>(&mut self, mut f: F)
    where
        F: FnMut(&ThreadCtx, &mut S, &mut R),
    {
        let mut ctx = ThreadCtx {
            thread_idx: Dim3::default(),
            block_idx: self.block_idx,
            block_dim: self.block_dim,
            grid_dim: self.grid_dim,
        };
        let mut regs = self.regs.iter_mut();
        for z in 0..self.block_dim.z {
            for y in 0..self.block_dim.y {
                for x in 0..self.block_dim.x {
                    ctx.thread_idx = Dim3::new(x, y, z);
                    if let Some(r) = regs.next() {
                        f(&ctx, &mut self.shared, r);
                    }
                }
            }
        }
        self.phases += 1;
    }

    pub fn block_idx(&self) -> Dim3 {
        self.block_idx
    }

    pub fn block_dim(&self) -> Dim3 {
        self.block_dim
    }

    pub fn grid_dim(&self) -> Dim3 {
        self.grid_dim
    }

    /// Number of phases run so far.
    pub fn phases(&self) -> usize {
        self.phases
    }
}

/// Summary of a finished launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchStats {
    pub blocks: usize,
    pub threads_per_block: usize,
    /// Block-wide barriers each block passed through.
    pub barriers_per_block: usize,
}

/// Runs kernels over a grid of blocks.
pub struct Executor {
    config: ExecutorConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Default for Executor {
    fn default() -> Self {
        Self {
            config: ExecutorConfig::default(),
            pool: None,
        }
    }
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.worker_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("simtk-worker-{}", i))
                    .build()
                    .map_err(|e| SimtError::Config(format!("worker pool: {}", e)))?,
            ),
            None => None,
        };
        Ok(Self { config, pool })
    }

    /// Process-wide executor configured from the environment on first use.
    pub fn global() -> &'static Executor {
        static GLOBAL: OnceLock<Executor> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            Executor::new(ExecutorConfig::from_env()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default executor");
                Executor::default()
            })
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Launch `kernel` with the geometry its operands require.
    pub fn launch<K: Kernel>(&self, kernel: &K) -> Result<LaunchStats> {
        let cfg = kernel.geometry()?;
        self.launch_with_config(kernel, cfg)
    }

    /// Launch `kernel` with a caller-chosen geometry.
    ///
    /// Only device limits are checked. A geometry that does not match the
    /// bound operands may fault or leave outputs partially written.
    pub fn launch_with_config<K: Kernel>(&self, kernel: &K, cfg: LaunchConfig) -> Result<LaunchStats> {
        let name = kernel.name();
        check_limits(name, &cfg, K::SHARED_BYTES, &self.config.limits)?;

        let grid = cfg.grid();
        let block = cfg.block();
        let blocks = cfg.num_blocks();
        tracing::debug!(
            kernel = name,
            grid = %grid,
            block = %block,
            shared_bytes = K::SHARED_BYTES + cfg.shared_mem_bytes as usize,
            "launch"
        );

        let run_one = |linear: usize| -> Result<usize> {
            let idx = block_index(linear, grid);
            panic::catch_unwind(AssertUnwindSafe(|| {
                let mut b = Block::<K::Shared, K::Regs>::new(idx, block, grid);
                kernel.run_block(&mut b);
                b.phases()
            }))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::warn!(kernel = name, block = %idx, %message, "device fault");
                SimtError::DeviceFault { kernel: name, message }
            })
        };

        let phases = if self.config.parallel_blocks {
            let par = || {
                (0..blocks)
                    .into_par_iter()
                    .map(run_one)
                    .try_reduce(|| 0, |a, b| Ok(a.max(b)))
            };
            match &self.pool {
                Some(pool) => pool.install(par)?,
                None => par()?,
            }
        } else {
            let mut max = 0;
            for linear in 0..blocks {
                max = max.max(run_one(linear)?);
            }
            max
        };

        let stats = LaunchStats {
            blocks,
            threads_per_block: cfg.threads_per_block(),
            barriers_per_block: phases.saturating_sub(1),
        };
        tracing::trace!(kernel = name, ?stats, "launch complete");
        Ok(stats)
    }
}

fn block_index(linear: usize, grid: Dim3) -> Dim3 {
    let gx = grid.x as usize;
    let gy = grid.y as usize;
    Dim3::new(
        (linear % gx) as u32,
        ((linear / gx) % gy) as u32,
        (linear / (gx * gy)) as u32,
    )
}

fn check_limits(
    kernel: &'static str,
    cfg: &LaunchConfig,
    static_shared: usize,
    limits: &DeviceLimits,
) -> Result<()> {
    let invalid = |reason: String| Err(SimtError::InvalidLaunch { kernel, reason });

    let (gx, gy, gz) = cfg.grid_dim;
    let (bx, by, bz) = cfg.block_dim;
    if [gx, gy, gz, bx, by, bz].contains(&0) {
        return invalid(format!(
            "zero-sized grid {} or block {}",
            cfg.grid(),
            cfg.block()
        ));
    }
    let threads = cfg.threads_per_block();
    if threads > limits.max_threads_per_block as usize {
        return invalid(format!(
            "{} threads per block exceeds limit {}",
            threads, limits.max_threads_per_block
        ));
    }
    let (mbx, mby, mbz) = limits.max_block_dim;
    if bx > mbx || by > mby || bz > mbz {
        return invalid(format!(
            "block {} exceeds per-axis limit {}",
            cfg.block(),
            Dim3::from(limits.max_block_dim)
        ));
    }
    let (mgx, mgy, mgz) = limits.max_grid_dim;
    if gx > mgx || gy > mgy || gz > mgz {
        return invalid(format!(
            "grid {} exceeds per-axis limit {}",
            cfg.grid(),
            Dim3::from(limits.max_grid_dim)
        ));
    }
    let shared = static_shared + cfg.shared_mem_bytes as usize;
    if shared > limits.max_shared_mem_bytes {
        return invalid(format!(
            "{} bytes of shared memory exceeds limit {}",
            shared, limits.max_shared_mem_bytes
        ));
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}
