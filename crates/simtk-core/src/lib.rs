//! # simtk-core
//!
//! SIMT execution model for the simtk kernel set.
//!
//! Provides:
//! - Grid/block/thread coordinates (`Dim3`, `ThreadCtx`)
//! - Global device buffers addressable from every thread (`DeviceBuffer`)
//! - Launch geometry (`LaunchConfig`, `grid_1d`, `grid_2d`, `exact_1d`)
//! - The `Kernel` trait, block-local shared memory and barrier phases (`Block`)
//! - A block-parallel executor built on rayon (`Executor`)

pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod launch;
pub mod memory;

pub use config::{DeviceLimits, ExecutorConfig};
pub use device::{Dim3, ThreadCtx};
pub use error::SimtError;
pub use executor::{Block, Executor, Kernel, LaunchStats};
pub use launch::LaunchConfig;
pub use memory::{DeviceBuffer, Element};

pub type Result<T> = std::result::Result<T, SimtError>;
