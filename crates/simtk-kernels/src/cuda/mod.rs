//! CUDA backend for the kernel set.
//!
//! Provides:
//! - Device context management (lazy singleton per GPU)
//! - NVRTC compilation with a per-device module cache
//! - Launch functions mirroring the emulated kernels, on caller-owned `CudaSlice` buffers

pub mod context;
pub mod launch;
pub mod ops;

pub use context::{get_device, is_cuda_available, CudaError};
